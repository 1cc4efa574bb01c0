use config::{Config, ConfigError, Environment, File};
use enervu_rs::EngineSettings;

const DEFAULT_LANGUAGE: &str = "de-DE";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15";
const DEFAULT_SESSION_FILE: &str = "enervu-session.json";
/* the portal drops idle sessions after 59 minutes */
const MAX_REFRESH_MINUTES: u32 = 58;

#[derive(Clone, serde::Deserialize)]
pub struct EnervuConfig {
    pub email: String,
    pub password: String,
    pub refresh_minutes: u32,
    pub language: String,
    pub user_agent: String,
    pub latest_data_for_power: bool,
    pub session_file: String,
}

impl EnervuConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.email.trim().is_empty() {
            return Err(ConfigError::Message("email must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Message("password must not be empty".into()));
        }
        if !(1..=MAX_REFRESH_MINUTES).contains(&self.refresh_minutes) {
            return Err(ConfigError::Message(format!(
                "refresh_minutes must be between 1 and {}, got {}",
                MAX_REFRESH_MINUTES, self.refresh_minutes
            )));
        }
        if !is_language_tag(&self.language) {
            return Err(ConfigError::Message(format!(
                "language must look like de-DE, got {}",
                self.language
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Message("user_agent must not be empty".into()));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            email: self.email.clone(),
            password: self.password.clone(),
            refresh_minutes: self.refresh_minutes,
            language: self.language.clone(),
            user_agent: self.user_agent.clone(),
            latest_data_for_power: self.latest_data_for_power,
        }
    }
}

/// `xx-YY`: lowercase language, uppercase country.
fn is_language_tag(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    bytes.len() == 5
        && bytes[..2].iter().all(u8::is_ascii_lowercase)
        && bytes[2] == b'-'
        && bytes[3..].iter().all(u8::is_ascii_uppercase)
}

fn defaults(settings: &mut Config) -> Result<(), ConfigError> {
    settings
        .set_default("refresh_minutes", 1)?
        .set_default("language", DEFAULT_LANGUAGE)?
        .set_default("user_agent", DEFAULT_USER_AGENT)?
        .set_default("latest_data_for_power", true)?
        .set_default("session_file", DEFAULT_SESSION_FILE)?;
    Ok(())
}

/// Optional `enervu.{toml,json,yaml}` in the working directory, overridden by `ENERVU_*`.
pub fn read_settings() -> Result<EnervuConfig, ConfigError> {
    let mut settings = Config::default();
    defaults(&mut settings)?;
    settings
        .merge(File::with_name("enervu").required(false))?
        .merge(Environment::with_prefix("ENERVU"))?;

    let config: EnervuConfig = settings.try_into()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod test {
    use super::*;

    fn base() -> Config {
        let mut settings = Config::default();
        defaults(&mut settings).unwrap();
        settings.set("email", "test@test.com").unwrap();
        settings.set("password", "test").unwrap();
        settings
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let config: EnervuConfig = base().try_into().unwrap();
        assert_eq!(1, config.refresh_minutes);
        assert_eq!("de-DE", config.language);
        assert!(config.latest_data_for_power);
        assert_eq!("enervu-session.json", config.session_file);
        assert!(config.validate().is_ok());

        let engine = config.engine_settings();
        assert_eq!("test@test.com", engine.email);
        assert!(!format!("{:?}", engine).contains("\"test\""));
    }

    #[test]
    fn credentials_are_required() {
        let mut settings = Config::default();
        defaults(&mut settings).unwrap();
        assert!(settings.try_into::<EnervuConfig>().is_err());
    }

    #[test]
    fn refresh_interval_must_fit_the_session() {
        let mut settings = base();
        settings.set("refresh_minutes", 59).unwrap();
        let config: EnervuConfig = settings.try_into().unwrap();
        assert!(config.validate().is_err());

        let mut settings = base();
        settings.set("refresh_minutes", 0).unwrap();
        let config: EnervuConfig = settings.try_into().unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn language_tags() {
        assert!(is_language_tag("de-DE"));
        assert!(is_language_tag("en-GB"));
        assert!(!is_language_tag("de"));
        assert!(!is_language_tag("DE-de"));
        assert!(!is_language_tag("de_DE"));
    }
}
