use super::Engine;
use crate::api::response::SessionOutcome;
use crate::api::{Error, Transport};
use crate::extract::{self, ESS_ID, SYSTEM_ID};
use crate::model::{EngineState, SessionMaterial};

impl<T: Transport> Engine<T> {
    /// Full login followed by one keeper cycle. Never returns `Starting`.
    pub async fn authenticate(&mut self) -> EngineState {
        let session = match self.login().await {
            Ok(session) => session,
            Err(e @ Error::Auth(_)) => {
                log::error!(
                    "Login failed: {}. After 5 wrong password attempts the account needs to be unlocked via e-mail. Stopping",
                    e
                );
                self.fail(e);
                return self.state;
            }
            Err(e) => {
                log::error!("Error during login process: {}", e);
                self.fail(e);
                return self.state;
            }
        };

        log::info!("Logged in successfully");
        self.session = session;
        if let Some(store) = &self.store {
            store.save(&self.session);
        }

        self.keep_alive().await;

        if self.system_info.is_none() {
            self.fetch_system_info().await;
        }
        self.state
    }

    async fn login(&self) -> Result<SessionMaterial, Error> {
        let sign_in = self.portal.sign_in_page().await?;
        let token = extract::login_token(&sign_in)
            .ok_or_else(|| Error::protocol("Failed to generate login signature"))?;
        log::trace!("Login signature: {}, timestamp: {}", token.signature, token.timestamp);

        let session_id = match self
            .portal
            .create_session(&self.settings.email, &self.settings.password, &token)
            .await?
            .outcome()?
        {
            SessionOutcome::Granted(id) => id,
            SessionOutcome::Rejected(message) => return Err(Error::Auth(message)),
        };
        log::debug!("Login session ID: {}", session_id);

        let cookie = self
            .portal
            .exchange_session(&session_id)
            .await?
            .as_deref()
            .and_then(extract::session_cookie)
            .ok_or_else(|| Error::protocol("No valid Cookie was returned from Login"))?;
        log::trace!("Cookie: {}", cookie);

        let landing = self.portal.dashboard(&cookie).await?;
        let system_id = SYSTEM_ID
            .extract(&landing)
            .ok_or_else(|| Error::protocol("Unexpected data in main landing page"))?
            .to_owned();
        log::debug!("System ID: {}", system_id);

        let today = chrono::Local::now().date_naive();
        let dashboard = self
            .portal
            .system_dashboard(&cookie, &system_id, today)
            .await?;
        let ess_id = ESS_ID
            .extract(&dashboard)
            .ok_or_else(|| Error::protocol("Unexpected data on dashboard"))?
            .to_owned();
        log::debug!("ESS ID: {}", ess_id);

        Ok(SessionMaterial::new(cookie, system_id, ess_id))
    }

    /// Static installation details. Failing here leaves the engine state alone.
    pub(super) async fn fetch_system_info(&mut self) {
        if !self.session.is_usable() {
            return;
        }

        match self
            .portal
            .system_info_page(&self.session.cookie, &self.session.system_id)
            .await
        {
            Ok(html) => match extract::system_info(&html) {
                Some(info) => {
                    log::debug!("Updated SystemInfo");
                    self.system_info = Some(info);
                    self.publish();
                }
                None => log::warn!("No system info found on the system info page"),
            },
            Err(e) => log::error!("Error while getting system info: {}", e),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::api::endpoint;
    use crate::api::mock::ScriptedTransport;
    use crate::engine::test::engine;
    use crate::engine::Engine;
    use crate::extract::test::read_resource;
    use crate::model::{EngineState, SessionMaterial};
    use crate::session_store::SessionFile;

    fn cookie() -> String {
        read_resource("cookie.txt").trim_end().to_string()
    }

    fn set_cookie() -> String {
        read_resource("set_cookie.txt").trim_end().to_string()
    }

    /// Script the exchanges up to (and including) the given login step.
    fn script_until(transport: &ScriptedTransport, steps: usize) {
        if steps >= 1 {
            transport.body(&read_resource("sign_in.html"));
        }
        if steps >= 2 {
            transport.body(&read_resource("account_session.json"));
        }
        if steps >= 3 {
            transport.redirect(Some(&set_cookie()));
        }
        if steps >= 4 {
            transport.body(&read_resource("landing.html"));
        }
        if steps >= 5 {
            transport.body(&read_resource("dashboard.html"));
        }
    }

    #[tokio::test]
    async fn no_signature() {
        let transport = ScriptedTransport::new();
        transport.body("");
        let mut engine = engine(&transport);

        assert_eq!(EngineState::Error, engine.authenticate().await);

        assert_eq!(1, transport.calls());
        assert_eq!(endpoint::SIGN_IN, transport.requests()[0].url);
        assert_eq!(
            "Failed to generate login signature",
            engine.last_error().unwrap().to_string()
        );
    }

    #[tokio::test]
    async fn no_session_id() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 1);
        transport.body("{}");
        let mut engine = engine(&transport);

        assert_eq!(EngineState::Error, engine.authenticate().await);

        assert_eq!(2, transport.calls());
        let requests = transport.requests();
        assert_eq!(
            "https://de.emp.lgsmartplatform.com/emp/v2.0/account/session/test%40test.com",
            requests[1].url
        );
        assert_eq!(Some("9999999999".to_string()), transport.header(1, "x-timestamp"));
        assert_eq!(
            Some("whoWouldEvenBotherToReadThis1gh+yM0XvRgIKik=".to_string()),
            transport.header(1, "x-signature")
        );
        assert_eq!(Some("de-DE,de;q=0.9".to_string()), transport.header(1, "accept-language"));
        assert_eq!(Some("DE".to_string()), transport.header(1, "x-device-country"));
        assert!(requests[1]
            .body
            .as_deref()
            .unwrap()
            .starts_with("user_auth2=ee26b0dd4af7e749"));
        assert_eq!(
            "Failed to generate Login Session ID",
            engine.last_error().unwrap().to_string()
        );
    }

    #[tokio::test]
    async fn rejected_credentials_stop_everything() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 1);
        transport.body(&read_resource("account_session_rejected.json"));
        let mut engine = engine(&transport);

        assert_eq!(EngineState::BadLogin, engine.authenticate().await);

        assert_eq!(2, transport.calls());
        assert_eq!("Test", engine.last_error().unwrap().to_string());
        assert!(!engine.session().is_usable());
    }

    #[tokio::test]
    async fn rejection_with_unexpected_shape_is_terminal() {
        for body in [
            r#"{"error": {"code": 1006}}"#,
            r#"{"error": "Invalid credentials"}"#,
        ] {
            let transport = ScriptedTransport::new();
            script_until(&transport, 1);
            transport.body(body);
            let mut engine = engine(&transport);

            assert_eq!(EngineState::BadLogin, engine.authenticate().await);
            assert_eq!(2, transport.calls());
        }
    }

    #[tokio::test]
    async fn no_cookie() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 2);
        transport.redirect(None);
        let mut engine = engine(&transport);

        assert_eq!(EngineState::Error, engine.authenticate().await);

        assert_eq!(3, transport.calls());
        let requests = transport.requests();
        assert_eq!(
            "https://enervu.lg-ess.com/v2/homeowner/account/login?sid=emp%253B1701370721248%253B000044611",
            requests[2].url
        );
        assert!(!requests[2].follow_redirects);
        assert_eq!(
            "No valid Cookie was returned from Login",
            engine.last_error().unwrap().to_string()
        );
    }

    #[tokio::test]
    async fn partial_cookie() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 2);
        transport.redirect(Some("JSESSIONID=abc; Path=/v2"));
        let mut engine = engine(&transport);

        assert_eq!(EngineState::Error, engine.authenticate().await);
        assert_eq!(3, transport.calls());
    }

    #[tokio::test]
    async fn no_system_id() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 3);
        transport.body("");
        let mut engine = engine(&transport);

        assert_eq!(EngineState::Error, engine.authenticate().await);

        assert_eq!(4, transport.calls());
        assert_eq!(endpoint::DASHBOARD, transport.requests()[3].url);
        assert_eq!(Some(cookie()), transport.header(3, "cookie"));
        assert_eq!(
            "Unexpected data in main landing page",
            engine.last_error().unwrap().to_string()
        );
    }

    #[tokio::test]
    async fn no_ess_id() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 4);
        transport.body("");
        let mut engine = engine(&transport);

        assert_eq!(EngineState::Error, engine.authenticate().await);

        assert_eq!(5, transport.calls());
        let today = chrono::Local::now().date_naive();
        assert_eq!(
            endpoint::system_dashboard("1234", today),
            transport.requests()[4].url
        );
        assert_eq!(Some(cookie()), transport.header(4, "cookie"));
        assert_eq!(
            "Unexpected data on dashboard",
            engine.last_error().unwrap().to_string()
        );
        assert!(!engine.session().is_usable());
    }

    #[tokio::test]
    async fn full_login() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionFile::new(dir.path().join("session.json"));
        let transport = ScriptedTransport::new();
        script_until(&transport, 5);
        transport
            .body(&read_resource("landing.html"))
            .body(&read_resource("energy_flow.json"))
            .body(&read_resource("system_info.html"));
        let mut engine = engine(&transport).with_session_file(store.clone());

        assert_eq!(EngineState::Active, engine.authenticate().await);

        assert_eq!(8, transport.calls());
        let expected = SessionMaterial::new(cookie(), "1234".into(), "5678".into());
        assert_eq!(&expected, engine.session());
        assert_eq!(Some(expected), store.load());

        assert_eq!(Some("Y".to_string()), transport.header(6, "start_poll"));
        assert_eq!("2024-03-07 12:59:00", engine.snapshot().unwrap().target_date);
        assert_eq!(endpoint::system_info("1234"), transport.requests()[7].url);
        assert_eq!("LG ESS", engine.system_info().unwrap().system_name);
        assert!(engine.last_error().is_none());
    }

    #[tokio::test]
    async fn system_info_is_fetched_once() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 5);
        transport
            .body(&read_resource("landing.html"))
            .body(&read_resource("energy_flow.json"))
            .body(&read_resource("system_info.html"));
        script_until(&transport, 5);
        transport
            .body(&read_resource("landing.html"))
            .body(r#"{"energyFlowList": [{"targetDate": "later"}]}"#);
        let mut engine = engine(&transport);

        engine.authenticate().await;
        assert_eq!(EngineState::Active, engine.authenticate().await);

        assert_eq!(15, transport.calls());
        assert_eq!("later", engine.snapshot().unwrap().target_date);
    }

    #[tokio::test]
    async fn system_info_failure_is_not_fatal() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 5);
        transport
            .body(&read_resource("landing.html"))
            .body(&read_resource("energy_flow.json"));
        let mut engine = engine(&transport);

        /* nothing scripted for the system info page */
        assert_eq!(EngineState::Active, engine.authenticate().await);
        assert!(engine.system_info().is_none());
    }

    #[tokio::test]
    async fn failed_keeper_after_login_is_recoverable() {
        let transport = ScriptedTransport::new();
        script_until(&transport, 5);
        transport.body("no e-mail here");
        let mut engine: Engine<ScriptedTransport> = engine(&transport);

        assert_eq!(EngineState::Error, engine.authenticate().await);
        assert!(engine.session().is_usable());
    }
}
