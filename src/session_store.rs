use crate::model::SessionMaterial;
use std::fs;
use std::path::{Path, PathBuf};

/// Session material mirrored to a JSON file so a restart can skip the full login.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        SessionFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a stored session. Anything unreadable or incomplete counts as no session.
    pub fn load(&self) -> Option<SessionMaterial> {
        let session = fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|s| {
                serde_json::from_str::<SessionMaterial>(&s).map_err(|e| e.to_string())
            });

        match session {
            Ok(session) if session.is_usable() => {
                log::info!("Importing session data from {}", self.path.display());
                Some(session)
            }
            Ok(_) => {
                log::info!("No or invalid session data stored. Starting with a new session.");
                None
            }
            Err(e) => {
                log::info!(
                    "No or invalid session data stored ({}). Starting with a new session.",
                    e
                );
                None
            }
        }
    }

    pub fn save(&self, session: &SessionMaterial) {
        let result = serde_json::to_string_pretty(session)
            .map_err(|e| e.to_string())
            .and_then(|s| fs::write(&self.path, s).map_err(|e| e.to_string()));

        match result {
            Ok(()) => log::debug!("Stored session data in {}", self.path.display()),
            Err(e) => log::warn!(
                "An error occurred while storing the session in {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::SessionFile;
    use crate::model::SessionMaterial;
    use std::fs;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        let session = SessionMaterial::new("JSESSIONID=abc".into(), "1234".into(), "5678".into());

        file.save(&session);

        assert_eq!(Some(session), file.load());
    }

    #[test]
    fn document_uses_portal_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&SessionMaterial::new("c".into(), "1".into(), "2".into()));

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!("c", value["Cookie"]);
        assert_eq!("1", value["system_id"]);
        assert_eq!("2", value["ess_id"]);
    }

    #[test]
    fn missing_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(None, SessionFile::new(dir.path().join("absent.json")).load());
    }

    #[test]
    fn partial_session_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"Cookie": "c", "system_id": "1234"}"#).unwrap();
        assert_eq!(None, SessionFile::new(path).load());
    }

    #[test]
    fn garbage_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(None, SessionFile::new(path).load());
    }

    #[test]
    fn unwritable_location_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("missing").join("session.json"));
        file.save(&SessionMaterial::new("c".into(), "1".into(), "2".into()));
        assert_eq!(None, file.load());
    }
}
