use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The portal rejected the credentials. Terminal: retrying risks locking the account.
    Auth(String),
    /// A response did not carry the markers or fields the flow depends on.
    Protocol(String),
    /// Network-level failure talking to the portal.
    Transport(String),
    /// Data was requested from the engine before it became active.
    Unavailable(String),
}

impl Error {
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Error::Protocol(message.into())
    }

    /// Whether the backoff loop may try again after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Auth(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Auth(s) | Error::Protocol(s) | Error::Transport(s) | Error::Unavailable(s) => {
                f.write_str(s)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Map a reqwest failure to the portal error taxonomy. Timeouts count as protocol errors.
pub fn map_transport_err(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Protocol(format!("Request timed out: {}", error))
    } else {
        Error::Transport(error.to_string())
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error) = match &self {
            Error::Auth(s) => (
                Status::Forbidden,
                format!("<html><body><h3>403 Forbidden</h3>Portal rejected the credentials: <code>{}</code></body></html>", s),
            ),
            Error::Unavailable(s) => (
                Status::ServiceUnavailable,
                format!("<html><body><h3>503 Service Unavailable</h3><code>{}</code></body></html>", s),
            ),
            _ => (
                Status::BadGateway,
                format!(
                    "<html><body><h3>502 Bad Gateway</h3>Downstream portal error: <code>{}</code></body></html>",
                    self
                ),
            ),
        };

        Response::build()
            .status(status)
            .sized_body(error.len(), Cursor::new(error))
            .header(ContentType::new("text", "html"))
            .ok()
    }
}

#[cfg(test)]
mod test {
    use super::Error;

    #[test]
    fn only_auth_errors_are_terminal() {
        assert!(!Error::Auth("Test".into()).is_recoverable());
        assert!(Error::protocol("Unexpected data on dashboard").is_recoverable());
        assert!(Error::Transport("connection reset".into()).is_recoverable());
    }

    #[test]
    fn display_is_the_bare_message() {
        let error = Error::protocol("Failed to generate login signature");
        assert_eq!("Failed to generate login signature", error.to_string());
    }
}
