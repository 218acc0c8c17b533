//! Error types
//!
//! The relay core never fails: malformed payloads are relayed, unreachable
//! peers are skipped and leaving an absent room is a no-op. Errors only come
//! from the socket layer and the WebSocket handshake.

use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for server and connection operations
#[derive(Debug)]
pub enum Error {
    /// Socket I/O failure (bind, accept)
    Io(std::io::Error),
    /// WebSocket protocol or transport failure
    WebSocket(tungstenite::Error),
    /// Handshake did not complete within the configured timeout
    HandshakeTimeout(Duration),
    /// Request path does not name a room
    InvalidRoom(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::HandshakeTimeout(timeout) => {
                write!(f, "Handshake timed out after {:?}", timeout)
            }
            Error::InvalidRoom(path) => write!(f, "Invalid room path: {}", path),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}

impl Error {
    /// Whether this error is an ordinary peer disconnect rather than a failure
    ///
    /// Disconnects are expected and only trigger cleanup.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::WebSocket(e) => matches!(
                e,
                tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed
                    | tungstenite::Error::Protocol(
                        tungstenite::error::ProtocolError::ResetWithoutClosingHandshake
                    )
                    | tungstenite::Error::Io(_)
            ),
            Error::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::InvalidRoom("/nope".into());
        assert_eq!(err.to_string(), "Invalid room path: /nope");

        let err = Error::HandshakeTimeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "Handshake timed out after 10s");
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(Error::WebSocket(tungstenite::Error::ConnectionClosed).is_disconnect());
        assert!(Error::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_disconnect());
        assert!(!Error::InvalidRoom("/".into()).is_disconnect());
    }
}
