use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    EmptyHost,
    BufferSizeZero,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyHost => write!(f, "Target host must not be empty"),
            ConfigError::BufferSizeZero => write!(f, "Relay buffer size must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub enum CaptureError {
    SinkCreateFailed { path: PathBuf, source: std::io::Error },
    SinkClosed,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::SinkCreateFailed { path, source } => {
                write!(f, "Unable to create file {}, {}", path.display(), source)
            }
            CaptureError::SinkClosed => write!(f, "Log sink already stopped"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::SinkCreateFailed { source, .. } => Some(source),
            CaptureError::SinkClosed => None,
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    DialFailed { target: String, source: std::io::Error },
    AddressUnavailable(std::io::Error),
    SinkCreation(CaptureError),
    RelayPanicked(String),
}

impl SessionError {
    /// Whether the error must bring the whole process down rather than just
    /// abandon the one connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::SinkCreation(_))
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DialFailed { target, source } => {
                write!(f, "Unable to connect to {}, {}", target, source)
            }
            SessionError::AddressUnavailable(e) => write!(f, "Socket address unavailable: {}", e),
            SessionError::SinkCreation(e) => write!(f, "Log sink error: {}", e),
            SessionError::RelayPanicked(e) => write!(f, "Relay task failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        SessionError::SinkCreation(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    BindError(std::io::Error),
    SessionFatal(SessionError),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindError(e) => write!(f, "Unable to start listener, {}", e),
            NetworkError::SessionFatal(e) => write!(f, "Fatal session error: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<SessionError> for NetworkError {
    fn from(err: SessionError) -> Self {
        NetworkError::SessionFatal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_only_sink_creation_is_fatal() {
        let dial = SessionError::DialFailed {
            target: "127.0.0.1:1".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(!dial.is_fatal());

        let sink = SessionError::from(CaptureError::SinkCreateFailed {
            path: PathBuf::from("/nonexistent/log.log"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        });
        assert!(sink.is_fatal());
    }

    #[test]
    fn test_dial_failure_message_names_target() {
        let err = SessionError::DialFailed {
            target: "example.org:443".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(err.to_string(), "Unable to connect to example.org:443, refused");
    }
}
