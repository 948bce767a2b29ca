use crate::data_capture::{LogFilePaths, RelayStats};
use crate::SessionStatus;
use chrono::{DateTime, Local};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Session {
    /// Accept-order sequence number, starting at 1.
    pub seq: u64,
    pub client_addr: SocketAddr,
    /// `host:port` that was dialed.
    pub target: String,
    /// Local address of the outbound connection, file-name safe.
    pub local_peer: String,
    /// Remote address of the outbound connection, file-name safe.
    pub remote_peer: String,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub bytes_transferred: u64,
    pub status: SessionStatus,
}

impl Session {
    /// Wall-clock time between start and end, zero while still active.
    pub fn duration(&self) -> Duration {
        self.end_time
            .and_then(|end| (end - self.start_time).to_std().ok())
            .unwrap_or_default()
    }
}

/// Outcome of a session that dialed its target and ran to completion.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: Session,
    /// Client → server direction.
    pub inbound: RelayStats,
    /// Server → client direction.
    pub outbound: RelayStats,
    pub logs: LogFilePaths,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(end_offset_ms: Option<i64>) -> Session {
        let start = Local::now();
        Session {
            seq: 1,
            client_addr: "127.0.0.1:5000".parse().unwrap(),
            target: "127.0.0.1:80".to_string(),
            local_peer: "127.0.0.1-5001".to_string(),
            remote_peer: "127.0.0.1-80".to_string(),
            start_time: start,
            end_time: end_offset_ms.map(|ms| start + chrono::Duration::milliseconds(ms)),
            bytes_transferred: 0,
            status: SessionStatus::Active,
        }
    }

    #[test]
    fn test_duration_of_active_session_is_zero() {
        assert_eq!(session(None).duration(), Duration::ZERO);
    }

    #[test]
    fn test_duration_of_finished_session() {
        assert_eq!(session(Some(1500)).duration(), Duration::from_millis(1500));
    }
}
