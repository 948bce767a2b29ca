//! Per-session log file orchestration.
//!
//! A [`SessionRecorder`] opens the three audit files of one tapped
//! connection and hands out the writers the relay directions need:
//!
//! - `log-<ts>-<seq>-<local>-<remote>.log`: annotated text log shared by both
//!   directions (connect banner, received/sent lines, hex dumps, disconnects,
//!   duration)
//! - `log-binary-<ts>-<seq>-<local>.log`: raw bytes relayed client → server
//! - `log-binary-<ts>-<seq>-<remote>.log`: raw bytes relayed server → client
//!
//! All three names share the session start timestamp, so the files of one
//! connection sort together.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use log::{debug, info};

use super::log_sink::LogSink;
use super::relay_direction::RelayLogs;
use super::types::{Chunk, Direction};
use crate::error_handling::types::CaptureError;

/// `YYYY.MM.DD-HH.MM.SS`, as used in file names and log lines.
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";

pub fn format_time<Tz: TimeZone>(t: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// File names of one session, derived before anything is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileNames {
    pub text: String,
    pub inbound_binary: String,
    pub outbound_binary: String,
}

impl LogFileNames {
    /// `local_peer` and `remote_peer` are already sanitized peer labels
    /// (see [`printable_addr`](super::types::printable_addr)).
    pub fn new(timestamp: &str, seq: u64, local_peer: &str, remote_peer: &str) -> Self {
        Self {
            text: format!("log-{}-{:04}-{}-{}.log", timestamp, seq, local_peer, remote_peer),
            inbound_binary: format!("log-binary-{}-{:04}-{}.log", timestamp, seq, local_peer),
            outbound_binary: format!("log-binary-{}-{:04}-{}.log", timestamp, seq, remote_peer),
        }
    }
}

/// Paths of the files a finished session wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilePaths {
    pub text: PathBuf,
    pub inbound_binary: PathBuf,
    pub outbound_binary: PathBuf,
}

/// Owns the text sink and both binary sinks of one session.
pub struct SessionRecorder {
    seq: u64,
    text: LogSink,
    inbound_binary: LogSink,
    outbound_binary: LogSink,
}

impl SessionRecorder {
    /// Creates all three files under `dir`.
    ///
    /// # Errors
    /// [`CaptureError::SinkCreateFailed`] for the first file that cannot be
    /// created. Sinks opened before the failure are closed again.
    pub async fn create(dir: &Path, seq: u64, names: &LogFileNames) -> Result<Self, CaptureError> {
        let text = LogSink::create(dir.join(&names.text)).await?;

        let inbound_binary = match LogSink::create(dir.join(&names.inbound_binary)).await {
            Ok(sink) => sink,
            Err(e) => {
                text.close().await;
                return Err(e);
            }
        };

        let outbound_binary = match LogSink::create(dir.join(&names.outbound_binary)).await {
            Ok(sink) => sink,
            Err(e) => {
                text.close().await;
                inbound_binary.close().await;
                return Err(e);
            }
        };

        debug!("[{:04}] recording to {}", seq, text.path().display());

        Ok(Self {
            seq,
            text,
            inbound_binary,
            outbound_binary,
        })
    }

    /// Writers for the relay direction `direction`: the shared text log and
    /// that direction's own binary log.
    pub fn relay_logs(&self, direction: Direction) -> RelayLogs {
        let binary = match direction {
            Direction::InboundToOutbound => &self.inbound_binary,
            Direction::OutboundToInbound => &self.outbound_binary,
        };
        RelayLogs {
            text: self.text.writer(),
            binary: binary.writer(),
        }
    }

    /// Appends one line to the text log.
    pub async fn note(&self, line: impl Into<Chunk>) -> Result<(), CaptureError> {
        self.text.writer().log(line).await
    }

    pub fn paths(&self) -> LogFilePaths {
        LogFilePaths {
            text: self.text.path().to_path_buf(),
            inbound_binary: self.inbound_binary.path().to_path_buf(),
            outbound_binary: self.outbound_binary.path().to_path_buf(),
        }
    }

    /// Stops all three sinks and waits until their files are released.
    pub async fn finalize(self) -> LogFilePaths {
        let paths = self.paths();
        let (text, inbound, outbound) = tokio::join!(
            self.text.close(),
            self.inbound_binary.close(),
            self.outbound_binary.close()
        );
        info!(
            "[{:04}] Finalized capture: text={}, c2s={}, s2c={}",
            self.seq, text, inbound, outbound
        );
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_format_time() {
        let t = Utc.with_ymd_and_hms(2015, 11, 3, 7, 5, 9).unwrap();
        assert_eq!(format_time(&t), "2015.11.03-07.05.09");
    }

    #[test]
    fn test_file_names() {
        let names = LogFileNames::new("2015.11.03-07.05.09", 7, "127.0.0.1-50123", "10.0.0.5-80");
        assert_eq!(names.text, "log-2015.11.03-07.05.09-0007-127.0.0.1-50123-10.0.0.5-80.log");
        assert_eq!(names.inbound_binary, "log-binary-2015.11.03-07.05.09-0007-127.0.0.1-50123.log");
        assert_eq!(names.outbound_binary, "log-binary-2015.11.03-07.05.09-0007-10.0.0.5-80.log");
    }

    #[test]
    fn test_sequence_wider_than_padding() {
        let names = LogFileNames::new("t", 12345, "a", "b");
        assert_eq!(names.text, "log-t-12345-a-b.log");
    }

    #[tokio::test]
    async fn test_records_into_separate_files() {
        let dir = TempDir::new().unwrap();
        let names = LogFileNames::new(&format_time(&Local::now()), 1, "local-1", "remote-2");
        let recorder = SessionRecorder::create(dir.path(), 1, &names).await.unwrap();

        recorder.note("Connected\n").await.unwrap();
        let c2s = recorder.relay_logs(Direction::InboundToOutbound);
        let s2c = recorder.relay_logs(Direction::OutboundToInbound);
        c2s.binary.log("request").await.unwrap();
        s2c.binary.log("response").await.unwrap();
        c2s.text.log("c2s\n").await.unwrap();
        s2c.text.log("s2c\n").await.unwrap();

        let paths = recorder.finalize().await;
        assert_eq!(paths.text, dir.path().join(&names.text));
        assert_eq!(std::fs::read_to_string(&paths.text).unwrap(), "Connected\nc2s\ns2c\n");
        assert_eq!(std::fs::read(&paths.inbound_binary).unwrap(), b"request");
        assert_eq!(std::fs::read(&paths.outbound_binary).unwrap(), b"response");
    }

    #[tokio::test]
    async fn test_create_fails_in_missing_directory() {
        let dir = TempDir::new().unwrap();
        let names = LogFileNames::new("t", 1, "a", "b");
        let result = SessionRecorder::create(&dir.path().join("absent"), 1, &names).await;
        assert!(matches!(result, Err(CaptureError::SinkCreateFailed { .. })));
    }
}
