//! One unidirectional copy loop of a tapped connection.
//!
//! A [`RelayDirection`] reads from one endpoint and writes every byte to the
//! other. For each chunk it emits an annotated "Received" line, a hex dump,
//! and a "Sent" line to the session's shared text log, and forwards the raw
//! bytes to its private binary log.
//!
//! Any read failure, including an orderly close, counts as a disconnect. The
//! two directions of a session are tied together by a [`Hangup`] flag: the
//! first direction to stop raises it, and the peer's pending read or write
//! then fails as if the shared socket had been closed under it.

use std::io;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use super::hex_dump::hex_dump;
use super::log_sink::SinkWriter;
use super::types::{Chunk, Direction, RelayStats};

/// Session-wide "connection closed" flag shared by both relay directions.
#[derive(Debug, Clone)]
pub struct Hangup {
    tx: Arc<watch::Sender<bool>>,
}

impl Hangup {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called, immediately
    /// if it already was.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|hung_up| *hung_up).await;
    }
}

impl Default for Hangup {
    fn default() -> Self {
        Self::new()
    }
}

/// Log outputs a relay direction writes to.
#[derive(Debug, Clone)]
pub struct RelayLogs {
    /// Annotated log shared with the opposite direction.
    pub text: SinkWriter,
    /// Raw capture of this direction only.
    pub binary: SinkWriter,
}

pub struct RelayDirection<R, W> {
    pub session_seq: u64,
    pub direction: Direction,
    pub reader: R,
    pub writer: W,
    /// Label of the endpoint read from, used in log lines.
    pub from_peer: String,
    /// Label of the endpoint written to.
    pub to_peer: String,
    pub logs: RelayLogs,
    pub hangup: Hangup,
    pub buffer_size: usize,
}

impl<R, W> RelayDirection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Relays until the read side fails or the session hangs up, then closes
    /// both halves and raises the hang-up flag.
    ///
    /// Returning is the completion signal; it happens exactly once.
    pub async fn run(mut self) -> RelayStats {
        trace!("[{:04}] {} task started", self.session_seq, self.direction);

        let mut buf = vec![0u8; self.buffer_size.max(1)];
        let mut stats = RelayStats::default();

        loop {
            let read = tokio::select! {
                biased;
                _ = self.hangup.triggered() => Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "connection closed by peer direction",
                )),
                res = self.reader.read(&mut buf) => res,
            };

            let n = match read {
                Ok(0) => {
                    debug!("[{:04}] {} EOF from {}", self.session_seq, self.direction, self.from_peer);
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    debug!(
                        "[{:04}] {} read from {} ended: {}",
                        self.session_seq, self.direction, self.from_peer, e
                    );
                    break;
                }
            };

            self.relay_chunk(&buf[..n], &stats).await;
            stats.packets += 1;
            stats.bytes += n as u64;
        }

        self.note(format!("Disconnected from {}\n", self.from_peer)).await;

        let _ = self.writer.shutdown().await;
        self.hangup.trigger();

        debug!(
            "[{:04}] {} finished: {} packet(s), {} byte(s)",
            self.session_seq, self.direction, stats.packets, stats.bytes
        );
        stats
    }

    async fn relay_chunk(&mut self, chunk: &[u8], before: &RelayStats) {
        let n = chunk.len();

        self.note(format!(
            "Received (#{}, {:08X}){} bytes from {}\n",
            before.packets, before.bytes, n, self.from_peer
        ))
        .await;
        self.note(hex_dump(chunk)).await;
        if self.logs.binary.log(chunk).await.is_err() {
            warn!("[{:04}] {} binary log is closed", self.session_seq, self.direction);
        }

        let write = tokio::select! {
            biased;
            _ = self.hangup.triggered() => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed by peer direction",
            )),
            res = self.writer.write_all(chunk) => res,
        };
        if let Err(e) = write {
            debug!(
                "[{:04}] {} write to {} failed: {}",
                self.session_seq, self.direction, self.to_peer, e
            );
        }

        self.note(format!("Sent (#{}) to {}\n", before.packets, self.to_peer))
            .await;

        let preview = &chunk[..n.min(64)];
        trace!(
            "[{:04}] captured {} {} bytes: {}{}",
            self.session_seq,
            self.direction,
            n,
            String::from_utf8_lossy(preview),
            if n > 64 { " ..." } else { "" }
        );
    }

    async fn note(&self, line: impl Into<Chunk>) {
        if self.logs.text.log(line).await.is_err() {
            warn!("[{:04}] {} text log is closed", self.session_seq, self.direction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::log_sink::LogSink;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_test::io::Builder;

    struct Sinks {
        _dir: TempDir,
        text: LogSink,
        binary: LogSink,
    }

    impl Sinks {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let text = LogSink::create(dir.path().join("text.log")).await.unwrap();
            let binary = LogSink::create(dir.path().join("binary.log")).await.unwrap();
            Self { _dir: dir, text, binary }
        }

        fn logs(&self) -> RelayLogs {
            RelayLogs {
                text: self.text.writer(),
                binary: self.binary.writer(),
            }
        }

        async fn finish(self) -> (String, Vec<u8>) {
            let text_path = self.text.path().to_path_buf();
            let binary_path = self.binary.path().to_path_buf();
            self.text.close().await;
            self.binary.close().await;
            (
                std::fs::read_to_string(text_path).unwrap(),
                std::fs::read(binary_path).unwrap(),
            )
        }
    }

    fn direction<R, W>(reader: R, writer: W, logs: RelayLogs, hangup: Hangup) -> RelayDirection<R, W> {
        RelayDirection {
            session_seq: 1,
            direction: Direction::InboundToOutbound,
            reader,
            writer,
            from_peer: "client".to_string(),
            to_peer: "server".to_string(),
            logs,
            hangup,
            buffer_size: 1024,
        }
    }

    #[tokio::test]
    async fn test_relays_chunk_and_logs_it() {
        let _ = env_logger::builder().is_test(true).try_init();
        let sinks = Sinks::new().await;
        let hangup = Hangup::new();

        let reader = Builder::new().read(b"PING").build();
        let writer = Builder::new().write(b"PING").build();

        let stats = direction(reader, writer, sinks.logs(), hangup.clone())
            .run()
            .await;

        assert_eq!(stats, RelayStats { packets: 1, bytes: 4 });
        assert!(hangup.is_triggered());

        let (text, binary) = sinks.finish().await;
        assert_eq!(binary, b"PING");
        assert_eq!(
            text,
            format!(
                "Received (#0, 00000000)4 bytes from client\n{}Sent (#0) to server\nDisconnected from client\n",
                hex_dump(b"PING")
            )
        );
    }

    #[tokio::test]
    async fn test_counters_and_offsets_accumulate() {
        let sinks = Sinks::new().await;

        let reader = Builder::new()
            .read(b"abc")
            .read(b"defgh")
            .read(b"ij")
            .build();
        let writer = Builder::new()
            .write(b"abc")
            .write(b"defgh")
            .write(b"ij")
            .build();

        let stats = direction(reader, writer, sinks.logs(), Hangup::new())
            .run()
            .await;
        assert_eq!(stats, RelayStats { packets: 3, bytes: 10 });

        let (text, binary) = sinks.finish().await;
        assert_eq!(binary, b"abcdefghij");

        let received: Vec<&str> = text.lines().filter(|l| l.starts_with("Received")).collect();
        assert_eq!(
            received,
            vec![
                "Received (#0, 00000000)3 bytes from client",
                "Received (#1, 00000003)5 bytes from client",
                "Received (#2, 00000008)2 bytes from client",
            ]
        );
        let sent: Vec<&str> = text.lines().filter(|l| l.starts_with("Sent")).collect();
        assert_eq!(sent, vec!["Sent (#0) to server", "Sent (#1) to server", "Sent (#2) to server"]);
    }

    #[tokio::test]
    async fn test_read_error_is_a_disconnect() {
        let sinks = Sinks::new().await;

        let reader = Builder::new()
            .read(b"x")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let writer = Builder::new().write(b"x").build();

        let stats = direction(reader, writer, sinks.logs(), Hangup::new())
            .run()
            .await;
        assert_eq!(stats.packets, 1);

        let (text, _) = sinks.finish().await;
        assert!(text.ends_with("Disconnected from client\n"));
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let sinks = Sinks::new().await;

        let reader = Builder::new().read(b"one").read(b"two").build();
        let writer = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "broken"))
            .write(b"two")
            .build();

        let stats = direction(reader, writer, sinks.logs(), Hangup::new())
            .run()
            .await;
        assert_eq!(stats, RelayStats { packets: 2, bytes: 6 });

        let (text, binary) = sinks.finish().await;
        assert_eq!(binary, b"onetwo");
        assert_eq!(text.matches("Sent (#").count(), 2);
    }

    #[tokio::test]
    async fn test_hangup_wakes_blocked_reader() {
        let sinks = Sinks::new().await;
        let hangup = Hangup::new();

        // Peer ends are held open so the read blocks until the hang-up.
        let (reader, _reader_peer) = tokio::io::duplex(64);
        let (writer, _writer_peer) = tokio::io::duplex(64);

        let task = tokio::spawn(direction(reader, writer, sinks.logs(), hangup.clone()).run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        hangup.trigger();
        let stats = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("relay did not stop after hang-up")
            .unwrap();
        assert_eq!(stats, RelayStats::default());

        let (text, binary) = sinks.finish().await;
        assert_eq!(text, "Disconnected from client\n");
        assert!(binary.is_empty());
    }

    #[tokio::test]
    async fn test_hangup_triggered_resolves_immediately_once_set() {
        let hangup = Hangup::new();
        hangup.trigger();
        tokio::time::timeout(Duration::from_millis(100), hangup.triggered())
            .await
            .expect("triggered() should resolve");
    }
}
