use crate::configuration::Config;
use crate::data_capture::recorder::format_time;
use crate::data_capture::types::printable_addr;
use crate::data_capture::{
    Direction, Hangup, LogFileNames, RelayDirection, RelayStats, SessionRecorder,
};
use crate::error_handling::types::SessionError;
use crate::network::session_request::SessionRequest;
use crate::session_management::session::{Session, SessionSummary};
use crate::SessionStatus;
use chrono::Local;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::JoinSet;

/// Number of relay directions per session; the session waits for exactly
/// this many completions before finalizing.
const RELAY_DIRECTIONS: usize = 2;

/// Drives accepted connections through their session lifecycle.
///
/// The manager is shared (`Arc`) by every session task the listener spawns.
/// It holds the immutable configuration and a live-session counter.
///
/// # Fields Overview
///
/// - `config`: target address, log directory and relay buffer size
/// - `active_sessions`: sessions that dialed their target and have not
///   finalized their logs yet
pub struct SessionManager {
    config: Arc<Config>,
    active_sessions: AtomicUsize,
}

/// Keeps `active_sessions` accurate on every exit path of a session.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionManager {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            active_sessions: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn get_active_session_count(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Runs one session to completion.
    ///
    /// Dials the target, opens the three log files, relays both directions
    /// concurrently and finalizes the logs once both have finished. Nothing is
    /// released while either direction may still write.
    ///
    /// # Errors
    /// - [`SessionError::DialFailed`]: the target refused or was unreachable;
    ///   no log file was created and the inbound connection is dropped.
    /// - [`SessionError::SinkCreation`]: a log file could not be created. This
    ///   is fatal for the whole process.
    /// - [`SessionError::AddressUnavailable`]: the outbound socket could not
    ///   report its addresses.
    /// - [`SessionError::RelayPanicked`]: a relay task died; logs were still
    ///   finalized.
    pub async fn handle_session(
        &self,
        request: SessionRequest,
    ) -> Result<SessionSummary, SessionError> {
        let SessionRequest {
            stream: inbound,
            seq,
            client_addr,
            ..
        } = request;
        let target = self.config.target();

        let outbound = TcpStream::connect(&target)
            .await
            .map_err(|source| SessionError::DialFailed {
                target: target.clone(),
                source,
            })?;

        let local_addr = outbound
            .local_addr()
            .map_err(SessionError::AddressUnavailable)?;
        let remote_addr = outbound
            .peer_addr()
            .map_err(SessionError::AddressUnavailable)?;

        let _active = ActiveGuard::enter(&self.active_sessions);
        let mut session = Session {
            seq,
            client_addr,
            target,
            local_peer: printable_addr(&local_addr),
            remote_peer: printable_addr(&remote_addr),
            start_time: Local::now(),
            end_time: None,
            bytes_transferred: 0,
            status: SessionStatus::Active,
        };

        let started = format_time(&session.start_time);
        let names = LogFileNames::new(&started, seq, &session.local_peer, &session.remote_peer);
        let recorder = SessionRecorder::create(&self.config.log_dir, seq, &names).await?;

        if recorder
            .note(format!("Connected to {} at {}\n", session.target, started))
            .await
            .is_err()
        {
            warn!("[{:04}] text log closed before the connect banner", seq);
        }
        info!(
            "[{:04}] {} connected, relaying to {}",
            seq, client_addr, session.target
        );

        let hangup = Hangup::new();
        let client_label = printable_addr(&client_addr);
        let (inbound_read, inbound_write) = inbound.into_split();
        let (outbound_read, outbound_write) = outbound.into_split();

        let mut set = JoinSet::new();

        // Client -> server (read from client, write to server)
        let c2s = RelayDirection {
            session_seq: seq,
            direction: Direction::InboundToOutbound,
            reader: inbound_read,
            writer: outbound_write,
            from_peer: client_label.clone(),
            to_peer: session.remote_peer.clone(),
            logs: recorder.relay_logs(Direction::InboundToOutbound),
            hangup: hangup.clone(),
            buffer_size: self.config.buffer_size,
        };
        set.spawn(async move { (Direction::InboundToOutbound, c2s.run().await) });

        // Server -> client (read from server, write to client)
        let s2c = RelayDirection {
            session_seq: seq,
            direction: Direction::OutboundToInbound,
            reader: outbound_read,
            writer: inbound_write,
            from_peer: session.remote_peer.clone(),
            to_peer: client_label,
            logs: recorder.relay_logs(Direction::OutboundToInbound),
            hangup: hangup.clone(),
            buffer_size: self.config.buffer_size,
        };
        set.spawn(async move { (Direction::OutboundToInbound, s2c.run().await) });

        let mut inbound_stats = RelayStats::default();
        let mut outbound_stats = RelayStats::default();
        let mut completions = 0;
        let mut failure = None;

        while let Some(joined) = set.join_next().await {
            completions += 1;
            match joined {
                Ok((Direction::InboundToOutbound, stats)) => inbound_stats = stats,
                Ok((Direction::OutboundToInbound, stats)) => outbound_stats = stats,
                Err(e) => {
                    error!("[{:04}] relay task failed: {}", seq, e);
                    // Unblock the surviving direction.
                    hangup.trigger();
                    failure = Some(e.to_string());
                }
            }
        }
        debug_assert_eq!(completions, RELAY_DIRECTIONS);

        let finished = Local::now();
        session.end_time = Some(finished);
        session.bytes_transferred = inbound_stats.bytes + outbound_stats.bytes;
        session.status = SessionStatus::Completed;
        let duration = session.duration();

        if recorder
            .note(format!(
                "Finished at {}, duration {:?}\n",
                format_time(&finished),
                duration
            ))
            .await
            .is_err()
        {
            warn!("[{:04}] text log closed before the finish line", seq);
        }
        let logs = recorder.finalize().await;

        info!(
            "[{:04}] {} disconnected after {:?}, {} byte(s) relayed",
            seq, client_addr, duration, session.bytes_transferred
        );
        debug!("[{:04}] text log at {}", seq, logs.text.display());

        if let Some(reason) = failure {
            return Err(SessionError::RelayPanicked(reason));
        }

        Ok(SessionSummary {
            session,
            inbound: inbound_stats,
            outbound: outbound_stats,
            logs,
        })
    }
}
