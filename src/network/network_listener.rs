//! # Network Listener Module
//!
//! This module accepts inbound TCP connections and launches one session per
//! connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────┐    ┌─────────────────┐
//! │ Incoming        │───▶│ NetworkListener      │───▶│ SessionManager  │
//! │ Connections     │    │                      │    │ (one task per   │
//! └─────────────────┘    │ - Sequence numbers   │    │  connection)    │
//!                        │ - Fatal error fan-in │    └─────────────────┘
//!                        └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tcptap::configuration::Config;
//! use tcptap::network::NetworkListener;
//! use tcptap::error_handling::types::NetworkError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), NetworkError> {
//!     let config = Arc::new(Config::new("127.0.0.1", 80, 8080));
//!     let listener = NetworkListener::bind(config).await?;
//!     listener.run().await
//! }
//! ```

use crate::configuration::Config;
use crate::error_handling::types::{NetworkError, SessionError};
use crate::network::session_request::SessionRequest;
use crate::session_management::session_manager::SessionManager;
use chrono::Local;
use log::{debug, error, info};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Accepts connections forever and spawns a session for each.
///
/// `NetworkListener` is responsible for:
/// - Binding the configured listen port
/// - Assigning every accepted connection the next sequence number
/// - Spawning the session without waiting for it
/// - Stopping when a session reports a fatal error
pub struct NetworkListener {
    listener: TcpListener,

    /// Shared by every session task
    session_manager: Arc<SessionManager>,

    /// Sequence number handed to the next accepted connection
    next_seq: u64,
}

impl NetworkListener {
    /// Binds `0.0.0.0:<listen_port>`.
    ///
    /// # Errors
    ///
    /// * `Err(NetworkError::BindError)` if the port cannot be bound
    pub async fn bind(config: Arc<Config>) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(config.listen_addr())
            .await
            .map_err(NetworkError::BindError)?;

        info!(
            "Start listening on port {} and forwarding data to {}",
            config.listen_port,
            config.target()
        );

        Ok(Self {
            listener,
            session_manager: Arc::new(SessionManager::new(config)),
            next_seq: 1,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn session_manager(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session_manager)
    }

    /// Runs the accept loop.
    ///
    /// Accept failures are logged and the loop keeps going. The loop only ends
    /// when a session hits a fatal error (a log file that cannot be created).
    ///
    /// # Errors
    ///
    /// * `Err(NetworkError::SessionFatal)` carrying the session's error
    pub async fn run(mut self) -> Result<(), NetworkError> {
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<SessionError>(1);

        loop {
            tokio::select! {
                Some(err) = fatal_rx.recv() => {
                    error!("{}", err);
                    return Err(NetworkError::SessionFatal(err));
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, client_addr)) => self.dispatch(stream, client_addr, &fatal_tx),
                    Err(e) => error!("Accept failed, {}", e),
                },
            }
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn dispatch(
        &mut self,
        stream: TcpStream,
        client_addr: SocketAddr,
        fatal_tx: &mpsc::Sender<SessionError>,
    ) {
        let request = SessionRequest {
            stream,
            seq: self.next_sequence(),
            client_addr,
            timestamp: Local::now(),
        };
        let seq = request.seq;
        debug!("[{:04}] accepted {}", seq, client_addr);

        let manager = Arc::clone(&self.session_manager);
        let fatal_tx = fatal_tx.clone();
        tokio::spawn(async move {
            match manager.handle_session(request).await {
                Ok(summary) => debug!(
                    "[{:04}] session complete: c2s {} packet(s), s2c {} packet(s)",
                    seq, summary.inbound.packets, summary.outbound.packets
                ),
                Err(e) if e.is_fatal() => {
                    let _ = fatal_tx.send(e).await;
                }
                Err(e) => error!("[{:04}] {}", seq, e),
            }
        });
    }
}
