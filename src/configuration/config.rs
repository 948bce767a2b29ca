use crate::error_handling::types::ConfigError;
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Bytes read from a connection per relay iteration.
pub const DEFAULT_BUFFER_SIZE: usize = 10 * 1024;

/// Runtime configuration of the tap, built once at startup and shared
/// read-only (behind an `Arc`) by the listener and every session.
///
/// Only the three connection parameters are exposed on the command line.
/// The remaining fields are `#[arg(skip)]` and keep their defaults unless a
/// caller (typically a test) overrides them with the `with_*` builders.
///
/// # Examples
///
/// ```
/// use tcptap::configuration::config::Config;
///
/// let config = Config::new("localhost", 8080, 9090);
/// assert_eq!(config.target(), "localhost:8080");
/// ```
#[derive(Parser, Debug, Clone)]
#[command(name = "tcptap")]
#[command(about = "Transparent TCP relay that records both directions of every connection")]
#[command(override_usage = "tcptap --host <target_host> --port <target_port> --listen-port <local_port>")]
pub struct Config {
    /// Target host or address
    #[arg(long)]
    pub host: String,

    /// Target port
    #[arg(long)]
    pub port: u16,

    /// Local port to accept connections on
    #[arg(long = "listen-port", alias = "listen_port")]
    pub listen_port: u16,

    /// Directory the per-connection log files are created in
    #[arg(skip = PathBuf::from("."))]
    pub log_dir: PathBuf,

    /// Size of the read buffer used by each relay direction
    #[arg(skip = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16, listen_port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            listen_port,
            log_dir: PathBuf::from("."),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Parses the process arguments.
    ///
    /// Returns the `clap` error untouched so the caller decides how to report
    /// it and which status to exit with.
    pub fn from_args() -> Result<Self, clap::Error> {
        Config::try_parse()
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::BufferSizeZero);
        }
        Ok(())
    }

    /// `host:port` of the real server, with IPv6 literals bracketed.
    pub fn target(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.listen_port))
    }
}
