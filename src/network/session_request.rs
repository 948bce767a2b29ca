use chrono::{DateTime, Local};
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// An accepted connection waiting to be driven through its session.
pub struct SessionRequest {
    pub stream: TcpStream,
    /// Accept-order sequence number, starting at 1 and never reused.
    pub seq: u64,
    pub client_addr: SocketAddr,
    pub timestamp: DateTime<Local>,
}
