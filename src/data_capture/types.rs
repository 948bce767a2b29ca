//! Common data types used across the data_capture subsystem.

use std::fmt;
use std::net::SocketAddr;

/// One buffer's worth of bytes handed to a log sink. An empty chunk is the
/// stop sentinel and is never written.
pub type Chunk = Vec<u8>;

/// Direction of TCP flow for relayed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bytes flowing from the accepted client to the real server.
    InboundToOutbound,
    /// Bytes flowing from the real server back to the accepted client.
    OutboundToInbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::InboundToOutbound => write!(f, "C->S"),
            Direction::OutboundToInbound => write!(f, "S->C"),
        }
    }
}

/// Totals reported by a relay direction once it terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub packets: u64,
    pub bytes: u64,
}

/// Address rendered for use in file names and log lines: `:` becomes `-`.
pub fn printable_addr(addr: &SocketAddr) -> String {
    addr.to_string().replace(':', "-")
}
