//! Inbound side of the tap: the accept loop and the requests it hands to
//! the session layer.

pub mod network_listener;
pub mod session_request;

pub use network_listener::NetworkListener;
pub use session_request::SessionRequest;
