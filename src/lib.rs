pub mod configuration;
pub mod data_capture;
pub mod error_handling;
pub mod network;
pub mod session_management;

pub use session_management::SessionStatus;
