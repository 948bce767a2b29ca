//! Session management core module.
//!
//! A session is the full lifecycle of one accepted connection and the
//! outbound connection dialed for it: dial, record, relay both directions,
//! and finalize the log files once both directions are done.

/// Submodule for session data structures.
pub mod session;
/// Submodule driving one session from dial to finalize.
pub mod session_manager;


/// Represents the current status of a session.
///
/// Variants:
/// - `Active`: both relay directions may still be running.
/// - `Completed`: both directions finished and the log files are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
}
