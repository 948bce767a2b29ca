//! Error types shared by every subsystem of the tap.

pub mod types;
