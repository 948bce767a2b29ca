pub mod config;

pub use config::{Config, DEFAULT_BUFFER_SIZE};
