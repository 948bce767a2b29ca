pub mod hex_dump;
pub mod log_sink;
pub mod recorder;
pub mod relay_direction;
pub mod types;

pub use log_sink::{LogSink, SinkWriter};
pub use recorder::{LogFileNames, LogFilePaths, SessionRecorder};
pub use relay_direction::{Hangup, RelayDirection, RelayLogs};
pub use types::{Chunk, Direction, RelayStats};
