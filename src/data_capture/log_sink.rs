//! Queue-fed, append-only log files.
//!
//! A [`LogSink`] owns one freshly created file and a consumer task that
//! drains an ordered queue of [`Chunk`]s into it, forcing each write to disk
//! before taking the next one. Producers hold [`SinkWriter`] clones. The
//! queue holds a single chunk, so a producer waits while the sink is busy.
//!
//! A zero-length chunk is the stop sentinel: the consumer closes the file and
//! exits without writing anything for it.

use std::path::{Path, PathBuf};

use log::{debug, error, trace, warn};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::types::Chunk;
use crate::error_handling::types::CaptureError;

/// Chunks a sink accepts before producers start waiting on it.
pub const SINK_QUEUE_CAPACITY: usize = 1;

/// Producer side of a [`LogSink`]. Clones enqueue into the same ordered queue.
#[derive(Debug, Clone)]
pub struct SinkWriter {
    tx: mpsc::Sender<Chunk>,
}

impl SinkWriter {
    /// Enqueues `chunk`, waiting until the sink has room for it.
    ///
    /// An empty chunk is forwarded as-is and therefore stops the sink.
    ///
    /// # Errors
    /// [`CaptureError::SinkClosed`] once the sink has processed its sentinel.
    pub async fn log(&self, chunk: impl Into<Chunk>) -> Result<(), CaptureError> {
        self.tx
            .send(chunk.into())
            .await
            .map_err(|_| CaptureError::SinkClosed)
    }
}

/// Owner of one log file and the task writing to it.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    writer: SinkWriter,
    worker: JoinHandle<u64>,
}

impl LogSink {
    /// Creates (truncating) the file at `path` and starts the consumer task.
    ///
    /// # Errors
    /// [`CaptureError::SinkCreateFailed`] if the file cannot be created.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let path = path.into();
        let file = File::create(&path)
            .await
            .map_err(|source| CaptureError::SinkCreateFailed {
                path: path.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel(SINK_QUEUE_CAPACITY);
        let worker = tokio::spawn(consume(path.clone(), file, rx));
        debug!("Log sink opened at {}", path.display());

        Ok(Self {
            path,
            writer: SinkWriter { tx },
            worker,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn writer(&self) -> SinkWriter {
        self.writer.clone()
    }

    /// Sends the stop sentinel and waits for the file to be released.
    ///
    /// Returns the number of content bytes written over the sink's lifetime.
    pub async fn close(self) -> u64 {
        // Fails only if the consumer already stopped on an earlier sentinel.
        let _ = self.writer.log(Chunk::new()).await;
        match self.worker.await {
            Ok(written) => written,
            Err(e) => {
                error!("Log sink task for {} failed: {}", self.path.display(), e);
                0
            }
        }
    }
}

async fn consume(path: PathBuf, mut file: File, mut rx: mpsc::Receiver<Chunk>) -> u64 {
    let mut written = 0u64;

    while let Some(chunk) = rx.recv().await {
        if chunk.is_empty() {
            trace!("Stop sentinel received for {}", path.display());
            break;
        }
        if let Err(e) = file.write_all(&chunk).await {
            warn!("Write to {} failed: {}", path.display(), e);
            continue;
        }
        written += chunk.len() as u64;
        if let Err(e) = file.sync_data().await {
            warn!("Sync of {} failed: {}", path.display(), e);
        }
    }

    if let Err(e) = file.flush().await {
        warn!("Flush of {} failed: {}", path.display(), e);
    }
    debug!("Log sink closed at {} ({} bytes)", path.display(), written);
    written
}
