//! Error types for simpleq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Work was offered after the queue declared that no more would arrive.
    #[error("queue '{queue}' is closed to new work")]
    Closed { queue: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker thread failed: {0}")]
    Worker(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the enqueue-after-close protocol violation.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
