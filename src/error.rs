//! Crate-wide error types.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error produced by a fallible unit of work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// Statistics were requested for an empty sample sequence.
    #[error("insufficient data: statistics need at least one sample")]
    InsufficientData,

    /// The report target could not be created or opened.
    #[error("sink unavailable: {}: {source}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line tracer is already attached to the current thread.
    #[error("a line tracer is already attached to this thread")]
    TraceAttachmentConflict,

    #[error("repeat must be at least 1")]
    InvalidRepeat,

    /// The unit of work failed, aborting the session.
    #[error("trial {trial} failed: {source}")]
    Trial {
        trial: u32,
        #[source]
        source: BoxError,
    },

    #[error("invalid line filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("config error: {0}")]
    Config(#[from] clap::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
