//! Error taxonomy shared by the core and the engine.
//!
//! Empty corpora and unbuilt vector indexes are valid states, not errors:
//! operations on them return empty results. Vector dimension faults are
//! scored as similarity `0.0` rather than raised.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The embedding capability was invoked before it was loaded, is
    /// disabled, or failed. Fatal to the call; never retried by the engine.
    #[error("embedding model not ready: {0}")]
    ModelNotReady(String),

    /// Reading or writing a persisted index file failed.
    #[error("index I/O failed for {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted index file exists but could not be (de)serialized.
    #[error("index file {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
