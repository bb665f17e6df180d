use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling the record set. Per-row problems are never
/// errors; they are counted as skipped.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("partition {partition} is not decodable")]
    Decode {
        partition: String,
        #[source]
        source: csv::Error,
    },

    #[error("partition {partition} unavailable: {reason}")]
    Unavailable { partition: String, reason: String },

    #[error("load generation {generation} superseded by a newer load")]
    Superseded { generation: u64 },
}

impl LoadError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, LoadError::Superseded { .. })
    }
}
