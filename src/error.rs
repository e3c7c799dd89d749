use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the dataset engine.
///
/// Filters that reference an unmapped dimension and mapping overrides that
/// point at unknown columns are corrected silently and never show up here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The uploaded bytes could not be turned into a table. The store keeps
    /// whatever it held before the failed load.
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    /// A request parameter is out of range or unparsable.
    #[error("invalid filter parameter '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    /// A read operation was issued before any dataset was loaded.
    #[error("no dataset loaded")]
    NoDataset,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV export: {0}")]
    Export(#[from] csv::Error),
}

impl EngineError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        EngineError::MalformedInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_filter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidFilter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
