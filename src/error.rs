//! Error type shared by every operation in the crate.
use thiserror::Error;

/// Errors returned by network construction, evaluation and training.
///
/// Dimension mismatches are wiring bugs in the caller: they are reported,
/// never repaired by truncating or padding vectors.
#[derive(Debug, Error)]
pub enum NnError {
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NnError>;

/// Fails with [`NnError::DimensionMismatch`] unless `actual == expected`.
pub(crate) fn ensure_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(NnError::DimensionMismatch {
            context,
            expected,
            actual,
        })
    }
}
