//! Error types for the NLM pipeline.
//!
//! Only the boundary can fail: configuration and frame layout are checked
//! once before a pass starts. The stages themselves have no error path.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, NlmError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NlmError {
    /// A configuration parameter is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Encoding, bit depth or plane kind the pipeline cannot pack.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Plane count mismatch: expected {expected}, found {found}")]
    PlaneCountMismatch { expected: usize, found: usize },

    /// Shapes are `(rows, cols)` unless stated otherwise.
    #[error("Dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Frame count mismatch: expected {expected}, found {found}")]
    FrameCountMismatch { expected: usize, found: usize },
}
