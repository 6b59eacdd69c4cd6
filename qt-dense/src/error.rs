//! Error types for the dense-tensor adapter.

use thiserror::Error;

/// Result type for `qt-dense` operations.
pub type Result<T> = std::result::Result<T, DenseError>;

/// Errors surfaced by the dense-tensor primitive.
#[derive(Error, Debug, Clone)]
pub enum DenseError {
    /// Shapes were incompatible for the requested operation (reshape,
    /// elementwise combination, tensordot axis pairing, ...).
    #[error("dense shape mismatch: {context}")]
    ShapeMismatch {
        /// Description of what was expected versus what was found.
        context: String,
    },

    /// The underlying dense linear-algebra kernel failed to converge or
    /// otherwise could not produce a result (`spec.md` §7:
    /// `DenseBackendFailure`).
    #[error("dense backend failure: {0}")]
    BackendFailure(String),

    /// `index`/`index_put` received an out-of-range index.
    #[error("index {index} out of range for extent {extent}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The valid extent along that dimension.
        extent: usize,
    },
}
