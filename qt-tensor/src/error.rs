//! Error types for the block-sparse tensor engine.

use thiserror::Error;

/// Result type for `qt-tensor` operations.
pub type Result<T> = std::result::Result<T, TensorError>;

/// Errors surfaced by `BTensorShape`/`BTensor` operations (`spec.md` §7).
#[derive(Error, Debug, Clone)]
pub enum TensorError {
    /// A composite-quantity type mismatch bubbled up from `qt-groups`.
    #[error(transparent)]
    TypeMismatch(#[from] qt_groups::GroupError),

    /// A block was requested/allocated whose section-quantity product does
    /// not equal the tensor's selection rule.
    #[error("selection rule violation: {context}")]
    SelectionRuleViolation {
        /// What was attempted and why it conflicts with the selection rule.
        context: String,
    },

    /// Per-dim sections differed in count, size, or quantity where an
    /// operation required matching shapes.
    #[error("shape mismatch: {context}")]
    ShapeMismatch {
        /// Description of the mismatched shapes.
        context: String,
    },

    /// A `reshape_as` target's quantities do not factor the source's.
    #[error("reshape incompatible: {context}")]
    ReshapeIncompatible {
        /// Description of the incompatible quantities.
        context: String,
    },

    /// `block_at` on a missing block, or an out-of-range index/block index.
    #[error("not found: {context}")]
    NotFound {
        /// Description of what was looked up.
        context: String,
    },

    /// A failure propagated from the dense backend (SVD non-convergence,
    /// shape errors the block layer could not have prevented, ...).
    #[error(transparent)]
    DenseBackendFailure(#[from] qt_dense::DenseError),

    /// `check_tensor` found a violated invariant.
    #[error("corrupt tensor: {0}")]
    CorruptTensor(String),
}
