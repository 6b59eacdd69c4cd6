//! Error types for MPT/MPS/MPO networks.

use thiserror::Error;

/// Result type for `qt-network` operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors surfaced by `Mpt`/`Mps`/`Mpo` operations (`spec.md` §7).
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    /// A site tensor failed the rank/bond-matching contract a network
    /// requires of every consecutive pair (`spec.md` §4.7 "check_ranks").
    #[error("check_ranks failed: {context}")]
    RankMismatch {
        /// Which site(s) and what was wrong.
        context: String,
    },

    /// `move_oc` was asked to move the orthogonality center outside
    /// `[0, length)`.
    #[error("invalid orthogonality center target {target} for network of length {length}")]
    InvalidOC {
        /// The requested target.
        target: i64,
        /// The network's length.
        length: usize,
    },

    /// Two networks could not be contracted: length mismatch, or an edge
    /// tensor's shape does not meet the boundary the contraction needs.
    #[error("contraction incompatible: {context}")]
    ContractionIncompatible {
        /// Description of the mismatch.
        context: String,
    },

    /// Random-string generation for `random_mps`/`random_bMPS` could not
    /// reach the target quantity within the configured pass budget.
    #[error("random string generation did not converge after {passes} passes (target distance {distance})")]
    RandomStringDidNotConverge {
        /// Passes attempted.
        passes: usize,
        /// Remaining squared distance to the target quantity.
        distance: i64,
    },

    /// A failure propagated from the block-sparse tensor layer.
    #[error(transparent)]
    TensorFailure(#[from] qt_tensor::TensorError),
}
