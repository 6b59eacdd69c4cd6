//! Error types for the two-site DMRG optimizer.

use thiserror::Error;

/// Result type for `qt-dmrg` operations.
pub type Result<T> = std::result::Result<T, DmrgError>;

/// Errors surfaced by [`crate::sweep::dmrg`] and its preprocessing helpers
/// (`spec.md` §7 "DMRG does not retry on backend failures; it surfaces the
/// error and leaves the MPS in a self-consistent state").
#[derive(Error, Debug, Clone)]
pub enum DmrgError {
    /// The Hamiltonian MPO and the trial state disagree in length, or
    /// either is empty.
    #[error("hamiltonian/state length mismatch: {context}")]
    LengthMismatch {
        /// Description of the mismatch.
        context: String,
    },

    /// A chain of length < 2 was handed to the two-site sweep, which needs
    /// at least one adjacent pair to update.
    #[error("two-site sweep requires at least 2 sites, got {length}")]
    ChainTooShort {
        /// The offending chain length.
        length: usize,
    },

    /// A failure propagated from the network layer (`Mps`/`Mpo` rank or
    /// orthogonality-center contracts).
    #[error(transparent)]
    NetworkFailure(#[from] qt_network::NetworkError),

    /// A failure propagated from the block-sparse tensor layer underneath
    /// (environment contraction, SVD truncation, scalar extraction, ...).
    /// DMRG calls `BTensor` operations directly (environment updates,
    /// `tensordot`, `svd_truncated`) rather than exclusively through
    /// `qt-network`, so this sits alongside `NetworkFailure` rather than
    /// behind it.
    #[error(transparent)]
    TensorFailure(#[from] qt_tensor::TensorError),
}
