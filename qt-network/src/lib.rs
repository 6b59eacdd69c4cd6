//! Tensor-train networks built on [`qt_tensor::BTensor`]: matrix product
//! states/operators, their orthogonality-center bookkeeping, and the
//! contractions that pair them up.
//!
//! - [`mpt::Mpt`]: a bare sequence of site tensors, no rank contract
//!   attached;
//! - [`mps::Mps`]: a chain of rank-3 sites carrying an orthogonality
//!   center, plus [`mps::contract`]/[`mps::contract_with_mpo`];
//! - [`mpo::Mpo`]: a chain of rank-4 sites, plus gauge-sweep [`mpo::Mpo::coalesce`];
//! - [`random::random_mps`]: greedy quantity-string sampling for an
//!   initial guess MPS.

pub mod error;
pub mod mpo;
pub mod mps;
pub mod mpt;
pub mod random;

pub use error::{NetworkError, Result};
pub use mpo::Mpo;
pub use mps::{contract, contract_with_mpo, Mps};
pub use mpt::Mpt;
pub use random::random_mps;

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::error::{NetworkError, Result};
    pub use crate::mpo::Mpo;
    pub use crate::mps::{contract, contract_with_mpo, Mps};
    pub use crate::mpt::Mpt;
    pub use crate::random::random_mps;
}
