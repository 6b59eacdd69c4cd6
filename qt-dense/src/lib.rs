//! Dense tensor primitive adapter.
//!
//! This crate is the "external collaborator" (`spec.md` §6) that the
//! block-sparse layers build on: a single dense n-dimensional array backed
//! by `ndarray`, with the 2-D linear-algebra kernels (`matmul`, `svd`,
//! `symeig`) delegated to `nalgebra` via [`tensor::DenseTensor::to_matrix`]
//! and [`tensor::DenseTensor::from_matrix`].
//!
//! - [`tensor::DenseTensor`] is the storage/shape/indexing primitive.
//! - [`decompose`] holds the truncating SVD and symmetric eigendecomposition
//!   used by the block-sparse truncation policy (`spec.md` §4.6).

pub mod decompose;
pub mod error;
pub mod tensor;

pub use decompose::{svd, symeig, truncate_eigh, truncate_svd, truncated_rank, SvdResult};
pub use error::{DenseError, Result};
pub use tensor::{DenseTensor, TensorIndex};

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::decompose::{svd, symeig, truncate_eigh, truncate_svd, truncated_rank, SvdResult};
    pub use crate::error::{DenseError, Result};
    pub use crate::tensor::{DenseTensor, TensorIndex};
}
