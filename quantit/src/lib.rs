//! # QuantiT
//!
//! A symmetry-aware block-sparse tensor engine and a two-site DMRG
//! ground-state optimizer for 1D quantum lattice Hamiltonians.
//!
//! ## Overview
//!
//! This meta-crate re-exports five layered libraries:
//!
//! - **[qt_groups]** - composite Abelian conserved-quantity value types
//!   (`Z`, `C<N>`, and runtime-polymorphic compositions of both)
//! - **[qt_dense]** - the dense n-dimensional array primitive the
//!   block-sparse layers are built on, with `nalgebra`-backed SVD/symeig
//! - **[qt_tensor]** - the block-sparse tensor itself: per-axis section
//!   partitioning, a selection rule, and the permute/reshape/tensordot/SVD
//!   operations that respect it
//! - **[qt_network]** - matrix product states and operators built from
//!   `BTensor` chains, their orthogonality-center bookkeeping, and
//!   contraction
//! - **[qt_dmrg]** - the two-site DMRG sweep that optimizes an `Mps`
//!   against an `Mpo` Hamiltonian toward its ground state
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use quantit::qt_groups::AnyQuantity;
//! use quantit::qt_dmrg::{dmrg, DmrgOptions, NullLogger};
//! use quantit::qt_network::{Mpo, Mps};
//!
//! # fn example(hamiltonian: Mpo, mut state: Mps) -> quantit::qt_dmrg::Result<()> {
//! let options = DmrgOptions::default();
//! let mut logger = NullLogger;
//! let ground_energy = dmrg(&hamiltonian, &mut state, &options, &mut logger)?;
//! println!("E0 = {ground_energy}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Layering
//!
//! ```text
//! qt-groups  (conserved quantities)
//!     |
//! qt-dense   (dense backend: ndarray + nalgebra)
//!     |
//! qt-tensor  (block-sparse tensor engine)
//!     |
//! qt-network (MPS/MPO chains)
//!     |
//! qt-dmrg    (two-site ground-state sweep)
//! ```

pub use qt_dense;
pub use qt_dmrg;
pub use qt_groups;
pub use qt_network;
pub use qt_tensor;

pub use nalgebra;
pub use ndarray;

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use qt_dense::{DenseTensor, TensorIndex};
    pub use qt_dmrg::{dmrg, dmrg_with_random_state, DmrgLogger, DmrgOptions, NullLogger, SummaryLogger, TimingLogger};
    pub use qt_groups::{AbelianGroup, AnyQuantity, Quantity, C, Z};
    pub use qt_network::{contract, contract_with_mpo, random_mps, Mpo, Mps, Mpt};
    pub use qt_tensor::{BTensor, BTensorShape, BlockIndex, DimSpec};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_exposes_one_type_per_layer() {
        use crate::prelude::*;

        let q = AnyQuantity::z(0);
        let shape = BTensorShape::new(vec![vec![(1, q.clone())]], q);
        let _t = BTensor::new(shape);
        let _opts = DmrgOptions::default();
        let _logger = NullLogger;
    }
}
