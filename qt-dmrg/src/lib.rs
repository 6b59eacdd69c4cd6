//! Two-site DMRG ground-state optimization over [`qt_network::Mps`]/
//! [`qt_network::Mpo`] chains.
//!
//! - [`options::DmrgOptions`]: truncation/convergence tunables;
//! - [`logger::DmrgLogger`]: sweep observer hooks, plus the
//!   [`logger::NullLogger`]/[`logger::SummaryLogger`]/[`logger::TimingLogger`]
//!   implementations;
//! - [`env::generate_env`]/[`env::compute_two_site_hamil`]: the environment
//!   and two-site-Hamiltonian preprocessing a sweep needs before its first
//!   half-step;
//! - [`lanczos::two_sites_update`]: the local two-site optimum via a
//!   two-step Lanczos recursion and closed-form 2x2 eigenproblem;
//! - [`sweep::dmrg`]/[`sweep::dmrg_with_random_state`]: the sweep loop
//!   itself.

pub mod env;
pub mod error;
pub mod lanczos;
pub mod logger;
pub mod options;
pub mod sweep;

pub use env::{compute_left_env, compute_right_env, compute_two_site_hamil, generate_env};
pub use error::{DmrgError, Result};
pub use lanczos::{eig2x2, hamil2site_times_state, one_step_lanczos, two_sites_update};
pub use logger::{DmrgLogger, NullLogger, SummaryLogger, TimingLogger};
pub use options::DmrgOptions;
pub use sweep::{dmrg, dmrg_with_random_state};

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::error::{DmrgError, Result};
    pub use crate::logger::{DmrgLogger, NullLogger, SummaryLogger, TimingLogger};
    pub use crate::options::DmrgOptions;
    pub use crate::sweep::{dmrg, dmrg_with_random_state};
}
