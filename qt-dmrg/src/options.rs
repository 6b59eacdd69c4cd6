//! Tunables for [`crate::sweep::dmrg`] (`spec.md` §4.8 "Options"),
//! grounded on `original_source/include/dmrg_options.h`'s `dmrg_options`
//! struct and its default-constant initializers.

/// Knobs controlling the two-site sweep's truncation and stopping
/// behaviour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DmrgOptions {
    /// Truncation tolerance passed to every half-step's SVD split.
    pub cutoff: f64,
    /// Sweep stops once `|E_it - E_{it-1}|` falls at or below this (a
    /// `NaN` delta also stops, since it compares false against everything).
    pub convergence_criterion: f64,
    /// Floor on the kept bond dimension at every truncation.
    pub min_bond: usize,
    /// Ceiling on the kept bond dimension at every truncation.
    pub max_bond: usize,
    /// Sweeps attempted before giving up without having converged.
    pub max_iterations: usize,
    /// Whether to keep gradient tracking enabled for the state tensors
    /// across the sweep (`spec.md` §5 "Gradient tracking": disabled by
    /// default, the dense backend call sites otherwise wrap every entry
    /// point in a no-grad scope).
    pub track_state_gradient: bool,
    /// Whether to keep gradient tracking enabled for the Hamiltonian MPO.
    pub track_hamil_gradient: bool,
}

impl Default for DmrgOptions {
    fn default() -> Self {
        DmrgOptions {
            cutoff: 1e-6,
            convergence_criterion: 1e-5,
            min_bond: 4,
            max_bond: usize::MAX,
            max_iterations: 1000,
            track_state_gradient: false,
            track_hamil_gradient: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let opts = DmrgOptions::default();
        assert_eq!(opts.cutoff, 1e-6);
        assert_eq!(opts.convergence_criterion, 1e-5);
        assert_eq!(opts.min_bond, 4);
        assert_eq!(opts.max_bond, usize::MAX);
        assert_eq!(opts.max_iterations, 1000);
        assert!(!opts.track_state_gradient);
        assert!(!opts.track_hamil_gradient);
    }
}
