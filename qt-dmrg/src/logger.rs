//! Sweep observers (`spec.md` §4.8 "Logger"), grounded on
//! `original_source/include/dmrg_logger.h`'s `dmrg_logger`/
//! `dmrg_default_logger`/`dmrg_log_simple`/`dmrg_log_sweeptime`. The source
//! keeps separate virtual overloads per scalar/state backend type; this
//! crate has only one tensor kind, so the hooks collapse onto `f64`/`&Mps`
//! directly and the virtual dispatch becomes a plain trait object.

use qt_network::Mps;

use crate::options::DmrgOptions;

fn middle_bond_dim(state: &Mps) -> usize {
    let pos = state.len() / 2;
    let shape = state.site(pos).shape();
    shape.total_extent(0).max(shape.total_extent(2))
}

/// Observer hooks the sweep calls at well-defined points. Every hook
/// defaults to a no-op, matching `dmrg_default_logger`; implementors
/// override only the ones they care about.
pub trait DmrgLogger {
    /// Called once before the first sweep iteration.
    fn init(&mut self, _options: &DmrgOptions) {}
    /// Called with the current iteration index.
    fn log_step(&mut self, _it: usize) {}
    /// Called with the iteration's ground-state energy estimate.
    fn log_energy(&mut self, _energy: f64) {}
    /// Called with the current state, for bond-dimension inspection.
    fn log_bond_dims(&mut self, _state: &Mps) {}

    /// `log_step` + `log_energy` + `log_bond_dims` in sequence. The two
    /// `*_log_all` hooks below default to this; an override rarely needs
    /// to touch it directly.
    fn log_all(&mut self, it: usize, energy: f64, state: &Mps) {
        self.log_step(it);
        self.log_energy(energy);
        self.log_bond_dims(state);
    }

    /// Called once per sweep iteration, with that iteration's results.
    fn iteration_log_all(&mut self, it: usize, energy: f64, state: &Mps) {
        self.log_all(it, energy, state);
    }

    /// Called once after the sweep has stopped (converged or exhausted its
    /// iteration budget), with the same arguments as the final
    /// `iteration_log_all` call.
    fn final_log_all(&mut self, it: usize, energy: f64, state: &Mps) {
        self.log_all(it, energy, state);
    }
}

/// The default logger: every hook is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLogger;

impl DmrgLogger for NullLogger {}

/// Tracks only the final iteration count and the chain's middle-bond
/// dimension, skipping per-iteration bookkeeping (`dmrg_log_simple`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryLogger {
    /// The iteration index of the last call to `log_step`.
    pub iteration_count: usize,
    /// The larger of the middle site's two virtual bond dimensions, as of
    /// the last call to `log_bond_dims`.
    pub middle_bond_dim: usize,
}

impl DmrgLogger for SummaryLogger {
    fn log_step(&mut self, it: usize) {
        self.iteration_count = it;
    }

    fn log_bond_dims(&mut self, state: &Mps) {
        self.middle_bond_dim = middle_bond_dim(state);
    }

    fn iteration_log_all(&mut self, _it: usize, _energy: f64, _state: &Mps) {}
}

/// Tracks per-sweep wall-clock duration and middle-bond dimension
/// (`dmrg_log_sweeptime`).
#[derive(Debug)]
pub struct TimingLogger {
    /// The iteration index of the last call to `log_step`.
    pub iteration_count: usize,
    /// The larger of the middle site's two virtual bond dimensions, as of
    /// the last call to `log_bond_dims`.
    pub middle_bond_dim: usize,
    then: std::time::Instant,
    /// Elapsed seconds since the previous `iteration_log_all` call, one
    /// entry per iteration index.
    pub time_list: Vec<f64>,
    /// `middle_bond_dim` as of each iteration, one entry per iteration
    /// index.
    pub bond_list: Vec<usize>,
}

impl TimingLogger {
    /// A fresh logger; `init` resizes its bookkeeping vectors once the
    /// sweep's options are known.
    pub fn new() -> Self {
        TimingLogger {
            iteration_count: 0,
            middle_bond_dim: 0,
            then: std::time::Instant::now(),
            time_list: Vec::new(),
            bond_list: Vec::new(),
        }
    }
}

impl Default for TimingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl DmrgLogger for TimingLogger {
    fn init(&mut self, options: &DmrgOptions) {
        self.then = std::time::Instant::now();
        self.time_list = vec![0.0; options.max_iterations];
        self.bond_list = vec![0; options.max_iterations];
    }

    fn log_step(&mut self, it: usize) {
        self.iteration_count = it;
    }

    fn log_energy(&mut self, _energy: f64) {}

    fn log_bond_dims(&mut self, state: &Mps) {
        self.middle_bond_dim = middle_bond_dim(state);
    }

    fn iteration_log_all(&mut self, it: usize, energy: f64, state: &Mps) {
        let now = std::time::Instant::now();
        let elapsed = now.duration_since(self.then).as_secs_f64();
        self.then = now;
        self.log_bond_dims(state);
        if let Some(slot) = self.bond_list.get_mut(it) {
            *slot = self.middle_bond_dim;
        }
        if let Some(slot) = self.time_list.get_mut(it) {
            *slot = elapsed;
        }
        self.log_step(it);
        self.log_energy(energy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qt_dense::DenseTensor;
    use qt_groups::AnyQuantity;
    use qt_tensor::{BTensor, BTensorShape};

    fn trivial_mps(length: usize) -> Mps {
        let mut sites = Vec::with_capacity(length);
        for i in 0..length {
            let left = if i == 0 { 1 } else { 2 };
            let right = if i == length - 1 { 1 } else { 2 };
            let shape = BTensorShape::new(
                vec![
                    vec![(left, AnyQuantity::z(0))],
                    vec![(2, AnyQuantity::z(0))],
                    vec![(right, AnyQuantity::z(0))],
                ],
                AnyQuantity::z(0),
            );
            let mut t = BTensor::new(shape);
            *t.block(&vec![0, 0, 0]).unwrap() = DenseTensor::ones(&[left, 2, right]);
            sites.push(t);
        }
        Mps::from_sites(sites, 0).unwrap()
    }

    #[test]
    fn summary_logger_only_updates_on_final_log_all() {
        let state = trivial_mps(5);
        let mut logger = SummaryLogger::default();
        logger.iteration_log_all(3, -1.0, &state);
        assert_eq!(logger.iteration_count, 0);
        logger.final_log_all(3, -1.0, &state);
        assert_eq!(logger.iteration_count, 3);
        assert_eq!(logger.middle_bond_dim, 2);
    }

    #[test]
    fn timing_logger_records_one_slot_per_iteration() {
        let state = trivial_mps(5);
        let mut logger = TimingLogger::new();
        logger.init(&DmrgOptions { max_iterations: 4, ..DmrgOptions::default() });
        logger.iteration_log_all(0, -1.0, &state);
        logger.iteration_log_all(1, -1.2, &state);
        assert_eq!(logger.iteration_count, 1);
        assert_eq!(logger.bond_list[1], 2);
        assert_eq!(logger.bond_list.len(), 4);
    }
}
