//! Random-MPS construction via a greedy quantity-string search, grounded
//! on `original_source/sources/MPT.cpp`'s `generate_random_string` /
//! `random_bMPS_impl` / `make_right_side`: a product state threading one
//! quantity sector per site, nudged pass by pass until its accumulated
//! quantity matches the requested total, then filled with random dense
//! data in its single allowed block.

use rand::Rng;

use qt_dense::DenseTensor;
use qt_groups::AnyQuantity;
use qt_tensor::{BTensor, BTensorShape, DimSpec};

use crate::error::{NetworkError, Result};
use crate::mps::Mps;

/// Passes attempted before giving up, absent an explicit budget.
pub const DEFAULT_PASSES: usize = 64;

/// Builds a length-`phys_specs.len()` product-state MPS whose accumulated
/// physical quantity equals `target`, used as a DMRG initial guess
/// (`spec.md` §4.8 "initial state"). Each site's physical leg keeps its
/// full set of local sections (`phys_specs[i]`); only one is ever
/// populated, chosen by a greedy multi-pass search over the combinatorial
/// space of per-site choices that minimizes squared distance to `target`
/// at the right edge. Fails with `RandomStringDidNotConverge` if
/// `max_passes` greedy sweeps never reach distance zero.
pub fn random_mps(phys_specs: &[DimSpec], target: &AnyQuantity, max_passes: usize) -> Result<Mps> {
    random_mps_with_rng(phys_specs, target, max_passes, &mut rand::thread_rng())
}

fn random_mps_with_rng(
    phys_specs: &[DimSpec],
    target: &AnyQuantity,
    max_passes: usize,
    rng: &mut impl Rng,
) -> Result<Mps> {
    let length = phys_specs.len();
    if length == 0 {
        return Err(NetworkError::ContractionIncompatible {
            context: "cannot build a random MPS of length 0".into(),
        });
    }
    let neutral = target.neutral();

    let mut choice: Vec<usize> = phys_specs.iter().map(|spec| rng.gen_range(0..spec.len())).collect();
    let mut bonds = accumulate_bonds(phys_specs, &choice, &neutral)?;
    let mut distance = bonds[length - 1].squared_distance(target)?;

    let mut passes_used = 0;
    while distance != 0 && passes_used < max_passes {
        let mut improved = false;
        for i in 0..length {
            let left = if i == 0 { neutral } else { bonds[i - 1] };
            let mut best_choice = choice[i];
            let mut best_distance = distance;
            for c in 0..phys_specs[i].len() {
                if c == choice[i] {
                    continue;
                }
                let candidate_bond = left.compose(&phys_specs[i][c].1)?;
                let candidate_final = propagate_final_bond(phys_specs, &choice, i, candidate_bond)?;
                let candidate_distance = candidate_final.squared_distance(target)?;
                if candidate_distance < best_distance {
                    best_distance = candidate_distance;
                    best_choice = c;
                }
            }
            if best_choice != choice[i] {
                choice[i] = best_choice;
                bonds = accumulate_bonds(phys_specs, &choice, &neutral)?;
                distance = bonds[length - 1].squared_distance(target)?;
                improved = true;
                if distance == 0 {
                    break;
                }
            }
        }
        passes_used += 1;
        if !improved {
            break;
        }
    }

    if distance != 0 {
        return Err(NetworkError::RandomStringDidNotConverge { passes: passes_used, distance });
    }

    let sites = build_sites(phys_specs, &choice, &bonds, &neutral, rng)?;
    Mps::from_sites(sites, 0)
}

fn accumulate_bonds(phys_specs: &[DimSpec], choice: &[usize], neutral: &AnyQuantity) -> Result<Vec<AnyQuantity>> {
    let mut bonds = Vec::with_capacity(phys_specs.len());
    let mut acc = *neutral;
    for (i, spec) in phys_specs.iter().enumerate() {
        acc = acc.compose(&spec[choice[i]].1)?;
        bonds.push(acc);
    }
    Ok(bonds)
}

/// The chain's final accumulated quantity if site `from`'s bond were
/// `bond_at_from`, keeping every other site's current choice fixed.
fn propagate_final_bond(
    phys_specs: &[DimSpec],
    choice: &[usize],
    from: usize,
    bond_at_from: AnyQuantity,
) -> Result<AnyQuantity> {
    let mut acc = bond_at_from;
    for j in (from + 1)..phys_specs.len() {
        acc = acc.compose(&phys_specs[j][choice[j]].1)?;
    }
    Ok(acc)
}

/// Builds the site tensors of the converged string: site `i`'s left bond
/// carries `bonds[i-1]` (neutral at the left edge) literally, its right
/// bond carries `bonds[i].inverse()` — the same asymmetric convention
/// `BTensor::svd_truncated` uses for its own new bond, so every site's
/// selection rule is simply neutral (`bonds[i-1] · phys · bonds[i].inverse()
/// == neutral` by construction) and consecutive sites' bonds satisfy
/// `check_ranks`' mutual-inverse requirement automatically.
fn build_sites(
    phys_specs: &[DimSpec],
    choice: &[usize],
    bonds: &[AnyQuantity],
    neutral: &AnyQuantity,
    rng: &mut impl Rng,
) -> Result<Vec<BTensor>> {
    let length = phys_specs.len();
    let mut sites = Vec::with_capacity(length);
    for i in 0..length {
        let left_qtt = if i == 0 { *neutral } else { bonds[i - 1] };
        let right_qtt = bonds[i].inverse();
        let shape = BTensorShape::new(
            vec![vec![(1, left_qtt)], phys_specs[i].clone(), vec![(1, right_qtt)]],
            *neutral,
        );
        let mut tens = BTensor::new(shape);
        let phys_size = phys_specs[i][choice[i]].0;
        let block = tens.block(&vec![0, choice[i], 0])?;
        *block = DenseTensor::rand(&[1, phys_size, 1]);
        sites.push(tens);
    }
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qt_groups::AnyQuantity;

    fn spin_half_spec() -> DimSpec {
        vec![(1, AnyQuantity::z(1)), (1, AnyQuantity::z(-1))]
    }

    #[test]
    fn random_mps_hits_the_requested_total_quantity() {
        let phys: Vec<DimSpec> = (0..4).map(|_| spin_half_spec()).collect();
        let target = AnyQuantity::z(0);
        let mps = random_mps(&phys, &target, DEFAULT_PASSES).unwrap();
        assert_eq!(mps.len(), 4);
        assert!(mps.check_ranks());
    }

    #[test]
    fn random_mps_rejects_length_zero() {
        let target = AnyQuantity::z(0);
        assert!(random_mps(&[], &target, DEFAULT_PASSES).is_err());
    }

    #[test]
    fn random_mps_reaches_an_unreachable_parity_target_never_within_budget() {
        // Every spin-1/2 site can only contribute z(±1); an even-length
        // chain can never sum to an odd total.
        let phys: Vec<DimSpec> = (0..4).map(|_| spin_half_spec()).collect();
        let target = AnyQuantity::z(7);
        assert!(matches!(random_mps(&phys, &target, 8), Err(NetworkError::RandomStringDidNotConverge { .. })));
    }
}
