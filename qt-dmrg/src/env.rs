//! Environment maintenance and two-site Hamiltonian preprocessing
//! (`spec.md` §4.8 "Preprocessing"), grounded on
//! `original_source/sources/dmrg.cpp`'s `generate_env`/`compute_left_env`/
//! `compute_right_env`/`compute_2sitesHamil`.
//!
//! An environment tensor's three axes are, in order, the bond meeting the
//! ket state, the bond meeting the Hamiltonian MPO, and the bond meeting
//! the (conjugated) bra state — the same ordering `qt-network`'s
//! `contract_with_mpo` builds for its own boundary edges. Because DMRG's
//! bra and ket are the same state, every edge and every `compute_*_env`
//! step below is the direct transliteration of the source's tensordot
//! axis lists: the axis convention was chosen to match exactly.

use qt_groups::AnyQuantity;
use qt_network::{Mpo, Mps};
use qt_tensor::{BTensor, BTensorShape};

use crate::error::Result;

/// A bond of extent 1 carrying `axis_quantities[k]` on axis `k`, composing
/// to the tensor's own (trivially satisfied) selection rule. Duplicates
/// `qt-network`'s private `edge_tensor` helper, which this crate cannot
/// reach across the crate boundary; kept here rather than exposed upstream
/// since no other `qt-network` caller needs it.
fn trivial_edge(axis_quantities: &[AnyQuantity]) -> Result<BTensor> {
    let selection_rule =
        axis_quantities.iter().skip(1).try_fold(axis_quantities[0].clone(), |acc, q| acc.compose(q))?;
    let dims = axis_quantities.iter().map(|q| vec![(1usize, q.clone())]).collect();
    let shape = BTensorShape::new(dims, selection_rule);
    let mut t = BTensor::new(shape);
    let idx = vec![0; axis_quantities.len()];
    *t.block(&idx)? = qt_dense::DenseTensor::ones(&vec![1; axis_quantities.len()]);
    Ok(t)
}

/// Extends `left_env` (ordering `(ket, hamil, bra)`) past one more site.
pub fn compute_left_env(hamil_site: &BTensor, ket_site: &BTensor, left_env: &BTensor) -> Result<BTensor> {
    let out = left_env.tensordot(ket_site, &[0], &[0])?;
    let out = out.tensordot(hamil_site, &[0, 2], &[0, 3])?;
    let out = out.tensordot(&ket_site.conj(), &[0, 2], &[0, 1])?;
    Ok(out)
}

/// Left-right mirror of [`compute_left_env`]; same axis ordering on
/// `right_env`, no axis mirroring on `hamil_site`/`ket_site`.
pub fn compute_right_env(hamil_site: &BTensor, ket_site: &BTensor, right_env: &BTensor) -> Result<BTensor> {
    let out = right_env.tensordot(ket_site, &[0], &[2])?;
    let out = out.tensordot(hamil_site, &[0, 3], &[2, 3])?;
    let out = out.tensordot(&ket_site.conj(), &[3, 0], &[1, 2])?;
    Ok(out)
}

/// The length-`L + 2` environment sequence, trivial at positions `-1` and
/// `L`; slot `k` holds the environment at conceptual position `k - 1`, so
/// the half-step update at orthogonality center `oc` reads `env[oc]` and
/// `env[oc + 3]` for its left/right environments (`spec.md` §4.8).
pub fn generate_env(hamiltonian: &Mpo, state: &Mps) -> Result<Vec<BTensor>> {
    let length = hamiltonian.len();
    let oc = state.orthogonality_center();

    let a0 = state.site(0).shape().section_qtt(0, 0);
    let op0 = hamiltonian.site(0).shape().section_qtt(0, 0);
    let left_trivial = trivial_edge(&[a0.inverse(), op0.inverse(), a0])?;

    let a_last = state.site(length - 1).shape().section_qtt(2, 0);
    let op_last = hamiltonian.site(length - 1).shape().section_qtt(2, 0);
    let right_trivial = trivial_edge(&[a_last.inverse(), op_last.inverse(), a_last])?;

    let mut env = vec![left_trivial; length + 2];
    env[length + 1] = right_trivial;

    for i in 0..oc {
        env[i + 1] = compute_left_env(hamiltonian.site(i), state.site(i), &env[i])?;
    }
    for i in (oc + 1..length).rev() {
        env[i + 1] = compute_right_env(hamiltonian.site(i), state.site(i), &env[i + 2])?;
    }
    Ok(env)
}

/// `L - 1` rank-6 tensors, each two neighbouring `H` site tensors
/// contracted on their shared virtual bond and permuted so the physical
/// indices form two groups of two: `(L, Pbra_i, Pbra_{i+1}, R, Pket_i,
/// Pket_{i+1})`.
pub fn compute_two_site_hamil(hamiltonian: &Mpo) -> Result<Vec<BTensor>> {
    let length = hamiltonian.len();
    let mut out = Vec::with_capacity(length.saturating_sub(1));
    for i in 0..length.saturating_sub(1) {
        let merged = hamiltonian.site(i).tensordot(hamiltonian.site(i + 1), &[2], &[0])?;
        out.push(merged.permute(&[0, 1, 3, 4, 2, 5])?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qt_dense::DenseTensor;
    use qt_groups::AnyQuantity;

    fn trivial_mpo(length: usize) -> Mpo {
        let mut sites = Vec::with_capacity(length);
        for i in 0..length {
            let left = if i == 0 { 1 } else { 2 };
            let right = if i == length - 1 { 1 } else { 2 };
            let shape = BTensorShape::new(
                vec![
                    vec![(left, AnyQuantity::z(0))],
                    vec![(2, AnyQuantity::z(0))],
                    vec![(right, AnyQuantity::z(0))],
                    vec![(2, AnyQuantity::z(0))],
                ],
                AnyQuantity::z(0),
            );
            let mut t = BTensor::new(shape);
            *t.block(&vec![0, 0, 0, 0]).unwrap() = DenseTensor::ones(&[left, 2, right, 2]);
            sites.push(t);
        }
        Mpo::from_sites(sites).unwrap()
    }

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
            *t.block(&vec![0, 0, 0]).unwrap() = DenseTensor::ones(&[left, 2, right]).mul_scalar(0.3);
            sites.push(t);
        }
        Mps::from_sites(sites, 0).unwrap()
    }

    #[test]
    fn generate_env_has_length_l_plus_2() {
        let hamil = trivial_mpo(4);
        let state = trivial_mps(4);
        let env = generate_env(&hamil, &state).unwrap();
        assert_eq!(env.len(), 6);
    }

    #[test]
    fn compute_two_site_hamil_has_l_minus_1_entries() {
        let hamil = trivial_mpo(4);
        let two_site = compute_two_site_hamil(&hamil).unwrap();
        assert_eq!(two_site.len(), 3);
        assert_eq!(two_site[0].rank(), 6);
    }
}
