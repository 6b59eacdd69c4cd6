//! The two-site local update's 2×2 Lanczos step (`spec.md` §4.8 step 2,
//! §7 closed-form eigenproblem), grounded on
//! `original_source/sources/dmrg.cpp`'s `hamil2site_times_state`/
//! `eig2x2Mat`/`one_step_lanczos`/`two_sites_update`.

use qt_tensor::BTensor;

use crate::error::Result;

/// Extracts the single scalar held by a fully-contracted (rank-0) tensor.
fn scalar_of(t: &BTensor) -> Result<f64> {
    Ok(t.block_at(&Vec::new())?.item().map_err(qt_tensor::TensorError::from)?)
}

/// `H_2site · θ`, sandwiched between the two environments meeting `θ`'s
/// outer bonds. `theta` is rank 4 `(L_oc, P_oc, P_{oc+1}, R_{oc+1})`;
/// `hamil2` is rank 6 `(L, Pbra_i, Pbra_{i+1}, R, Pket_i, Pket_{i+1})`;
/// `l_env`/`r_env` are rank 3 `(ket, hamil, bra)`.
pub fn hamil2site_times_state(theta: &BTensor, hamil2: &BTensor, l_env: &BTensor, r_env: &BTensor) -> Result<BTensor> {
    let out = l_env.tensordot(theta, &[0], &[0])?;
    let out = out.tensordot(hamil2, &[0, 2, 3], &[0, 4, 5])?;
    let out = out.tensordot(r_env, &[1, 4], &[0, 1])?;
    Ok(out)
}

/// Closed-form ground state of the symmetric `[[a0, b], [b, a1]]` matrix:
/// `(energy, c0, c1)`. `b == 0` is a no-op (`spec.md` §7), which also
/// guards the `a0 == a1` case where the general formula would divide by
/// zero.
pub fn eig2x2(a0: f64, a1: f64, b: f64) -> (f64, f64, f64) {
    if b.abs() <= 1e-15 {
        return (a0, 1.0, 0.0);
    }
    let crit = ((a0 - a1).powi(2) + 4.0 * b * b).sqrt();
    let energy = (a0 + a1 - crit) / 2.0;
    let o_coeff = ((energy - a1) / -crit).sqrt();
    let n_coeff = -b * o_coeff / (a1 - energy);
    (energy, o_coeff, n_coeff)
}

/// One Lanczos step from `theta`: `(phi, a0, a1, b)`, the orthogonal
/// complement and the three matrix elements `eig2x2` needs.
pub fn one_step_lanczos(
    theta: &BTensor,
    hamil2: &BTensor,
    l_env: &BTensor,
    r_env: &BTensor,
) -> Result<(BTensor, f64, f64, f64)> {
    let h_theta = hamil2site_times_state(theta, hamil2, l_env, r_env)?;
    let a0 = scalar_of(&h_theta.tensordot(&theta.conj(), &[0, 1, 2, 3], &[0, 1, 2, 3])?)?;

    let mut phi = h_theta.scale_add(1.0, theta, -a0)?;
    let b_sq = scalar_of(&phi.tensordot(&phi.conj(), &[0, 1, 2, 3], &[0, 1, 2, 3])?)?;
    let b = b_sq.max(0.0).sqrt();
    if b.abs() > 1e-15 {
        phi = phi.mul_scalar(1.0 / b);
    }

    let h_phi = hamil2site_times_state(&phi, hamil2, l_env, r_env)?;
    let a1 = scalar_of(&phi.conj().tensordot(&h_phi, &[0, 1, 2, 3], &[0, 1, 2, 3])?)?;

    Ok((phi, a0, a1, b))
}

/// The local two-site optimum: `(energy, theta')`.
pub fn two_sites_update(theta: &BTensor, hamil2: &BTensor, l_env: &BTensor, r_env: &BTensor) -> Result<(f64, BTensor)> {
    let (phi, a0, a1, b) = one_step_lanczos(theta, hamil2, l_env, r_env)?;
    let (energy, o_coeff, n_coeff) = eig2x2(a0, a1, b);
    let updated = theta.scale_add(o_coeff, &phi, n_coeff)?;
    Ok((energy, updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eig2x2_is_a_no_op_when_b_is_zero() {
        let (energy, c0, c1) = eig2x2(-1.5, 2.0, 0.0);
        assert_eq!(energy, -1.5);
        assert_eq!(c0, 1.0);
        assert_eq!(c1, 0.0);
    }

    #[test]
    fn eig2x2_matches_hand_diagonalization_of_a_symmetric_pair() {
        // [[0, 1], [1, 0]] has eigenvalues ±1; the lower one is -1 with
        // eigenvector (1, -1)/sqrt(2) up to an overall sign/phase choice.
        let (energy, c0, c1) = eig2x2(0.0, 0.0, 1.0);
        assert!((energy - (-1.0)).abs() < 1e-10);
        assert!((c0 * c0 + c1 * c1 - 1.0).abs() < 1e-10);
    }
}
