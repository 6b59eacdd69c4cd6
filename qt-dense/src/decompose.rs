//! Dense SVD and symmetric eigendecomposition kernels
//! (`spec.md` §6, §4.6), backed by `nalgebra`.

use nalgebra::DMatrix;

use crate::error::{DenseError, Result};
use crate::tensor::DenseTensor;

/// `A = U * diag(d) * V^T`. `d` is sorted in non-increasing order, matching
/// `nalgebra`'s convention and the ordering `spec.md` §4.6 assumes for
/// `truncate`.
pub struct SvdResult {
    /// Left singular vectors, shape `(m, k)`.
    pub u: DenseTensor,
    /// Singular values, shape `(k,)`, non-increasing.
    pub d: Vec<f64>,
    /// Right singular vectors (already transposed), shape `(k, n)`.
    pub v_t: DenseTensor,
}

/// Full (non-truncated) SVD of a rank-2 `DenseTensor`.
///
/// `some = true` requests the economy-size decomposition (`k = min(m,n)`
/// columns/rows); `some = false` is not supported by the real-valued
/// backend beyond the economy size and is treated identically, since a
/// block-sparse pane's natural size already matches the economy case.
pub fn svd(a: &DenseTensor, _some: bool) -> Result<SvdResult> {
    let matrix = a.to_matrix()?;
    let (nrows, ncols) = matrix.shape();
    if nrows == 0 || ncols == 0 {
        return Ok(SvdResult {
            u: DenseTensor::zeros(&[nrows, 0]),
            d: Vec::new(),
            v_t: DenseTensor::zeros(&[0, ncols]),
        });
    }
    let decomposition = nalgebra::linalg::SVD::new(matrix, true, true);
    let u = decomposition
        .u
        .ok_or_else(|| DenseError::BackendFailure("SVD did not produce U".into()))?;
    let v_t = decomposition
        .v_t
        .ok_or_else(|| DenseError::BackendFailure("SVD did not produce V^T".into()))?;
    let d: Vec<f64> = decomposition.singular_values.iter().copied().collect();
    Ok(SvdResult { u: DenseTensor::from_matrix(u), d, v_t: DenseTensor::from_matrix(v_t) })
}

/// Symmetric eigendecomposition `A = Q * diag(e) * Q^T`.
///
/// `upper`: when `true`, only the strictly-upper triangle (and diagonal) of
/// `A` is trusted to hold the symmetric content; `nalgebra`'s
/// `SymmetricEigen` reads the lower triangle, so we transpose first in that
/// case (`spec.md` §6: `symeig(matrix, upper=false)`).
pub fn symeig(a: &DenseTensor, upper: bool) -> Result<(Vec<f64>, DenseTensor)> {
    let matrix = a.to_matrix()?;
    let (nrows, ncols) = matrix.shape();
    if nrows != ncols {
        return Err(DenseError::ShapeMismatch { context: "symeig requires a square matrix".into() });
    }
    let matrix = if upper { matrix.transpose() } else { matrix };
    let decomposition = nalgebra::linalg::SymmetricEigen::new(matrix);
    let eigenvalues: Vec<f64> = decomposition.eigenvalues.iter().copied().collect();
    Ok((eigenvalues, DenseTensor::from_matrix(decomposition.eigenvectors)))
}

/// Drop the smallest (by `|d_i|^pow`, summed from the tail) singular
/// values/vectors of an SVD result, subject to `min_size <= k <= max_size`
/// (`spec.md` §4.6 `truncate`).
///
/// `d` is assumed sorted in non-increasing absolute value. Let
/// `T(k) = sum_{j>=k} |d_j|^pow`; the retained count is the smallest `k`
/// with `T(k) <= tol`, clamped into `[min_size, max_size]`.
pub fn truncate_svd(
    u: &DenseTensor,
    d: &[f64],
    v_t: &DenseTensor,
    tol: f64,
    pow: f64,
    min_size: usize,
    max_size: usize,
) -> Result<(DenseTensor, Vec<f64>, DenseTensor)> {
    let keep = truncated_rank(d, tol, pow, min_size, max_size);
    let u_trunc = u.index(&[
        crate::tensor::TensorIndex::Full,
        crate::tensor::TensorIndex::slice(0, keep),
    ])?;
    let v_trunc = v_t.index(&[
        crate::tensor::TensorIndex::slice(0, keep),
        crate::tensor::TensorIndex::Full,
    ])?;
    Ok((u_trunc, d[..keep].to_vec(), v_trunc))
}

/// The `eigh` analogue of [`truncate_svd`] (`pow = 1`, no `v`).
pub fn truncate_eigh(
    q: &DenseTensor,
    e: &[f64],
    tol: f64,
    min_size: usize,
    max_size: usize,
) -> Result<(DenseTensor, Vec<f64>)> {
    let keep = truncated_rank(e, tol, 1.0, min_size, max_size);
    let q_trunc = q.index(&[
        crate::tensor::TensorIndex::Full,
        crate::tensor::TensorIndex::slice(0, keep),
    ])?;
    Ok((q_trunc, e[..keep].to_vec()))
}

/// Smallest `k` with `sum_{j>=k} |values[j]|^pow <= tol`, clamped to
/// `[min_size, max_size]` and to the available length. Exposed for callers
/// (e.g. the block-sparse truncation policy) that pool singular/eigen
/// values across several dense panes before picking one global rank.
pub fn truncated_rank(values: &[f64], tol: f64, pow: f64, min_size: usize, max_size: usize) -> usize {
    let n = values.len();
    let max_size = max_size.min(n);
    let min_size = min_size.min(max_size);
    if n == 0 {
        return 0;
    }
    let mut tail: f64 = 0.0;
    let mut suffix = vec![0.0_f64; n + 1];
    for j in (0..n).rev() {
        tail += values[j].abs().powf(pow);
        suffix[j] = tail;
    }
    let mut k = n;
    for candidate in (min_size..=max_size).rev() {
        if suffix[candidate] <= tol {
            k = candidate;
        } else {
            break;
        }
    }
    k.clamp(min_size, max_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn tensor_from_2d(rows: &[&[f64]]) -> DenseTensor {
        let nrows = rows.len();
        let ncols = rows[0].len();
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        DenseTensor::from_array(ndarray::ArrayD::from_shape_vec(IxDyn(&[nrows, ncols]), flat).unwrap())
    }

    #[test]
    fn svd_reconstructs_input() {
        let a = tensor_from_2d(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]);
        let result = svd(&a, true).unwrap();
        let d_diag = {
            let n = result.d.len();
            let mut m = DenseTensor::zeros(&[n, n]);
            for (i, &v) in result.d.iter().enumerate() {
                m.index_put(&[crate::tensor::TensorIndex::Int(i), crate::tensor::TensorIndex::Int(i)], &DenseTensor::from_array(ndarray::ArrayD::from_elem(IxDyn(&[]), v))).unwrap();
            }
            m
        };
        let recon = DenseTensor::addmm(&DenseTensor::zeros(&[3, result.d.len()]), &result.u, &d_diag, 0.0, 1.0).unwrap();
        let recon = DenseTensor::addmm(&DenseTensor::zeros(&[3, 2]), &recon, &result.v_t, 0.0, 1.0).unwrap();
        assert!(recon.allclose(&a, 1e-8, 1e-8));
    }

    #[test]
    fn truncated_rank_respects_tolerance_and_bounds() {
        let d = vec![10.0, 5.0, 1.0, 0.01];
        // tol sits well below the smallest discardable tail (0.01^2 = 1e-4),
        // not on top of it, so the comparison isn't a floating-point tie.
        let k = truncated_rank(&d, 1e-6, 2.0, 1, 10);
        assert_eq!(k, 4);
        let k_small_tol = truncated_rank(&d, 10.0, 2.0, 1, 10);
        assert!(k_small_tol < 4);
        let k_min = truncated_rank(&d, 1000.0, 2.0, 2, 10);
        assert_eq!(k_min, 2);
    }

    #[test]
    fn symeig_reconstructs_symmetric_matrix() {
        let a = tensor_from_2d(&[&[2.0, 1.0], &[1.0, 2.0]]);
        let (eigs, q) = symeig(&a, false).unwrap();
        assert_eq!(eigs.len(), 2);
        let q_mat = q.to_matrix().unwrap();
        let d_mat = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(eigs));
        let recon = &q_mat * d_mat * q_mat.transpose();
        let recon = DenseTensor::from_matrix(recon);
        assert!(recon.allclose(&a, 1e-8, 1e-8));
    }
}
