//! `DenseTensor`: the dense-tensor primitive exposed to `qt-tensor`'s block
//! store (`spec.md` §6). Storage is `ndarray::ArrayD<f64>`; rank-2 kernels
//! (matmul, SVD, symmetric eigh) are delegated to `nalgebra::DMatrix<f64>`.

use nalgebra::DMatrix;
use ndarray::{ArrayD, IxDyn};
use rand_distr::{Distribution, StandardNormal};

use crate::error::{DenseError, Result};

/// A single-axis index expression for [`DenseTensor::index`] /
/// [`DenseTensor::index_put`], modelled after NumPy-style indexing
/// (`spec.md` §4.5 "Indexing / views").
#[derive(Clone, Debug)]
pub enum TensorIndex {
    /// Select one position, dropping the axis.
    Int(usize),
    /// Keep a contiguous, strided range `[start, end)` step `step`.
    Slice {
        /// Inclusive lower bound.
        start: usize,
        /// Exclusive upper bound.
        end: usize,
        /// Stride along the axis.
        step: usize,
    },
    /// Keep the axis untouched.
    Full,
}

impl TensorIndex {
    /// A unit-step slice shorthand.
    pub fn slice(start: usize, end: usize) -> Self {
        TensorIndex::Slice { start, end, step: 1 }
    }
}

/// Dense tensor handle. Real-valued `f64`; complex-valued SVD phase
/// conventions are out of scope (`spec.md` §1 Non-goals).
#[derive(Clone, Debug, PartialEq)]
pub struct DenseTensor {
    data: ArrayD<f64>,
}

impl DenseTensor {
    /// Wrap an existing `ndarray` array.
    pub fn from_array(data: ArrayD<f64>) -> Self {
        DenseTensor { data }
    }

    /// Borrow the underlying `ndarray` array.
    pub fn as_array(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Consume `self`, returning the underlying `ndarray` array.
    pub fn into_array(self) -> ArrayD<f64> {
        self.data
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> Vec<usize> {
        self.data.shape().to_vec()
    }

    /// Rank (number of dimensions) of the tensor.
    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// A tensor of zeros with the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        DenseTensor { data: ArrayD::zeros(IxDyn(shape)) }
    }

    /// A tensor of ones with the given shape.
    pub fn ones(shape: &[usize]) -> Self {
        DenseTensor { data: ArrayD::ones(IxDyn(shape)) }
    }

    /// A tensor the same shape as `self`, filled with zeros.
    pub fn zeros_like(&self) -> Self {
        DenseTensor::zeros(&self.shape())
    }

    /// A tensor the same shape as `self`, filled with ones.
    pub fn ones_like(&self) -> Self {
        DenseTensor::ones(&self.shape())
    }

    /// Standard-normal random tensor of the given shape.
    pub fn rand(shape: &[usize]) -> Self {
        let mut rng = rand::thread_rng();
        let data = ArrayD::from_shape_fn(IxDyn(shape), |_| StandardNormal.sample(&mut rng));
        DenseTensor { data }
    }

    /// Standard-normal random tensor the same shape as `self`.
    pub fn rand_like(&self) -> Self {
        DenseTensor::rand(&self.shape())
    }

    /// Extract the single scalar value of a rank-0 (or all-singleton-shape)
    /// tensor.
    pub fn item(&self) -> Result<f64> {
        if self.data.len() != 1 {
            return Err(DenseError::ShapeMismatch {
                context: format!("item() requires exactly one element, found shape {:?}", self.shape()),
            });
        }
        Ok(*self.data.iter().next().unwrap())
    }

    /// Infinity norm (largest absolute entry); used by block-sparse
    /// construction's `cutoff` test (`spec.md` §4.4).
    pub fn inf_norm(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()))
    }

    /// Frobenius norm.
    pub fn norm2(&self) -> f64 {
        self.data.iter().map(|&x| x * x).sum::<f64>().sqrt()
    }

    /// `self + other`, elementwise.
    pub fn add(&self, other: &DenseTensor) -> Result<DenseTensor> {
        self.scale_add(1.0, other, 1.0)
    }

    /// `alpha * self + beta * other`, elementwise. Both must share shape.
    pub fn scale_add(&self, alpha: f64, other: &DenseTensor, beta: f64) -> Result<DenseTensor> {
        if self.shape() != other.shape() {
            return Err(DenseError::ShapeMismatch {
                context: format!("scale_add shapes differ: {:?} vs {:?}", self.shape(), other.shape()),
            });
        }
        let data = &self.data * alpha + &other.data * beta;
        Ok(DenseTensor { data })
    }

    /// `self * scalar`, elementwise.
    pub fn mul_scalar(&self, scalar: f64) -> DenseTensor {
        DenseTensor { data: &self.data * scalar }
    }

    /// `self + scalar`, elementwise (every entry).
    pub fn add_scalar(&self, scalar: f64) -> DenseTensor {
        DenseTensor { data: &self.data + scalar }
    }

    /// Real-valued conjugate: identity. Kept for interface parity with
    /// the complex-capable backend surface described in `spec.md` §6;
    /// complex scalars are out of scope here (§1 Non-goals).
    pub fn conj(&self) -> DenseTensor {
        self.clone()
    }

    /// Swap two axes.
    pub fn transpose(&self, i: usize, j: usize) -> Result<DenseTensor> {
        let rank = self.rank();
        if i >= rank || j >= rank {
            return Err(DenseError::ShapeMismatch {
                context: format!("transpose axes ({i}, {j}) out of range for rank {rank}"),
            });
        }
        let mut perm: Vec<usize> = (0..rank).collect();
        perm.swap(i, j);
        self.permute(&perm)
    }

    /// Reorder axes according to `perm` (a permutation of `0..rank`).
    pub fn permute(&self, perm: &[usize]) -> Result<DenseTensor> {
        if perm.len() != self.rank() {
            return Err(DenseError::ShapeMismatch {
                context: format!("permute expects {} indices, got {}", self.rank(), perm.len()),
            });
        }
        let permuted = self.data.clone().permuted_axes(IxDyn(perm));
        Ok(DenseTensor { data: permuted.as_standard_layout().to_owned() })
    }

    /// Reshape to `sizes`, which must have the same total element count.
    pub fn reshape(&self, sizes: &[usize]) -> Result<DenseTensor> {
        let total: usize = sizes.iter().product();
        if total != self.data.len() {
            return Err(DenseError::ShapeMismatch {
                context: format!(
                    "reshape total element count mismatch: {} vs target {:?} ({})",
                    self.data.len(),
                    sizes,
                    total
                ),
            });
        }
        let standard = self.data.as_standard_layout().to_owned();
        let reshaped = standard
            .into_shape(IxDyn(sizes))
            .map_err(|e| DenseError::ShapeMismatch { context: e.to_string() })?;
        Ok(DenseTensor { data: reshaped })
    }

    /// Read a sub-tensor according to per-axis [`TensorIndex`] selectors.
    pub fn index(&self, idx: &[TensorIndex]) -> Result<DenseTensor> {
        let (ranges, keep, out_shape) = self.resolve_selectors(idx)?;
        let mut out = ArrayD::zeros(IxDyn(&out_shape));
        let mut src_idx = Vec::with_capacity(ranges.len());
        let mut out_idx = Vec::with_capacity(out_shape.len());
        copy_selection(&self.data, &ranges, &keep, &mut out, &mut src_idx, &mut out_idx);
        Ok(DenseTensor { data: out })
    }

    /// Write `rhs` into the sub-tensor selected by `idx`.
    pub fn index_put(&mut self, idx: &[TensorIndex], rhs: &DenseTensor) -> Result<()> {
        let (ranges, keep, out_shape) = self.resolve_selectors(idx)?;
        if rhs.shape() != out_shape {
            return Err(DenseError::ShapeMismatch {
                context: format!(
                    "index_put rhs shape {:?} does not match selection shape {:?}",
                    rhs.shape(),
                    out_shape
                ),
            });
        }
        let mut dst_idx = Vec::with_capacity(ranges.len());
        let mut rhs_idx = Vec::with_capacity(out_shape.len());
        write_selection(&mut self.data, &ranges, &keep, &rhs.data, &mut dst_idx, &mut rhs_idx);
        Ok(())
    }

    /// Resolve per-axis selectors into (per-axis candidate positions,
    /// whether the axis survives into the output, output shape).
    fn resolve_selectors(&self, idx: &[TensorIndex]) -> Result<(Vec<Vec<usize>>, Vec<bool>, Vec<usize>)> {
        if idx.len() != self.rank() {
            return Err(DenseError::ShapeMismatch {
                context: format!("index expects {} selectors, got {}", self.rank(), idx.len()),
            });
        }
        let shape = self.shape();
        let mut ranges = Vec::with_capacity(idx.len());
        let mut keep = Vec::with_capacity(idx.len());
        let mut out_shape = Vec::new();
        for (d, sel) in idx.iter().enumerate() {
            match sel {
                TensorIndex::Int(i) => {
                    check_bound(*i, shape[d])?;
                    ranges.push(vec![*i]);
                    keep.push(false);
                }
                TensorIndex::Slice { start, end, step } => {
                    let mut positions = Vec::new();
                    let mut p = *start;
                    let stride = (*step).max(1);
                    while p < (*end).min(shape[d]) {
                        positions.push(p);
                        p += stride;
                    }
                    out_shape.push(positions.len());
                    ranges.push(positions);
                    keep.push(true);
                }
                TensorIndex::Full => {
                    out_shape.push(shape[d]);
                    ranges.push((0..shape[d]).collect());
                    keep.push(true);
                }
            }
        }
        Ok((ranges, keep, out_shape))
    }

    /// Contract `self` over `axes_a` with `other` over `axes_b`
    /// (`spec.md` §6: `tensordot(a, b, dimsA, dimsB)`). Paired axes must
    /// have matching extents.
    pub fn tensordot(&self, other: &DenseTensor, axes_a: &[usize], axes_b: &[usize]) -> Result<DenseTensor> {
        if axes_a.len() != axes_b.len() {
            return Err(DenseError::ShapeMismatch {
                context: "tensordot axis lists must have equal length".into(),
            });
        }
        let shape_a = self.shape();
        let shape_b = other.shape();
        for (&ia, &ib) in axes_a.iter().zip(axes_b) {
            if shape_a[ia] != shape_b[ib] {
                return Err(DenseError::ShapeMismatch {
                    context: format!("tensordot contracted extents differ: {} (axis {ia}) vs {} (axis {ib})", shape_a[ia], shape_b[ib]),
                });
            }
        }

        let free_a: Vec<usize> = (0..shape_a.len()).filter(|d| !axes_a.contains(d)).collect();
        let free_b: Vec<usize> = (0..shape_b.len()).filter(|d| !axes_b.contains(d)).collect();

        let perm_a: Vec<usize> = free_a.iter().chain(axes_a.iter()).copied().collect();
        let perm_b: Vec<usize> = axes_b.iter().chain(free_b.iter()).copied().collect();

        let contract_size: usize = axes_a.iter().map(|&d| shape_a[d]).product();
        let free_a_size: usize = free_a.iter().map(|&d| shape_a[d]).product();
        let free_b_size: usize = free_b.iter().map(|&d| shape_b[d]).product();

        let a_mat = self.permute(&perm_a)?.reshape(&[free_a_size, contract_size])?;
        let b_mat = other.permute(&perm_b)?.reshape(&[contract_size, free_b_size])?;

        let product = matmul(&a_mat.data, &b_mat.data)?;

        let mut out_shape: Vec<usize> = free_a.iter().map(|&d| shape_a[d]).collect();
        out_shape.extend(free_b.iter().map(|&d| shape_b[d]));
        // A fully-contracted product (empty dimsA/dimsB free sets) is a
        // rank-0 scalar (`spec.md` §4.5 item 3 treats the empty-dims case
        // specially only for the *Kronecker* empty-contraction form; a
        // full contraction collapses to a bare scalar here).
        DenseTensor { data: product }.reshape(&out_shape)
    }

    /// Fused `c <- alpha * tensordot(a, b, axes_a, axes_b) + beta * c`,
    /// used by `qt-tensor`'s batched block accumulation (`spec.md` §4.5
    /// item 4, `tensorgdot`).
    pub fn tensorgdot(
        c: &DenseTensor,
        a: &DenseTensor,
        b: &DenseTensor,
        axes_a: &[usize],
        axes_b: &[usize],
        beta: f64,
        alpha: f64,
    ) -> Result<DenseTensor> {
        let contracted = a.tensordot(b, axes_a, axes_b)?;
        c.scale_add(beta, &contracted, alpha)
    }

    /// `alpha * a @ b + beta * c`, matrix-level fused multiply-add. All
    /// three tensors must be rank 2 with compatible shapes.
    pub fn addmm(c: &DenseTensor, a: &DenseTensor, b: &DenseTensor, beta: f64, alpha: f64) -> Result<DenseTensor> {
        if a.rank() != 2 || b.rank() != 2 || c.rank() != 2 {
            return Err(DenseError::ShapeMismatch { context: "addmm requires rank-2 operands".into() });
        }
        let product = matmul(&a.data, &b.data)?;
        c.scale_add(beta, &DenseTensor { data: product }, alpha)
    }

    /// Whether every entry of `self` and `other` matches within
    /// `atol + rtol * |other|`.
    pub fn allclose(&self, other: &DenseTensor, rtol: f64, atol: f64) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(&a, &b)| (a - b).abs() <= atol + rtol * b.abs())
    }

    /// Convert a rank-2 tensor into a `nalgebra::DMatrix<f64>` for direct
    /// use by [`crate::decompose`].
    pub fn to_matrix(&self) -> Result<DMatrix<f64>> {
        if self.rank() != 2 {
            return Err(DenseError::ShapeMismatch { context: "to_matrix requires a rank-2 tensor".into() });
        }
        let shape = self.shape();
        let standard = self.data.as_standard_layout().to_owned();
        let slice = standard.as_slice().expect("standard layout is contiguous");
        Ok(DMatrix::from_row_slice(shape[0], shape[1], slice))
    }

    /// Build a rank-2 `DenseTensor` from a `nalgebra::DMatrix<f64>`.
    pub fn from_matrix(matrix: DMatrix<f64>) -> DenseTensor {
        let (nrows, ncols) = matrix.shape();
        let data: Vec<f64> = matrix.row_iter().flat_map(|r| r.iter().copied().collect::<Vec<_>>()).collect();
        DenseTensor { data: ArrayD::from_shape_vec(IxDyn(&[nrows, ncols]), data).unwrap() }
    }
}

fn check_bound(index: usize, extent: usize) -> Result<()> {
    if index >= extent {
        return Err(DenseError::IndexOutOfRange { index, extent });
    }
    Ok(())
}

fn matmul(a: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let a_shape = a.shape();
    let b_shape = b.shape();
    if a_shape.len() != 2 || b_shape.len() != 2 || a_shape[1] != b_shape[0] {
        return Err(DenseError::ShapeMismatch {
            context: format!("matmul shape mismatch: {:?} x {:?}", a_shape, b_shape),
        });
    }
    let a_mat = DenseTensor { data: a.clone() }.to_matrix()?;
    let b_mat = DenseTensor { data: b.clone() }.to_matrix()?;
    let product = a_mat * b_mat;
    Ok(DenseTensor::from_matrix(product).data)
}

/// Recursively walk the Cartesian product of `ranges` (one candidate list
/// per source axis), copying `src[src_idx]` into `out[out_idx]` at each
/// leaf. `keep[d]` says whether axis `d` survives (an integer selector
/// drops its axis from the output).
fn copy_selection(
    src: &ArrayD<f64>,
    ranges: &[Vec<usize>],
    keep: &[bool],
    out: &mut ArrayD<f64>,
    src_idx: &mut Vec<usize>,
    out_idx: &mut Vec<usize>,
) {
    let axis = src_idx.len();
    if axis == ranges.len() {
        out[IxDyn(out_idx)] = src[IxDyn(src_idx)];
        return;
    }
    for (local, &pos) in ranges[axis].iter().enumerate() {
        src_idx.push(pos);
        if keep[axis] {
            out_idx.push(local);
        }
        copy_selection(src, ranges, keep, out, src_idx, out_idx);
        src_idx.pop();
        if keep[axis] {
            out_idx.pop();
        }
    }
}

/// The write-direction counterpart of [`copy_selection`]: copies
/// `src[src_idx]` (the selection-shaped right-hand side) into
/// `dst[dst_idx]` (the full tensor being written through a view).
fn write_selection(
    dst: &mut ArrayD<f64>,
    ranges: &[Vec<usize>],
    keep: &[bool],
    src: &ArrayD<f64>,
    dst_idx: &mut Vec<usize>,
    src_idx: &mut Vec<usize>,
) {
    let axis = dst_idx.len();
    if axis == ranges.len() {
        dst[IxDyn(dst_idx)] = src[IxDyn(src_idx)];
        return;
    }
    for (local, &pos) in ranges[axis].iter().enumerate() {
        dst_idx.push(pos);
        if keep[axis] {
            src_idx.push(local);
        }
        write_selection(dst, ranges, keep, src, dst_idx, src_idx);
        dst_idx.pop();
        if keep[axis] {
            src_idx.pop();
        }
    }
}
