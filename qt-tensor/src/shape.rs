//! `BTensorShape`: per-dimension section partitioning plus a selection rule
//! (`spec.md` §3, §4.3), grounded on `btensor::sections_by_dim` /
//! `sections_sizes` / the `c_vals` vector in
//! `original_source/include/blockTensor/btensor.h`.

use qt_groups::{AnyQuantity, AnyQuantityVector};

use crate::error::{Result, TensorError};

/// A block index: one section index per dimension.
pub type BlockIndex = Vec<usize>;

/// Shape descriptor of a block-sparse tensor: a per-dimension section
/// partitioning (sizes and composite-quantity labels), plus the selection
/// rule every allowed block must satisfy.
#[derive(Clone, Debug)]
pub struct BTensorShape {
    /// Number of sections along each dimension, length `rank()`.
    sections_per_dim: Vec<usize>,
    /// Section extents, packed dimension-major: length `Σ sections_per_dim`.
    section_sizes: Vec<usize>,
    /// Section quantities, packed the same way as `section_sizes`.
    section_qtts: AnyQuantityVector,
    /// The composite quantity every allowed block's section-quantity
    /// product must equal.
    pub selection_rule: AnyQuantity,
}

/// One dimension's `(size, quantity)` pairs, as given to the friendly
/// constructor.
pub type DimSpec = Vec<(usize, AnyQuantity)>;

impl BTensorShape {
    /// Build a shape from a per-dimension list of `(section_size,
    /// section_quantity)` pairs and a selection rule (`spec.md` §4.3,
    /// constructor form (a)).
    pub fn new(dims: Vec<DimSpec>, selection_rule: AnyQuantity) -> Self {
        let mut sections_per_dim = Vec::with_capacity(dims.len());
        let mut section_sizes = Vec::new();
        let mut qtts: Vec<AnyQuantity> = Vec::new();
        for dim in &dims {
            sections_per_dim.push(dim.len());
            for (size, qtt) in dim {
                section_sizes.push(*size);
                qtts.push(*qtt);
            }
        }
        let section_qtts = if qtts.is_empty() {
            AnyQuantityVector::empty(&selection_rule)
        } else {
            AnyQuantityVector::from(qtts)
        };
        BTensorShape { sections_per_dim, section_sizes, section_qtts, selection_rule }
    }

    /// Build a shape from the raw packed arrays directly (`spec.md` §4.3,
    /// constructor form (b), the "trusted path": no validation is
    /// performed beyond the length invariants `flat_map`-style callers
    /// already guarantee).
    pub fn from_packed(
        sections_per_dim: Vec<usize>,
        section_sizes: Vec<usize>,
        section_qtts: AnyQuantityVector,
        selection_rule: AnyQuantity,
    ) -> Result<Self> {
        let total: usize = sections_per_dim.iter().sum();
        if section_sizes.len() != total || section_qtts.len() != total {
            return Err(TensorError::ShapeMismatch {
                context: format!(
                    "packed arrays length {} (sizes) / {} (qtts) do not match Σ sections_per_dim = {total}",
                    section_sizes.len(),
                    section_qtts.len()
                ),
            });
        }
        Ok(BTensorShape { sections_per_dim, section_sizes, section_qtts, selection_rule })
    }

    /// Rank (number of dimensions).
    pub fn dim(&self) -> usize {
        self.sections_per_dim.len()
    }

    /// Number of sections along dimension `d`.
    pub fn section_number(&self, d: usize) -> usize {
        self.sections_per_dim[d]
    }

    fn offset(&self, d: usize) -> usize {
        self.sections_per_dim[..d].iter().sum()
    }

    /// Extent of section `k` of dimension `d`.
    pub fn section_size(&self, d: usize, k: usize) -> usize {
        self.section_sizes[self.offset(d) + k]
    }

    /// Composite quantity labelling section `k` of dimension `d`.
    pub fn section_qtt(&self, d: usize, k: usize) -> AnyQuantity {
        self.section_qtts.get(self.offset(d) + k).expect("packed index in range")
    }

    /// Dimension `d`'s full `(size, quantity)` list, in the form
    /// [`BTensorShape::new`] accepts back for building a related shape
    /// (e.g. a `reshape_as` target that reuses this dimension unchanged).
    pub fn dim_spec(&self, d: usize) -> DimSpec {
        (0..self.section_number(d)).map(|k| (self.section_size(d, k), self.section_qtt(d, k))).collect()
    }

    /// Total extent of dimension `d` (sum of its section sizes).
    pub fn total_extent(&self, d: usize) -> usize {
        let start = self.offset(d);
        let end = start + self.sections_per_dim[d];
        self.section_sizes[start..end].iter().sum()
    }

    /// Whether `block_index` is allowed: the product of its dimensions'
    /// section quantities equals the selection rule.
    pub fn block_allowed(&self, block_index: &[usize]) -> Result<bool> {
        let mut product = self.selection_rule.neutral();
        for (d, &k) in block_index.iter().enumerate() {
            let qtt = self.section_qtt(d, k);
            product = product.compose(&qtt)?;
        }
        Ok(product.equals(&self.selection_rule)?)
    }

    /// Per-dimension section sizes of `block_index`.
    pub fn block_shape(&self, block_index: &[usize]) -> Vec<usize> {
        block_index.iter().enumerate().map(|(d, &k)| self.section_size(d, k)).collect()
    }

    /// Concatenate the two shapes' per-dim data and multiply the selection
    /// rules (`spec.md` §4.3, used to precompute tensordot/Kronecker result
    /// shapes).
    pub fn tensor_product_shape(&self, other: &BTensorShape) -> Result<BTensorShape> {
        let mut sections_per_dim = self.sections_per_dim.clone();
        sections_per_dim.extend(other.sections_per_dim.iter().copied());
        let mut section_sizes = self.section_sizes.clone();
        section_sizes.extend(other.section_sizes.iter().copied());
        let mut qtts: Vec<AnyQuantity> =
            (0..self.section_qtts.len()).map(|i| self.section_qtts.get(i).unwrap()).collect();
        qtts.extend((0..other.section_qtts.len()).map(|i| other.section_qtts.get(i).unwrap()));
        let selection_rule = self.selection_rule.compose(&other.selection_rule)?;
        BTensorShape::from_packed(sections_per_dim, section_sizes, AnyQuantityVector::from(qtts), selection_rule)
    }

    /// Select a subset of dimensions by integer mask (`spec.md` §4.3):
    /// `-1` keeps the dimension, a non-negative `k` collapses it to
    /// section `k` (its quantity folds into the remaining selection rule).
    pub fn shape_from(&self, mask: &[i64]) -> Result<BTensorShape> {
        if mask.len() != self.dim() {
            return Err(TensorError::ShapeMismatch {
                context: format!("shape_from mask length {} does not match rank {}", mask.len(), self.dim()),
            });
        }
        let mut sections_per_dim = Vec::new();
        let mut section_sizes = Vec::new();
        let mut qtts: Vec<AnyQuantity> = Vec::new();
        let mut selection_rule = self.selection_rule.clone();
        for (d, &m) in mask.iter().enumerate() {
            if m < 0 {
                sections_per_dim.push(self.section_number(d));
                for k in 0..self.section_number(d) {
                    section_sizes.push(self.section_size(d, k));
                    qtts.push(self.section_qtt(d, k));
                }
            } else {
                let k = m as usize;
                let folded = self.section_qtt(d, k);
                selection_rule = selection_rule.compose(&folded.inverse())?;
            }
        }
        BTensorShape::from_packed(sections_per_dim, section_sizes, AnyQuantityVector::from(qtts), selection_rule)
    }

    /// Every section's quantity replaced by its inverse, selection rule
    /// replaced by its inverse (`spec.md` §6 "conj", grounded on
    /// `original_source`'s `inverse_cvals`/`inverse_cvals_`: the bra-side
    /// counterpart of a ket-side shape, used to build the conjugate index
    /// a contraction needs on the "other side" of a shared bond).
    pub fn inverse_cvals(&self) -> BTensorShape {
        let qtts: Vec<AnyQuantity> = (0..self.section_qtts.len())
            .map(|i| self.section_qtts.get(i).expect("packed index in range").inverse())
            .collect();
        BTensorShape {
            sections_per_dim: self.sections_per_dim.clone(),
            section_sizes: self.section_sizes.clone(),
            section_qtts: AnyQuantityVector::from(qtts),
            selection_rule: self.selection_rule.inverse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_leg_shape() -> BTensorShape {
        let dim = vec![(2usize, AnyQuantity::z(0)), (3usize, AnyQuantity::z(1))];
        BTensorShape::new(vec![dim.clone(), dim], AnyQuantity::z(0))
    }

    #[test]
    fn block_allowed_matches_selection_rule() {
        let shape = two_leg_shape();
        // z(0) + z(0) == z(0): allowed.
        assert!(shape.block_allowed(&[0, 0]).unwrap());
        // z(0) + z(1) == z(1) != z(0): disallowed.
        assert!(!shape.block_allowed(&[0, 1]).unwrap());
        // z(1) + z(1) == z(2) != z(0): disallowed.
        assert!(!shape.block_allowed(&[1, 1]).unwrap());
    }

    #[test]
    fn block_shape_and_total_extent() {
        let shape = two_leg_shape();
        assert_eq!(shape.block_shape(&[0, 1]), vec![2, 3]);
        assert_eq!(shape.total_extent(0), 5);
        assert_eq!(shape.total_extent(1), 5);
    }

    #[test]
    fn tensor_product_shape_concatenates_and_composes() {
        let a = two_leg_shape();
        let b = two_leg_shape();
        let product = a.tensor_product_shape(&b).unwrap();
        assert_eq!(product.dim(), 4);
        assert!(product.selection_rule.equals(&AnyQuantity::z(0)).unwrap());
    }

    #[test]
    fn shape_from_folds_collapsed_dim_into_selection_rule() {
        let shape = two_leg_shape();
        let reduced = shape.shape_from(&[-1, 1]).unwrap();
        assert_eq!(reduced.dim(), 1);
        // Folding in section 1 of dim 1 (quantity z(1)) composes its
        // inverse into the selection rule: z(0) * z(-1) = z(-1).
        assert!(reduced.selection_rule.equals(&AnyQuantity::z(-1)).unwrap());
    }

    #[test]
    fn inverse_cvals_inverts_every_quantity_and_the_selection_rule() {
        let shape = two_leg_shape();
        let inverted = shape.inverse_cvals();
        assert!(inverted.section_qtt(0, 1).equals(&AnyQuantity::z(-1)).unwrap());
        assert!(inverted.selection_rule.equals(&AnyQuantity::z(0)).unwrap());
        // A block allowed under `shape` stays allowed under its inverse,
        // since negating every factor of an equality preserves it.
        assert!(shape.block_allowed(&[0, 0]).unwrap());
        assert!(inverted.block_allowed(&[0, 0]).unwrap());
    }

    #[test]
    fn rank_zero_shape_does_not_panic() {
        let shape = BTensorShape::new(Vec::new(), AnyQuantity::default());
        assert_eq!(shape.dim(), 0);
        assert!(shape.block_allowed(&[]).unwrap());
    }
}
