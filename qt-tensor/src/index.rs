//! Section-granular view selectors for [`crate::tensor::BTensor::index`] /
//! `index_put` (`spec.md` §4.5 "Indexing / views").
//!
//! A block-sparse tensor's addressable units are sections, not individual
//! elements: slicing across a section boundary would split a block and
//! orphan its quantity label. `BlockSelector` therefore selects whole
//! sections, analogous to NumPy semantics (`Section` ~ integer index,
//! `SectionRange` ~ slice, `Full` ~ `:`) but at block granularity.

/// A single-dimension selector for a block-sparse view.
#[derive(Clone, Debug)]
pub enum BlockSelector {
    /// Narrow to one section. A section generally has extent greater than
    /// one, so unlike a NumPy scalar index this never drops the dimension;
    /// it behaves exactly like `SectionRange { start: k, end: k + 1 }`.
    Section(usize),
    /// Keep a contiguous range of sections `[start, end)`.
    SectionRange {
        /// Inclusive lower section index.
        start: usize,
        /// Exclusive upper section index.
        end: usize,
    },
    /// Keep the dimension untouched.
    Full,
}

impl BlockSelector {
    /// Shorthand for a unit-step section range.
    pub fn range(start: usize, end: usize) -> Self {
        BlockSelector::SectionRange { start, end }
    }
}
