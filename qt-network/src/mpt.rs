//! `Mpt`: a bare sequence of site tensors, no rank or bond-matching contract
//! attached (`spec.md` §4.7 "MPT is a simple sequence"). `Mps`/`Mpo` wrap
//! their own `Mpt` and layer validation on top, the way `vector_lift<S>`
//! gives every tensor-train container a `std::vector`-like interface
//! without repeating the plumbing per container — done here with `Deref`
//! delegation to a plain `Vec`, the idiomatic Rust analogue of that CRTP
//! base, rather than inheriting from `Vec` or hand-writing the whole
//! iterator/indexing surface three times over.

use std::ops::{Deref, DerefMut};

use qt_tensor::BTensor;

/// An unconstrained chain of tensors.
#[derive(Clone, Debug, Default)]
pub struct Mpt(Vec<BTensor>);

impl Mpt {
    /// An empty chain.
    pub fn new() -> Self {
        Mpt(Vec::new())
    }

    /// An empty chain with room for `capacity` sites.
    pub fn with_capacity(capacity: usize) -> Self {
        Mpt(Vec::with_capacity(capacity))
    }
}

impl Deref for Mpt {
    type Target = Vec<BTensor>;
    fn deref(&self) -> &Vec<BTensor> {
        &self.0
    }
}

impl DerefMut for Mpt {
    fn deref_mut(&mut self) -> &mut Vec<BTensor> {
        &mut self.0
    }
}

impl From<Vec<BTensor>> for Mpt {
    fn from(sites: Vec<BTensor>) -> Self {
        Mpt(sites)
    }
}

impl From<Mpt> for Vec<BTensor> {
    fn from(mpt: Mpt) -> Self {
        mpt.0
    }
}

impl FromIterator<BTensor> for Mpt {
    fn from_iter<T: IntoIterator<Item = BTensor>>(iter: T) -> Self {
        Mpt(iter.into_iter().collect())
    }
}

impl IntoIterator for Mpt {
    type Item = BTensor;
    type IntoIter = std::vec::IntoIter<BTensor>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Mpt {
    type Item = &'a BTensor;
    type IntoIter = std::slice::Iter<'a, BTensor>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qt_dense::DenseTensor;
    use qt_groups::AnyQuantity;
    use qt_tensor::BTensorShape;

    fn trivial_site() -> BTensor {
        let shape = BTensorShape::new(vec![vec![(1, AnyQuantity::z(0))]], AnyQuantity::z(0));
        let mut t = BTensor::new(shape);
        *t.block(&vec![0]).unwrap() = DenseTensor::ones(&[1]);
        t
    }

    #[test]
    fn deref_gives_vector_like_access() {
        let mut chain = Mpt::with_capacity(2);
        chain.push(trivial_site());
        chain.push(trivial_site());
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.first().unwrap().rank(), 1);
    }

    #[test]
    fn roundtrips_through_vec() {
        let chain: Mpt = vec![trivial_site()].into();
        let back: Vec<BTensor> = chain.into();
        assert_eq!(back.len(), 1);
    }
}
