//! `AnyQuantityVector`: a contiguous homogeneous sequence of composite
//! quantities sharing one concrete factor tuple (`spec.md` §3, §4.2).

use std::fmt;

use crate::error::{GroupError, Result};
use crate::group::C;
use crate::group::Z;
use crate::quantity::{AnyQuantity, GroupTuple, Quantity};

type C2Alias = C<2>;
type C4Alias = C<4>;
type C6Alias = C<6>;

/// An ordered, homogeneous container of `AnyQuantity` values. All entries
/// share one concrete factor tuple; insertion type-checks against it and
/// fails with `TypeMismatch` otherwise (`spec.md` §4.2).
///
/// Backed by one concrete `Vec<Quantity<T>>` per tag rather than a
/// polymorphic iterator over heterogeneous storage (design notes §9):
/// random access is plain `Vec` indexing, no virtual dispatch.
macro_rules! any_quantity_vector {
    ( $( $variant:ident ( $ty:ty ) => $ctor:ident ),+ $(,)? ) => {
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub enum AnyQuantityVector {
            $( $variant(Vec<Quantity<$ty>>), )+
        }

        impl AnyQuantityVector {
            /// Tag of the factor tuple shared by every element.
            pub fn tag(&self) -> &'static str {
                match self {
                    $( AnyQuantityVector::$variant(_) => <$ty as GroupTuple>::TAG, )+
                }
            }

            /// Number of elements.
            pub fn len(&self) -> usize {
                match self {
                    $( AnyQuantityVector::$variant(v) => v.len(), )+
                }
            }

            /// Whether the vector holds no elements.
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Random-access element retrieval.
            pub fn get(&self, index: usize) -> Option<AnyQuantity> {
                match self {
                    $( AnyQuantityVector::$variant(v) => v.get(index).map(|q| AnyQuantity::$variant(*q)), )+
                }
            }

            /// In-place element mutation; fails with `TypeMismatch` if
            /// `value`'s tag differs from this vector's.
            pub fn set(&mut self, index: usize, value: AnyQuantity) -> Result<()> {
                match (self, value) {
                    $(
                        (AnyQuantityVector::$variant(v), AnyQuantity::$variant(q)) => {
                            v[index] = q;
                            Ok(())
                        }
                    )+
                    (vec, value) => Err(GroupError::TypeMismatch { lhs: vec.tag(), rhs: value.tag() }),
                }
            }

            /// Append an element; fails with `TypeMismatch` if `value`'s
            /// tag differs from this vector's.
            pub fn push_back(&mut self, value: AnyQuantity) -> Result<()> {
                match (self, value) {
                    $(
                        (AnyQuantityVector::$variant(v), AnyQuantity::$variant(q)) => {
                            v.push(q);
                            Ok(())
                        }
                    )+
                    (vec, value) => Err(GroupError::TypeMismatch { lhs: vec.tag(), rhs: value.tag() }),
                }
            }

            /// Insert an element at `index`; fails with `TypeMismatch` if
            /// `value`'s tag differs from this vector's.
            pub fn insert(&mut self, index: usize, value: AnyQuantity) -> Result<()> {
                match (self, value) {
                    $(
                        (AnyQuantityVector::$variant(v), AnyQuantity::$variant(q)) => {
                            v.insert(index, q);
                            Ok(())
                        }
                    )+
                    (vec, value) => Err(GroupError::TypeMismatch { lhs: vec.tag(), rhs: value.tag() }),
                }
            }

            /// Swap two elements by index.
            pub fn swap(&mut self, a: usize, b: usize) {
                match self {
                    $( AnyQuantityVector::$variant(v) => v.swap(a, b), )+
                }
            }

            /// Reverse the vector in place.
            pub fn reverse(&mut self) {
                match self {
                    $( AnyQuantityVector::$variant(v) => v.reverse(), )+
                }
            }

            /// Iterate elements in forward order.
            pub fn iter(&self) -> impl Iterator<Item = AnyQuantity> + '_ {
                (0..self.len()).map(move |i| self.get(i).unwrap())
            }

            /// Iterate elements in reverse order.
            pub fn iter_rev(&self) -> impl Iterator<Item = AnyQuantity> + '_ {
                (0..self.len()).rev().map(move |i| self.get(i).unwrap())
            }

            /// A new vector holding `self[start..end]`.
            pub fn slice(&self, start: usize, end: usize) -> AnyQuantityVector {
                match self {
                    $( AnyQuantityVector::$variant(v) => AnyQuantityVector::$variant(v[start..end].to_vec()), )+
                }
            }

            /// Produce a new vector whose element `i` is taken from
            /// `self[perm[j]]`, each repeated `reps[j]` times if `reps` is
            /// supplied (`spec.md` §4.2, used by tensor reshape/permute).
            pub fn permute(&self, perm: &[usize], reps: Option<&[usize]>) -> AnyQuantityVector {
                match self {
                    $(
                        AnyQuantityVector::$variant(v) => {
                            let mut out = Vec::with_capacity(perm.len());
                            for (j, &p) in perm.iter().enumerate() {
                                let count = reps.map_or(1, |r| r[j]);
                                for _ in 0..count {
                                    out.push(v[p]);
                                }
                            }
                            AnyQuantityVector::$variant(out)
                        }
                    )+
                }
            }

            /// An empty vector with the same tag as `self`.
            pub fn empty_like(&self) -> AnyQuantityVector {
                match self {
                    $( AnyQuantityVector::$variant(_) => AnyQuantityVector::$variant(Vec::new()), )+
                }
            }

            /// Build a vector of `len` copies of `value`.
            pub fn filled(value: AnyQuantity, len: usize) -> AnyQuantityVector {
                match value {
                    $( AnyQuantity::$variant(q) => AnyQuantityVector::$variant(vec![q; len]), )+
                }
            }

            /// An empty vector whose tag matches `sample`.
            pub fn empty(sample: &AnyQuantity) -> AnyQuantityVector {
                Self::filled(*sample, 0)
            }

            /// Concatenate two vectors sharing the same tag.
            pub fn concat(&self, other: &AnyQuantityVector) -> Result<AnyQuantityVector> {
                match (self, other) {
                    $(
                        (AnyQuantityVector::$variant(a), AnyQuantityVector::$variant(b)) => {
                            let mut out = a.clone();
                            out.extend_from_slice(b);
                            Ok(AnyQuantityVector::$variant(out))
                        }
                    )+
                    (a, b) => Err(GroupError::TypeMismatch { lhs: a.tag(), rhs: b.tag() }),
                }
            }
        }

        impl From<Vec<AnyQuantity>> for AnyQuantityVector {
            /// Build a vector from a non-empty slice of same-tagged
            /// quantities. Panics if the input is empty (there is no tag
            /// to infer) or mixes tags; callers with runtime-uncertain
            /// input should use `push_back` incrementally instead.
            fn from(values: Vec<AnyQuantity>) -> Self {
                let mut iter = values.into_iter();
                let first = iter.next().expect("cannot build AnyQuantityVector from an empty Vec: no tag to infer");
                let mut out = AnyQuantityVector::empty(&first);
                out.push_back(first).unwrap();
                for v in iter {
                    out.push_back(v).expect("mismatched tags building AnyQuantityVector from Vec");
                }
                out
            }
        }

        impl fmt::Display for AnyQuantityVector {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "[")?;
                for (i, q) in self.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", q)?;
                }
                write!(f, "]")
            }
        }
    };
}

any_quantity_vector! {
    Trivial(()) => trivial,
    ZOnly((Z,)) => z,
    ZZ((Z, Z)) => zz,
    ZZC2((Z, Z, C2Alias)) => zzc2,
    ZZC4((Z, Z, C4Alias)) => zzc4,
    ZZC6((Z, Z, C6Alias)) => zzc6,
    C2Only((C2Alias,)) => c2,
    C2C2((C2Alias, C2Alias)) => c2c2,
    C2C4((C2Alias, C4Alias)) => c2c4,
    C2C6((C2Alias, C6Alias)) => c2c6,
    C4Only((C4Alias,)) => c4,
    C6Only((C6Alias,)) => c6,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_back_type_checks() {
        let mut v = AnyQuantityVector::empty(&AnyQuantity::z(0));
        assert!(v.push_back(AnyQuantity::z(1)).is_ok());
        assert!(matches!(
            v.push_back(AnyQuantity::c2(1)),
            Err(GroupError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn permute_with_repetition() {
        let mut v = AnyQuantityVector::empty(&AnyQuantity::z(0));
        v.push_back(AnyQuantity::z(1)).unwrap();
        v.push_back(AnyQuantity::z(2)).unwrap();
        v.push_back(AnyQuantity::z(3)).unwrap();
        let permuted = v.permute(&[2, 0], Some(&[1, 2, 1]));
        let collected: Vec<_> = permuted.iter().map(|q| format!("{}", q)).collect();
        assert_eq!(collected, vec!["[grp::Z(3)]", "[grp::Z(1)]", "[grp::Z(1)]"]);
    }

    #[test]
    fn random_access_and_swap() {
        let mut v = AnyQuantityVector::empty(&AnyQuantity::z(5));
        v.push_back(AnyQuantity::z(10)).unwrap();
        v.push_back(AnyQuantity::z(20)).unwrap();
        v.swap(0, 1);
        assert!(v.get(0).unwrap().equals(&AnyQuantity::z(20)).unwrap());
        assert!(v.get(1).unwrap().equals(&AnyQuantity::z(10)).unwrap());
    }

    #[test]
    fn slice_and_reverse() {
        let values: Vec<_> = (0..5).map(AnyQuantity::z).collect();
        let v = AnyQuantityVector::from(values);
        let mut tail = v.slice(2, 5);
        tail.reverse();
        let collected: Vec<_> = tail.iter().map(|q| format!("{}", q)).collect();
        assert_eq!(collected, vec!["[grp::Z(4)]", "[grp::Z(3)]", "[grp::Z(2)]"]);
    }
}
