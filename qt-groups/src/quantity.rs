//! Composite conserved quantities: `Quantity<T>` (a fixed tuple of simple
//! Abelian factors) and `AnyQuantity` (a tagged variant over the closed set
//! of tuple shapes this library instantiates; `spec.md` §4.1).

use std::fmt;

use crate::error::{GroupError, Result};
use crate::group::{AbelianGroup, C, Z};

/// A tuple of simple Abelian factors, composed and inverted elementwise.
///
/// Implemented for tuples of arity 0 through 3 via the `group_tuple!` macro
/// below; the arity-0 tuple is the trivial group used as `AnyQuantity`'s
/// default (`spec.md` §3: "A default-constructed `AnyQuantity` holds the
/// trivial one-element group").
pub trait GroupTuple: Copy + Clone + fmt::Debug + PartialEq + Eq + PartialOrd + Ord {
    /// Human/log-facing tag for this tuple shape, used in `TypeMismatch`
    /// diagnostics and as the discriminant compared across `AnyQuantity`
    /// values.
    const TAG: &'static str;

    /// Elementwise neutral element.
    fn neutral() -> Self;
    /// Elementwise in-place composition.
    fn op_assign(&mut self, other: &Self);
    /// Elementwise in-place inverse.
    fn inverse_assign(&mut self);
    /// Sum of per-factor squared distances (`spec.md` §4.1).
    fn squared_distance(&self, other: &Self) -> i64;
    /// Render as `[f0, f1, ...]`.
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

macro_rules! group_tuple_impl {
    ($tag:literal ; $( $idx:tt : $ty:ident ),* ) => {
        impl GroupTuple for ( $( $ty, )* ) {
            const TAG: &'static str = $tag;

            fn neutral() -> Self {
                ( $( $ty::neutral(), )* )
            }

            #[allow(unused_variables)]
            fn op_assign(&mut self, other: &Self) {
                $( self.$idx.op_assign(&other.$idx); )*
            }

            fn inverse_assign(&mut self) {
                $( self.$idx.inverse_assign(); )*
            }

            #[allow(unused_mut, unused_variables)]
            fn squared_distance(&self, other: &Self) -> i64 {
                let mut total: i64 = 0;
                $( total += self.$idx.squared_distance(&other.$idx); )*
                total
            }

            #[allow(unused_variables, unused_mut)]
            fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "[")?;
                let mut first = true;
                $(
                    if !first { write!(f, ", ")?; }
                    first = false;
                    write!(f, "{}", self.$idx)?;
                )*
                write!(f, "]")
            }
        }
    };
}

group_tuple_impl!("trivial" ; );
group_tuple_impl!("Z" ; 0: Z);
group_tuple_impl!("ZxZ" ; 0: Z, 1: Z);
group_tuple_impl!("ZxZxC2" ; 0: Z, 1: Z, 2: C2Alias);
group_tuple_impl!("ZxZxC4" ; 0: Z, 1: Z, 2: C4Alias);
group_tuple_impl!("ZxZxC6" ; 0: Z, 1: Z, 2: C6Alias);
group_tuple_impl!("C2" ; 0: C2Alias);
group_tuple_impl!("C2xC2" ; 0: C2Alias, 1: C2Alias2);
group_tuple_impl!("C2xC4" ; 0: C2Alias, 1: C4Alias);
group_tuple_impl!("C2xC6" ; 0: C2Alias, 1: C6Alias);
group_tuple_impl!("C4" ; 0: C4Alias);
group_tuple_impl!("C6" ; 0: C6Alias);

// `C<N>` cannot be named directly inside the macro invocation's type
// position once aliased per-arity without clashing const generics, so we
// give each distinct modulus its own alias name for macro hygiene.
type C2Alias = C<2>;
type C2Alias2 = C<2>;
type C4Alias = C<4>;
type C6Alias = C<6>;

/// A value-semantic composite conserved quantity over a fixed tuple of
/// simple Abelian factors chosen at compile time. `AnyQuantity` erases `T`
/// behind a tagged variant so the concrete tuple shape can be chosen at
/// runtime (`spec.md` §4.1).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity<T: GroupTuple>(pub T);

impl<T: GroupTuple> Quantity<T> {
    /// Wrap a tuple value.
    pub fn new(value: T) -> Self {
        Quantity(value)
    }

    /// The neutral element for this tuple shape.
    pub fn neutral() -> Self {
        Quantity(T::neutral())
    }

    /// In-place composition.
    pub fn compose_in_place(&mut self, other: &Self) {
        self.0.op_assign(&other.0);
    }

    /// In-place inverse.
    pub fn inverse_in_place(&mut self) {
        self.0.inverse_assign();
    }

    /// Out-of-place inverse.
    pub fn inverse(mut self) -> Self {
        self.inverse_in_place();
        self
    }

    /// Sum of per-factor squared distances.
    pub fn squared_distance(&self, other: &Self) -> i64 {
        self.0.squared_distance(&other.0)
    }
}

impl<T: GroupTuple> fmt::Debug for Quantity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.render(f)
    }
}

impl<T: GroupTuple> fmt::Display for Quantity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.render(f)
    }
}

/// Generates the `AnyQuantity` tagged-variant enum and its dispatch methods
/// over the closed, enumerated set of concrete tuple shapes from
/// `spec.md` §4.1: Z; Z×Z; Z×Z×C2; Z×Z×C4; Z×Z×C6; C2; C2×C2; C2×C4;
/// C2×C6; C4; C6; trivial. No reference-proxy classes are needed (design
/// notes §9): every cross-variant operation is a single match dispatch
/// site that returns `TypeMismatch` on tag disagreement.
macro_rules! any_quantity {
    ( $( $variant:ident ( $ty:ty ) ),+ $(,)? ) => {
        /// Composite conserved quantity with a runtime-determined factor
        /// tuple, dispatched through a closed tagged variant
        /// (`spec.md` §4.1).
        #[derive(Copy, Clone, PartialEq, Eq)]
        pub enum AnyQuantity {
            $( $variant(Quantity<$ty>), )+
        }

        impl AnyQuantity {
            /// Tag identifying the concrete factor tuple, used in
            /// `TypeMismatch` diagnostics.
            pub fn tag(&self) -> &'static str {
                match self {
                    $( AnyQuantity::$variant(_) => <$ty as GroupTuple>::TAG, )+
                }
            }

            /// The neutral element with the same factor tuple as `self`.
            pub fn neutral(&self) -> AnyQuantity {
                match self {
                    $( AnyQuantity::$variant(_) => AnyQuantity::$variant(Quantity::neutral()), )+
                }
            }

            /// In-place composition; fails if `other`'s tuple differs from
            /// `self`'s.
            pub fn compose_in_place(&mut self, other: &AnyQuantity) -> Result<()> {
                match (self, other) {
                    $(
                        (AnyQuantity::$variant(a), AnyQuantity::$variant(b)) => {
                            a.compose_in_place(b);
                            Ok(())
                        }
                    )+
                    (lhs, rhs) => Err(GroupError::TypeMismatch { lhs: lhs.tag(), rhs: rhs.tag() }),
                }
            }

            /// Out-of-place composition.
            pub fn compose(&self, other: &AnyQuantity) -> Result<AnyQuantity> {
                let mut out = self.clone();
                out.compose_in_place(other)?;
                Ok(out)
            }

            /// In-place inverse.
            pub fn inverse_in_place(&mut self) {
                match self {
                    $( AnyQuantity::$variant(a) => a.inverse_in_place(), )+
                }
            }

            /// Out-of-place inverse.
            pub fn inverse(&self) -> AnyQuantity {
                let mut out = self.clone();
                out.inverse_in_place();
                out
            }

            /// Equality; fails with `TypeMismatch` across incompatible
            /// tags rather than silently returning `false`
            /// (`spec.md` §9 Open Question, frozen as throw).
            pub fn equals(&self, other: &AnyQuantity) -> Result<bool> {
                match (self, other) {
                    $(
                        (AnyQuantity::$variant(a), AnyQuantity::$variant(b)) => Ok(a == b),
                    )+
                    (lhs, rhs) => Err(GroupError::TypeMismatch { lhs: lhs.tag(), rhs: rhs.tag() }),
                }
            }

            /// Negation of `equals`.
            pub fn not_equals(&self, other: &AnyQuantity) -> Result<bool> {
                self.equals(other).map(|eq| !eq)
            }

            /// Lexicographic order over the factor tuple.
            pub fn less(&self, other: &AnyQuantity) -> Result<bool> {
                match (self, other) {
                    $(
                        (AnyQuantity::$variant(a), AnyQuantity::$variant(b)) => Ok(a < b),
                    )+
                    (lhs, rhs) => Err(GroupError::TypeMismatch { lhs: lhs.tag(), rhs: rhs.tag() }),
                }
            }

            /// Sum over factors of squared `Z` differences and squared
            /// modular `C_N` distances (`spec.md` §4.1).
            pub fn squared_distance(&self, other: &AnyQuantity) -> Result<i64> {
                match (self, other) {
                    $(
                        (AnyQuantity::$variant(a), AnyQuantity::$variant(b)) => Ok(a.squared_distance(b)),
                    )+
                    (lhs, rhs) => Err(GroupError::TypeMismatch { lhs: lhs.tag(), rhs: rhs.tag() }),
                }
            }
        }

        impl fmt::Debug for AnyQuantity {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( AnyQuantity::$variant(a) => fmt::Debug::fmt(a, f), )+
                }
            }
        }

        impl fmt::Display for AnyQuantity {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( AnyQuantity::$variant(a) => fmt::Display::fmt(a, f), )+
                }
            }
        }
    };
}

any_quantity! {
    Trivial(()),
    ZOnly((Z,)),
    ZZ((Z, Z)),
    ZZC2((Z, Z, C2Alias)),
    ZZC4((Z, Z, C4Alias)),
    ZZC6((Z, Z, C6Alias)),
    C2Only((C2Alias,)),
    C2C2((C2Alias, C2Alias2)),
    C2C4((C2Alias, C4Alias)),
    C2C6((C2Alias, C6Alias)),
    C4Only((C4Alias,)),
    C6Only((C6Alias,)),
}

impl Default for AnyQuantity {
    /// A default-constructed `AnyQuantity` holds the trivial one-element
    /// group (`spec.md` §3).
    fn default() -> Self {
        AnyQuantity::Trivial(Quantity::neutral())
    }
}

impl AnyQuantity {
    /// Build an `AnyQuantity` wrapping a single `Z` factor.
    pub fn z(value: i16) -> Self {
        AnyQuantity::ZOnly(Quantity::new((Z::new(value),)))
    }

    /// Build an `AnyQuantity` wrapping a single `Z x Z` pair.
    pub fn zz(a: i16, b: i16) -> Self {
        AnyQuantity::ZZ(Quantity::new((Z::new(a), Z::new(b))))
    }

    /// Build an `AnyQuantity` wrapping a single `C<2>` factor.
    pub fn c2(value: u16) -> Self {
        AnyQuantity::C2Only(Quantity::new((C::new(value),)))
    }

    /// Build an `AnyQuantity` wrapping a single `C<4>` factor.
    pub fn c4(value: u16) -> Self {
        AnyQuantity::C4Only(Quantity::new((C::new(value),)))
    }

    /// Build an `AnyQuantity` wrapping a single `C<6>` factor.
    pub fn c6(value: u16) -> Self {
        AnyQuantity::C6Only(Quantity::new((C::new(value),)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_is_default() {
        let t = AnyQuantity::default();
        assert_eq!(t.tag(), "trivial");
        assert!(t.equals(&t.neutral()).unwrap());
    }

    #[test]
    fn type_mismatch_on_cross_tag_compose() {
        let a = AnyQuantity::z(3);
        let b = AnyQuantity::c2(1);
        assert!(matches!(
            a.compose(&b),
            Err(GroupError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn type_mismatch_on_cross_tag_equals() {
        let a = AnyQuantity::z(3);
        let b = AnyQuantity::c2(1);
        assert!(matches!(a.equals(&b), Err(GroupError::TypeMismatch { .. })));
        assert!(matches!(a.not_equals(&b), Err(GroupError::TypeMismatch { .. })));
    }

    #[test]
    fn group_laws_hold_for_composite_quantity() {
        let a = AnyQuantity::zz(3, -2);
        let b = AnyQuantity::zz(-7, 1);
        let c = AnyQuantity::zz(2, 2);
        assert!(a
            .compose(&b.compose(&c).unwrap())
            .unwrap()
            .equals(&a.compose(&b).unwrap().compose(&c).unwrap())
            .unwrap());
        assert!(a.compose(&a.neutral()).unwrap().equals(&a).unwrap());
        assert!(a
            .compose(&a.inverse())
            .unwrap()
            .equals(&a.neutral())
            .unwrap());
        assert!(a.compose(&b).unwrap().equals(&b.compose(&a).unwrap()).unwrap());
    }

    #[test]
    fn squared_distance_matches_spec_scenario_2() {
        let a = AnyQuantity::z(3);
        let b = AnyQuantity::z(-1);
        assert_eq!(a.squared_distance(&b).unwrap(), 16);
    }

    #[test]
    fn display_renders_grp_notation() {
        let a = AnyQuantity::zz(3, -2);
        assert_eq!(format!("{}", a), "[grp::Z(3), grp::Z(-2)]");
        let c = AnyQuantity::c4(5);
        assert_eq!(format!("{}", c), "[grp::C<4>(1)]");
    }

    proptest::proptest! {
        #[test]
        fn z_group_laws_proptest(x in -20i16..20, y in -20i16..20, z in -20i16..20) {
            let a = AnyQuantity::z(x);
            let b = AnyQuantity::z(y);
            let c = AnyQuantity::z(z);
            let lhs = a.compose(&b.compose(&c).unwrap()).unwrap();
            let rhs = a.compose(&b).unwrap().compose(&c).unwrap();
            proptest::prop_assert!(lhs.equals(&rhs).unwrap());
            proptest::prop_assert!(a.compose(&a.inverse()).unwrap().equals(&a.neutral()).unwrap());
        }
    }
}
