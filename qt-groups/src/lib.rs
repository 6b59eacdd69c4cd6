//! Composite Abelian conserved-quantity value types.
//!
//! This crate is the leaf of the QuantiT workspace (`qt-groups`): it has no
//! dependency on tensors or dense linear algebra. It provides:
//!
//! - [`group::Z`] and [`group::C`], the two canonical simple Abelian group
//!   factors (integers under addition, and a cyclic group of fixed order);
//! - [`quantity::Quantity`], a generic fixed tuple of simple factors, and
//!   [`quantity::AnyQuantity`], a runtime-polymorphic composite quantity
//!   dispatched through a closed tagged variant;
//! - [`vector::AnyQuantityVector`], a contiguous homogeneous sequence of
//!   composite quantities sharing one concrete factor tuple.
//!
//! Every cross-type operation (composing, comparing, or inserting elements
//! of different factor tuples) fails with [`error::GroupError::TypeMismatch`]
//! rather than panicking.

pub mod error;
pub mod group;
pub mod quantity;
pub mod vector;

pub use error::{GroupError, Result};
pub use group::{AbelianGroup, C, C2, C4, C6, Z};
pub use quantity::{AnyQuantity, GroupTuple, Quantity};
pub use vector::AnyQuantityVector;

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::error::{GroupError, Result};
    pub use crate::group::{AbelianGroup, C, C2, C4, C6, Z};
    pub use crate::quantity::{AnyQuantity, Quantity};
    pub use crate::vector::AnyQuantityVector;
}
