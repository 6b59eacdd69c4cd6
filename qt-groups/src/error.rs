//! Error types for composite conserved-quantity operations.

use thiserror::Error;

/// Result type for `qt-groups` operations.
pub type Result<T> = std::result::Result<T, GroupError>;

/// Errors that can occur while manipulating composite conserved quantities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// Two composite quantities (or a quantity and a vector) were used
    /// together but their underlying factor tuples differ.
    #[error("type mismatch: {lhs} is not type-compatible with {rhs}")]
    TypeMismatch {
        /// Tag of the left-hand operand.
        lhs: &'static str,
        /// Tag of the right-hand operand.
        rhs: &'static str,
    },
}
