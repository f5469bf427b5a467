//! Positional sort-key engine.
//!
//! # Responsibility
//! - Compute keys for items inserted between existing siblings.
//! - Restore insertion headroom by renormalizing a sibling sequence.
//!
//! # Invariants
//! - Everything here is pure: no storage access, no shared mutable state.
//! - Allocation never returns a key equal to, or outside of, its neighbors.
//! - Only renormalization produces keys for items other than the inserted ones.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod order;
pub mod plan;
pub mod renorm;
pub mod space;

pub use order::{neighbors_at, sort_siblings, SiblingKey};
pub use plan::{plan_insert, InsertPlan};
pub use renorm::{renormalize, KeyAssignment};
pub use space::KeySpace;

pub type KeyResult<T> = Result<T, KeyError>;

/// Errors from key allocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyError {
    /// No strictly ordered key sequence fits between the neighbors.
    Exhausted,
    /// `prev` is not strictly below `next`; neighbors are inconsistent.
    InvalidRange { prev: f64, next: f64 },
    /// Allocation requested fewer than one key.
    InvalidCount(usize),
    /// A neighbor key is NaN or infinite.
    NonFiniteKey(f64),
}

impl Display for KeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no key space left between neighbors"),
            Self::InvalidRange { prev, next } => {
                write!(f, "previous key {prev} must be below next key {next}")
            }
            Self::InvalidCount(count) => {
                write!(f, "key count must be at least 1, got {count}")
            }
            Self::NonFiniteKey(key) => write!(f, "sort key must be finite, got {key}"),
        }
    }
}

impl Error for KeyError {}
