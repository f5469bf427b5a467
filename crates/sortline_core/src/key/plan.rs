//! Insertion planning: allocate, and on exhaustion renormalize then retry.
//!
//! # Responsibility
//! - Turn "insert `count` items at `index` of these siblings" into key writes.
//! - Keep the exhaustion recovery loop out of storage-facing code.
//!
//! # Invariants
//! - `renormalized` is empty unless allocation at the original neighbors failed.
//! - When non-empty, `renormalized` covers every sibling and `keys` are valid
//!   against the renormalized neighbors, not the old ones.

use super::order::{neighbors_at, SiblingKey};
use super::renorm::{renormalize, KeyAssignment};
use super::{KeyError, KeyResult, KeySpace};

/// Keys to write for one insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    /// Keys for the inserted items, in insertion order.
    pub keys: Vec<f64>,
    /// Replacement keys for existing siblings; empty when no pass was needed.
    pub renormalized: Vec<KeyAssignment>,
}

impl InsertPlan {
    pub fn was_renormalized(&self) -> bool {
        !self.renormalized.is_empty()
    }
}

/// Plans keys for `count` items inserted at `index` of ordered `siblings`.
///
/// `siblings` must be in `(key, id)` order and must not contain the items
/// being inserted. `index` is clamped to `siblings.len()`.
///
/// # Errors
/// - [`KeyError::Exhausted`] only if allocation still fails after renormalizing.
/// - Any other [`KeyError`] from the first allocation attempt, unchanged.
pub fn plan_insert(
    space: &KeySpace,
    siblings: &[SiblingKey],
    index: usize,
    count: usize,
) -> KeyResult<InsertPlan> {
    let (prev, next) = neighbors_at(siblings, index);
    match allocate_between(space, prev, next, count) {
        Ok(keys) => {
            return Ok(InsertPlan {
                keys,
                renormalized: Vec::new(),
            })
        }
        Err(KeyError::Exhausted) => {}
        Err(err) => return Err(err),
    }

    let renormalized = renormalize(space, siblings);
    ensure_ascending(&renormalized)?;
    let index = index.min(renormalized.len());
    let prev = index
        .checked_sub(1)
        .and_then(|i| renormalized.get(i))
        .map(|a| a.key);
    let next = renormalized.get(index).map(|a| a.key);
    let keys = space.allocate(prev, next, count)?;

    Ok(InsertPlan { keys, renormalized })
}

// Renormalized keys must be usable as neighbors before the retry.
fn ensure_ascending(assignments: &[KeyAssignment]) -> KeyResult<()> {
    let mut prev: Option<f64> = None;
    for assignment in assignments {
        let key = assignment.key;
        if !key.is_finite() || prev.is_some_and(|prev| prev >= key) {
            return Err(KeyError::Exhausted);
        }
        prev = Some(key);
    }
    Ok(())
}

// Tied neighbors are legal siblings but leave no room between them.
fn allocate_between(
    space: &KeySpace,
    prev: Option<f64>,
    next: Option<f64>,
    count: usize,
) -> KeyResult<Vec<f64>> {
    if let (Some(prev), Some(next)) = (prev, next) {
        if prev == next {
            return Err(KeyError::Exhausted);
        }
    }
    space.allocate(prev, next, count)
}
