//! Sibling ordering and neighbor lookup.
//!
//! # Invariants
//! - Order is `(key ASC, id ASC)`; equal keys never make two siblings tie.
//! - Neighbor lookup never reads past either end of the sequence.

use super::{KeyError, KeyResult};
use crate::model::item::ItemId;
use std::cmp::Ordering;

/// One sibling as seen by the engine: identity and current key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiblingKey {
    pub id: ItemId,
    pub key: f64,
}

impl SiblingKey {
    pub fn new(id: ItemId, key: f64) -> Self {
        Self { id, key }
    }

    /// Total order used for display and neighbor resolution.
    pub fn order(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sorts siblings in place by `(key, id)`.
pub fn sort_siblings(siblings: &mut [SiblingKey]) {
    siblings.sort_by(SiblingKey::order);
}

/// Returns the keys around insertion `index` of an ordered sequence.
///
/// `index` is clamped to `siblings.len()`; `0` is the head, `len` the tail.
pub fn neighbors_at(siblings: &[SiblingKey], index: usize) -> (Option<f64>, Option<f64>) {
    let index = index.min(siblings.len());
    let prev = index
        .checked_sub(1)
        .and_then(|i| siblings.get(i))
        .map(|s| s.key);
    let next = siblings.get(index).map(|s| s.key);
    (prev, next)
}

pub(crate) fn ensure_finite(key: f64) -> KeyResult<f64> {
    if key.is_finite() {
        Ok(key)
    } else {
        Err(KeyError::NonFiniteKey(key))
    }
}
