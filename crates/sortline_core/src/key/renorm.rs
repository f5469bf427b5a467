//! Renormalization of a sibling sequence.
//!
//! # Invariants
//! - Output follows input order exactly, one assignment per input sibling.
//! - Adjacent output keys differ by exactly `renorm_gap` until precision runs out.

use super::order::SiblingKey;
use super::KeySpace;
use crate::model::item::ItemId;

/// New key for one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyAssignment {
    pub id: ItemId,
    pub key: f64,
}

/// Reassigns evenly spaced keys to `siblings`, preserving their order.
///
/// Item `i` receives `renorm_gap * (i + 1)`. The caller passes siblings in
/// their current display order; old key values are ignored.
pub fn renormalize(space: &KeySpace, siblings: &[SiblingKey]) -> Vec<KeyAssignment> {
    let gap = space.config().renorm_gap;
    siblings
        .iter()
        .enumerate()
        .map(|(index, sibling)| KeyAssignment {
            id: sibling.id,
            key: gap + gap * index as f64,
        })
        .collect()
}
