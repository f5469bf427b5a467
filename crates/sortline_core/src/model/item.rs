//! Ordered item and container domain model.
//!
//! # Responsibility
//! - Define the records the ordering service reads and writes.
//! - Keep container kinds explicit while leaving ordering kind-agnostic.
//!
//! # Invariants
//! - `ItemId`/`ContainerId` are stable and never reused.
//! - An item belongs to exactly one container at a time.
//! - A nested container (a checklist inside a card) shares its owning item's
//!   id, so moving or deleting that item carries the container along.
//! - Display order inside a container is `(sort_key ASC, uuid ASC)`.
//!
//! # See also
//! - crate::key for how `sort_key` values are computed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for an orderable item.
pub type ItemId = Uuid;

/// Stable identifier for a container (the item's owning parent).
pub type ContainerId = Uuid;

/// What a container groups on the board.
///
/// Ordering rules are identical for every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// Orders swimlanes and lists.
    Board,
    /// Orders cards across lists.
    Swimlane,
    /// Orders cards.
    List,
    /// Orders checklists.
    Card,
    /// Orders checklist items.
    Checklist,
}

impl ContainerKind {
    /// Storage token for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Board => "board",
            Self::Swimlane => "swimlane",
            Self::List => "list",
            Self::Card => "card",
            Self::Checklist => "checklist",
        }
    }

    /// Parses a storage token.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "board" => Some(Self::Board),
            "swimlane" => Some(Self::Swimlane),
            "list" => Some(Self::List),
            "card" => Some(Self::Card),
            "checklist" => Some(Self::Checklist),
            _ => None,
        }
    }
}

/// Container read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Equals `owner_item_uuid` for nested containers.
    pub uuid: ContainerId,
    pub kind: ContainerKind,
    pub title: String,
    /// Item that places this container among its parent's items; `None` for
    /// top-level containers such as boards.
    pub owner_item_uuid: Option<ItemId>,
}

impl Container {
    pub fn is_nested(&self) -> bool {
        self.owner_item_uuid.is_some()
    }
}

/// Orderable item read model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable item id, also the order tiebreak.
    pub uuid: ItemId,
    /// Container the item currently belongs to.
    pub container_uuid: ContainerId,
    /// User-facing title.
    pub title: String,
    /// Position among siblings. Only meaningful relative to sibling keys.
    pub sort_key: f64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}
