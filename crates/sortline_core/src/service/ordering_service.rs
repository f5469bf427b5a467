//! Ordering use-case service.
//!
//! # Responsibility
//! - Run append, bulk append, reorder, move, rename and delete against a store.
//! - Create and delete nested containers that sit among their parent's items.
//! - Resolve drop placements to neighbors and apply key plans atomically.
//!
//! # Invariants
//! - Each mutating call reads siblings, computes keys and writes them inside
//!   one `ItemRepository::with_transaction` call.
//! - Only the inserted/moved items get new keys, unless a renormalization
//!   pass ran for the target container in the same transaction.
//! - A failed move leaves the item in its source container with its old key.
//! - An item never moves into a container it owns, directly or transitively.

use crate::key::{plan_insert, KeyError, KeySpace, SiblingKey};
use crate::model::item::{Container, ContainerId, ContainerKind, Item, ItemId};
use crate::repo::item_repo::{ItemRepository, RepoError, SiblingStore};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|\r|\n").expect("line break pattern must compile"));

/// Drop point of an inserted or moved item among its new siblings.
///
/// Siblings never include the item being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Before the first sibling.
    Head,
    /// After the last sibling.
    Tail,
    /// At a sibling index; clamped to the sibling count.
    At(usize),
    /// Directly after the given sibling.
    After(ItemId),
    /// Directly before the given sibling.
    Before(ItemId),
}

/// Errors from ordering service operations.
#[derive(Debug)]
pub enum OrderingError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Bulk insert was called with no titles.
    EmptyBatch,
    /// Target item does not exist.
    ItemNotFound(ItemId),
    /// Target container does not exist.
    ContainerNotFound(ContainerId),
    /// Placement names a sibling that is not in the target container.
    NeighborNotFound(ItemId),
    /// Target container is the moved item itself or nested inside it.
    CyclicMove { item: ItemId, target: ContainerId },
    /// Key allocation failed even after renormalization.
    Key(KeyError),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for OrderingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "title must not be blank"),
            Self::EmptyBatch => write!(f, "bulk insert needs at least one title"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::ContainerNotFound(id) => write!(f, "container not found: {id}"),
            Self::NeighborNotFound(id) => {
                write!(f, "placement neighbor is not a sibling: {id}")
            }
            Self::CyclicMove { item, target } => {
                write!(f, "cannot move item {item} into its own subtree {target}")
            }
            Self::Key(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrderingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Key(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for OrderingError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ItemNotFound(id) => Self::ItemNotFound(id),
            RepoError::ContainerNotFound(id) => Self::ContainerNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<KeyError> for OrderingError {
    fn from(value: KeyError) -> Self {
        Self::Key(value)
    }
}

/// Ordering service facade.
pub struct OrderingService<R: ItemRepository> {
    repo: R,
    space: KeySpace,
}

impl<R: ItemRepository> OrderingService<R> {
    /// Creates service from repository implementation and allocator.
    pub fn new(repo: R, space: KeySpace) -> Self {
        Self { repo, space }
    }

    pub fn key_space(&self) -> &KeySpace {
        &self.space
    }

    /// Creates one top-level container.
    pub fn create_container(
        &self,
        kind: ContainerKind,
        title: impl Into<String>,
    ) -> Result<Container, OrderingError> {
        let title = normalize_title(title.into())?;
        Ok(self.repo.create_container(kind, title.as_str())?)
    }

    /// Creates a container that is also an item of `parent`, such as a
    /// checklist on a card.
    ///
    /// The owning item and the container share one id and are written in one
    /// transaction.
    pub fn insert_container(
        &self,
        parent: ContainerId,
        kind: ContainerKind,
        title: impl Into<String>,
        placement: Placement,
    ) -> Result<Container, OrderingError> {
        let title = normalize_title(title.into())?;

        let container_uuid =
            self.repo.with_transaction(|store| -> Result<ContainerId, OrderingError> {
                if !store.container_exists(parent)? {
                    return Err(OrderingError::ContainerNotFound(parent));
                }
                let key = self.place_one(store, parent, None, placement)?;
                let item_uuid = Uuid::new_v4();
                store.insert_item(item_uuid, parent, title.as_str(), key)?;
                store.insert_owned_container(item_uuid, kind, title.as_str())?;
                Ok(item_uuid)
            })?;

        info!(
            "event=container_insert module=ordering status=ok container={container_uuid} parent={parent} kind={}",
            kind.as_str()
        );
        self.get_container(container_uuid)
    }

    /// Loads one container.
    pub fn get_container(&self, container_uuid: ContainerId) -> Result<Container, OrderingError> {
        self.repo
            .get_container(container_uuid)?
            .ok_or(OrderingError::ContainerNotFound(container_uuid))
    }

    /// Deletes a container with every item below it.
    ///
    /// A nested container also loses its owning item, so it disappears from
    /// its parent's listing. The parent's other items keep their keys.
    pub fn delete_container(&self, container_uuid: ContainerId) -> Result<(), OrderingError> {
        self.repo.delete_container(container_uuid)?;
        info!("event=container_delete module=ordering status=ok container={container_uuid}");
        Ok(())
    }

    /// Lists items of one container in display order.
    pub fn list_items(&self, container_uuid: ContainerId) -> Result<Vec<Item>, OrderingError> {
        self.ensure_container(container_uuid)?;
        Ok(self.repo.list_items(container_uuid)?)
    }

    /// Loads one item.
    pub fn get_item(&self, item_uuid: ItemId) -> Result<Item, OrderingError> {
        self.repo
            .get_item(item_uuid)?
            .ok_or(OrderingError::ItemNotFound(item_uuid))
    }

    /// Appends one item after the last sibling.
    pub fn append_item(
        &self,
        container_uuid: ContainerId,
        title: impl Into<String>,
    ) -> Result<Item, OrderingError> {
        let title: String = title.into();
        let mut items = self.insert_items(container_uuid, [title], Placement::Tail)?;
        items.pop().ok_or(OrderingError::EmptyBatch)
    }

    /// Appends pasted text as one item, or one item per non-blank line.
    ///
    /// All lines share one allocation, so their keys are mutually consistent.
    pub fn append_text(
        &self,
        container_uuid: ContainerId,
        text: &str,
        split_lines: bool,
    ) -> Result<Vec<Item>, OrderingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OrderingError::InvalidTitle);
        }
        let titles: Vec<String> = if split_lines {
            LINE_BREAK
                .split(text)
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            vec![text.to_string()]
        };
        self.insert_items(container_uuid, titles, Placement::Tail)
    }

    /// Inserts new items, in input order, at one placement.
    pub fn insert_items(
        &self,
        container_uuid: ContainerId,
        titles: impl IntoIterator<Item = String>,
        placement: Placement,
    ) -> Result<Vec<Item>, OrderingError> {
        let titles = titles
            .into_iter()
            .map(normalize_title)
            .collect::<Result<Vec<_>, _>>()?;
        if titles.is_empty() {
            return Err(OrderingError::EmptyBatch);
        }

        let ids = self.repo.with_transaction(|store| -> Result<Vec<ItemId>, OrderingError> {
            if !store.container_exists(container_uuid)? {
                return Err(OrderingError::ContainerNotFound(container_uuid));
            }
            let keys = self.place(store, container_uuid, None, placement, titles.len())?;
            let mut ids = Vec::with_capacity(titles.len());
            for (title, key) in titles.iter().zip(keys) {
                let item_uuid = Uuid::new_v4();
                store.insert_item(item_uuid, container_uuid, title, key)?;
                ids.push(item_uuid);
            }
            Ok(ids)
        })?;

        info!(
            "event=items_insert module=ordering status=ok container={container_uuid} count={}",
            ids.len()
        );
        ids.into_iter().map(|id| self.get_item(id)).collect()
    }

    /// Moves an item to a new position inside its current container.
    pub fn reorder_item(
        &self,
        item_uuid: ItemId,
        placement: Placement,
    ) -> Result<Item, OrderingError> {
        let key = self.repo.with_transaction(|store| -> Result<f64, OrderingError> {
            let location = store
                .item_location(item_uuid)?
                .ok_or(OrderingError::ItemNotFound(item_uuid))?;
            let key = self.place_one(store, location.container_uuid, Some(item_uuid), placement)?;
            store.assign_key(item_uuid, key, None)?;
            Ok(key)
        })?;

        info!("event=item_reorder module=ordering status=ok item={item_uuid} key={key}");
        self.get_item(item_uuid)
    }

    /// Moves an item into another container at `placement`.
    ///
    /// The container reference and key are written in one transaction. When
    /// the item owns a container, that container and its items move with it.
    pub fn move_item(
        &self,
        item_uuid: ItemId,
        target_container: ContainerId,
        placement: Placement,
    ) -> Result<Item, OrderingError> {
        let (source, key) = self.repo.with_transaction(
            |store| -> Result<(ContainerId, f64), OrderingError> {
                let location = store
                    .item_location(item_uuid)?
                    .ok_or(OrderingError::ItemNotFound(item_uuid))?;
                if !store.container_exists(target_container)? {
                    return Err(OrderingError::ContainerNotFound(target_container));
                }
                if store.subtree_contains(item_uuid, target_container)? {
                    return Err(OrderingError::CyclicMove {
                        item: item_uuid,
                        target: target_container,
                    });
                }
                let key = self.place_one(store, target_container, Some(item_uuid), placement)?;
                store.assign_key(item_uuid, key, Some(target_container))?;
                Ok((location.container_uuid, key))
            },
        )?;

        info!(
            "event=item_move module=ordering status=ok item={item_uuid} from={source} to={target_container} key={key}"
        );
        self.get_item(item_uuid)
    }

    /// Replaces the title of one item.
    pub fn rename_item(
        &self,
        item_uuid: ItemId,
        title: impl Into<String>,
    ) -> Result<(), OrderingError> {
        let title = normalize_title(title.into())?;
        Ok(self.repo.rename_item(item_uuid, title.as_str())?)
    }

    /// Deletes one item and any container it owns. Remaining siblings keep
    /// their keys.
    pub fn delete_item(&self, item_uuid: ItemId) -> Result<(), OrderingError> {
        self.repo.delete_item(item_uuid)?;
        info!("event=item_delete module=ordering status=ok item={item_uuid}");
        Ok(())
    }

    fn ensure_container(&self, container_uuid: ContainerId) -> Result<(), OrderingError> {
        self.get_container(container_uuid).map(|_| ())
    }

    fn place_one(
        &self,
        store: &dyn SiblingStore,
        container_uuid: ContainerId,
        exclude: Option<ItemId>,
        placement: Placement,
    ) -> Result<f64, OrderingError> {
        let keys = self.place(store, container_uuid, exclude, placement, 1)?;
        keys.into_iter()
            .next()
            .ok_or(OrderingError::Key(KeyError::Exhausted))
    }

    /// Computes `count` keys at `placement`, writing renormalized sibling keys
    /// first when the insertion point had no room left.
    fn place(
        &self,
        store: &dyn SiblingStore,
        container_uuid: ContainerId,
        exclude: Option<ItemId>,
        placement: Placement,
        count: usize,
    ) -> Result<Vec<f64>, OrderingError> {
        let mut siblings = store.ordered_siblings(container_uuid)?;
        if let Some(exclude) = exclude {
            siblings.retain(|sibling| sibling.id != exclude);
        }
        let index = resolve_index(&siblings, placement)?;
        let plan = plan_insert(&self.space, &siblings, index, count)?;

        if plan.was_renormalized() {
            warn!(
                "event=renormalize module=ordering status=ok container={container_uuid} items={}",
                plan.renormalized.len()
            );
            for assignment in &plan.renormalized {
                store.assign_key(assignment.id, assignment.key, None)?;
            }
        }
        Ok(plan.keys)
    }
}

fn resolve_index(siblings: &[SiblingKey], placement: Placement) -> Result<usize, OrderingError> {
    let position = |id: ItemId| {
        siblings
            .iter()
            .position(|sibling| sibling.id == id)
            .ok_or(OrderingError::NeighborNotFound(id))
    };
    match placement {
        Placement::Head => Ok(0),
        Placement::Tail => Ok(siblings.len()),
        Placement::At(index) => Ok(index.min(siblings.len())),
        Placement::After(id) => position(id).map(|index| index + 1),
        Placement::Before(id) => position(id),
    }
}

fn normalize_title(value: String) -> Result<String, OrderingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OrderingError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
