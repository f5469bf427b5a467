//! Item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the read accessor (ordered siblings) and write accessor
//!   (assign key, optionally new container) the ordering engine consumes.
//! - Own the transaction boundary every reorder/move/renormalize runs inside.
//!
//! # Invariants
//! - Sibling listing is deterministic: `sort_key ASC, item_uuid ASC`.
//! - Ordering transactions start with `BEGIN IMMEDIATE`, so sibling reads and
//!   key writes of one operation never interleave with another writer.
//! - A closure error rolls the whole transaction back.
//! - Deleting an item removes the container it owns and, transitively, that
//!   container's items (`ON DELETE CASCADE` in both directions).

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::key::SiblingKey;
use crate::model::item::{Container, ContainerId, ContainerKind, Item, ItemId};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    item_uuid,
    container_uuid,
    title,
    sort_key,
    created_at,
    updated_at
FROM items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from item repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target item does not exist.
    ItemNotFound(ItemId),
    /// Target container does not exist.
    ContainerNotFound(ContainerId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::ContainerNotFound(id) => write!(f, "container not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "item repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid item data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Where an item currently sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemLocation {
    pub container_uuid: ContainerId,
    pub sort_key: f64,
}

/// Accessors available inside one ordering transaction.
pub trait SiblingStore {
    /// Lists `(id, key)` of every item in `container`, in display order.
    fn ordered_siblings(&self, container_uuid: ContainerId) -> RepoResult<Vec<SiblingKey>>;
    /// Loads the container and key of one item.
    fn item_location(&self, item_uuid: ItemId) -> RepoResult<Option<ItemLocation>>;
    /// Returns whether `container_uuid` exists.
    fn container_exists(&self, container_uuid: ContainerId) -> RepoResult<bool>;
    /// Returns whether `candidate` is `root` or nested anywhere below it.
    fn subtree_contains(&self, root: ItemId, candidate: ContainerId) -> RepoResult<bool>;
    /// Inserts one item with a precomputed key.
    fn insert_item(
        &self,
        item_uuid: ItemId,
        container_uuid: ContainerId,
        title: &str,
        sort_key: f64,
    ) -> RepoResult<()>;
    /// Turns an existing item into a container with the same id.
    fn insert_owned_container(
        &self,
        item_uuid: ItemId,
        kind: ContainerKind,
        title: &str,
    ) -> RepoResult<()>;
    /// Writes a new key and, when given, a new container for one item.
    fn assign_key(
        &self,
        item_uuid: ItemId,
        sort_key: f64,
        container_uuid: Option<ContainerId>,
    ) -> RepoResult<()>;
}

/// Repository interface for containers and ordered items.
pub trait ItemRepository {
    /// Creates one top-level container.
    fn create_container(&self, kind: ContainerKind, title: &str) -> RepoResult<Container>;
    /// Loads one container by id.
    fn get_container(&self, container_uuid: ContainerId) -> RepoResult<Option<Container>>;
    /// Loads one item by id.
    fn get_item(&self, item_uuid: ItemId) -> RepoResult<Option<Item>>;
    /// Lists items of one container in display order.
    fn list_items(&self, container_uuid: ContainerId) -> RepoResult<Vec<Item>>;
    /// Replaces the title of one item and of the container it owns, if any.
    fn rename_item(&self, item_uuid: ItemId, title: &str) -> RepoResult<()>;
    /// Removes one item and everything it owns; siblings keep their keys.
    fn delete_item(&self, item_uuid: ItemId) -> RepoResult<()>;
    /// Removes one container, its items, and its owning item if nested.
    fn delete_container(&self, container_uuid: ContainerId) -> RepoResult<()>;
    /// Runs `f` inside one exclusive write transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn SiblingStore) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_item_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_container(&self, kind: ContainerKind, title: &str) -> RepoResult<Container> {
        let container_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO containers (container_uuid, kind, title) VALUES (?1, ?2, ?3);",
            params![container_uuid.to_string(), kind.as_str(), title],
        )?;
        Ok(Container {
            uuid: container_uuid,
            kind,
            title: title.to_string(),
            owner_item_uuid: None,
        })
    }

    fn get_container(&self, container_uuid: ContainerId) -> RepoResult<Option<Container>> {
        let row: Option<(String, String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT kind, title, owner_item_uuid
                 FROM containers
                 WHERE container_uuid = ?1;",
                [container_uuid.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(kind_text, title, owner_text)| -> RepoResult<Container> {
            let kind = ContainerKind::parse(&kind_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid container kind `{kind_text}` in containers.kind"
                ))
            })?;
            let owner_item_uuid = owner_text
                .map(|value| parse_uuid(&value, "containers.owner_item_uuid"))
                .transpose()?;
            Ok(Container {
                uuid: container_uuid,
                kind,
                title,
                owner_item_uuid,
            })
        })
        .transpose()
    }

    fn get_item(&self, item_uuid: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE item_uuid = ?1;"))?;
        let mut rows = stmt.query([item_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn list_items(&self, container_uuid: ContainerId) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE container_uuid = ?1
             ORDER BY sort_key ASC, item_uuid ASC;"
        ))?;
        let mut rows = stmt.query([container_uuid.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn rename_item(&self, item_uuid: ItemId, title: &str) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE items
             SET title = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE item_uuid = ?1;",
            params![item_uuid.to_string(), title],
        )?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound(item_uuid));
        }
        tx.execute(
            "UPDATE containers
             SET title = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE owner_item_uuid = ?1;",
            params![item_uuid.to_string(), title],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_item(&self, item_uuid: ItemId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM items WHERE item_uuid = ?1;",
            [item_uuid.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound(item_uuid));
        }
        Ok(())
    }

    fn delete_container(&self, container_uuid: ContainerId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        // A nested container goes with its owning item row.
        let owners_removed = tx.execute(
            "DELETE FROM items
             WHERE item_uuid = (
                 SELECT owner_item_uuid FROM containers WHERE container_uuid = ?1
             );",
            [container_uuid.to_string()],
        )?;
        let containers_removed = tx.execute(
            "DELETE FROM containers WHERE container_uuid = ?1;",
            [container_uuid.to_string()],
        )?;
        if owners_removed + containers_removed == 0 {
            return Err(RepoError::ContainerNotFound(container_uuid));
        }
        tx.commit()?;
        Ok(())
    }

    fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn SiblingStore) -> Result<T, E>,
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let value = f(&SqliteSiblingStore { conn: &tx })?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

struct SqliteSiblingStore<'conn> {
    conn: &'conn Connection,
}

impl SiblingStore for SqliteSiblingStore<'_> {
    fn ordered_siblings(&self, container_uuid: ContainerId) -> RepoResult<Vec<SiblingKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_uuid, sort_key
             FROM items
             WHERE container_uuid = ?1
             ORDER BY sort_key ASC, item_uuid ASC;",
        )?;
        let mut rows = stmt.query([container_uuid.to_string()])?;
        let mut siblings = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            siblings.push(SiblingKey::new(
                parse_uuid(&id_text, "items.item_uuid")?,
                row.get(1)?,
            ));
        }
        Ok(siblings)
    }

    fn item_location(&self, item_uuid: ItemId) -> RepoResult<Option<ItemLocation>> {
        let row: Option<(String, f64)> = self
            .conn
            .query_row(
                "SELECT container_uuid, sort_key FROM items WHERE item_uuid = ?1;",
                [item_uuid.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(container_text, sort_key)| -> RepoResult<ItemLocation> {
            Ok(ItemLocation {
                container_uuid: parse_uuid(&container_text, "items.container_uuid")?,
                sort_key,
            })
        })
        .transpose()
    }

    fn container_exists(&self, container_uuid: ContainerId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM containers WHERE container_uuid = ?1);",
            [container_uuid.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn subtree_contains(&self, root: ItemId, candidate: ContainerId) -> RepoResult<bool> {
        let contains: i64 = self.conn.query_row(
            "WITH RECURSIVE subtree(uuid) AS (
                 SELECT ?1
                 UNION
                 SELECT items.item_uuid
                 FROM items
                 JOIN subtree ON items.container_uuid = subtree.uuid
             )
             SELECT EXISTS(SELECT 1 FROM subtree WHERE uuid = ?2);",
            params![root.to_string(), candidate.to_string()],
            |row| row.get(0),
        )?;
        Ok(contains == 1)
    }

    fn insert_item(
        &self,
        item_uuid: ItemId,
        container_uuid: ContainerId,
        title: &str,
        sort_key: f64,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO items (item_uuid, container_uuid, title, sort_key)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                item_uuid.to_string(),
                container_uuid.to_string(),
                title,
                sort_key
            ],
        )?;
        Ok(())
    }

    fn insert_owned_container(
        &self,
        item_uuid: ItemId,
        kind: ContainerKind,
        title: &str,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO containers (container_uuid, kind, title, owner_item_uuid)
             VALUES (?1, ?2, ?3, ?1);",
            params![item_uuid.to_string(), kind.as_str(), title],
        )?;
        Ok(())
    }

    fn assign_key(
        &self,
        item_uuid: ItemId,
        sort_key: f64,
        container_uuid: Option<ContainerId>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE items
             SET sort_key = ?2,
                 container_uuid = COALESCE(?3, container_uuid),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE item_uuid = ?1;",
            params![
                item_uuid.to_string(),
                sort_key,
                container_uuid.map(|value| value.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound(item_uuid));
        }
        Ok(())
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let item_text: String = row.get("item_uuid")?;
    let container_text: String = row.get("container_uuid")?;
    Ok(Item {
        uuid: parse_uuid(&item_text, "items.item_uuid")?,
        container_uuid: parse_uuid(&container_text, "items.container_uuid")?,
        title: row.get("title")?,
        sort_key: row.get("sort_key")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_item_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
