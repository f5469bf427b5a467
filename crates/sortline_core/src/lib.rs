//! Positional sort keys for ordered board items.
//!
//! The `key` module is the pure engine; `repo` and `service` are a SQLite
//! reference caller that applies its results transactionally.

pub mod config;
pub mod db;
pub mod key;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{load_config, ConfigError, KeySpaceConfig};
pub use key::{
    plan_insert, renormalize, InsertPlan, KeyAssignment, KeyError, KeyResult, KeySpace,
    SiblingKey,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::item::{Container, ContainerId, ContainerKind, Item, ItemId};
pub use repo::item_repo::{
    ItemLocation, ItemRepository, RepoError, RepoResult, SiblingStore, SqliteItemRepository,
};
pub use service::ordering_service::{OrderingError, OrderingService, Placement};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
