//! Domain model for ordered board items.
//!
//! # Responsibility
//! - Define items, containers and their identifiers.
//! - Stay free of storage and ordering-algorithm details.
//!
//! # Invariants
//! - Every item is identified by a stable `ItemId`.
//! - Containers are addressed by id only; nesting is the caller's concern.

pub mod item;
