//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the sibling read/write accessors ordering operations consume.
//! - Isolate SQLite query details from ordering orchestration.
//!
//! # Invariants
//! - Every read-compute-write ordering cycle runs inside
//!   `ItemRepository::with_transaction`.
//! - Repository APIs return semantic errors (`ItemNotFound`) in addition to
//!   DB transport errors.

pub mod item_repo;
