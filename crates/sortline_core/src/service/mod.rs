//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate the key engine and repository calls into ordering use cases.
//! - Keep CLI and other callers decoupled from storage details.

pub mod ordering_service;
