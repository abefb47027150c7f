//! Notebook domain model.
//!
//! # Responsibility
//! - Define the serializable records persisted in the notebook document.
//! - Keep JSON field names stable across releases.
//!
//! # Invariants
//! - Every entity carries a stable UUID identity.
//! - Optional fields default on decode so older documents keep loading.

pub mod geometry;
pub mod notebook;
pub mod page;
