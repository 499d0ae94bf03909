//! Core type definitions for Outpost.
//!
//! This crate defines the schema-agnostic types every other Outpost crate
//! builds on:
//! - [`Value`]: the dynamic value tree held in a proxy's backing store
//! - [`DocumentId`]: the opaque document identifier (UUID v7)
//! - [`deep_equal`]: the structural comparison used to decide whether a
//!   write actually changed anything
//!
//! Nothing in here knows about schemas, proxies or change events; those
//! live in `outpost-model`.

mod equal;
mod ids;
mod value;

pub use equal::deep_equal;
pub use ids::DocumentId;
pub use value::{Map, Value, date_to_iso_string, number_to_json};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document id: {0}")]
    InvalidId(#[from] uuid::Error),
}
