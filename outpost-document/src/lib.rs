//! Persistent documents on top of the Outpost proxy tree.
//!
//! - [`Model`]: a compiled schema with the `_id`/`_etag` system fields, a
//!   collection name and optional [`DocumentHooks`]
//! - [`Document`]: one instance, tracking which paths were modified since
//!   it was loaded or last saved
//! - [`DocumentStore`]: the persistence backend a document saves through,
//!   also queried by the model's finders with equality filters
//!
//! Saves are optimistic: every stored document carries an etag derived
//! from its content, and updates and deletes are refused by the store when
//! the etag no longer matches.

mod document;
mod error;
mod hooks;
mod model;
mod store;

pub use document::{Document, Modification, SaveOutcome};
pub use error::{DocumentError, DocumentResult};
pub use hooks::{DocumentHooks, NoHooks};
pub use model::{ETAG_FIELD, ID_FIELD, Model, ModelConfig};
pub use store::{DeleteRequest, DocumentStore, FindOptions, SortOrder, UpdateRequest};
