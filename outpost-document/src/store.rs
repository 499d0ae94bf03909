use outpost_types::{DocumentId, Map};
use serde::{Deserialize, Serialize};

use crate::DocumentResult;

/// Partial write to a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: DocumentId,
    /// The etag the document was read with. The store must refuse the write
    /// with [`DocumentError::Conflict`](crate::DocumentError::Conflict) if it
    /// holds a different one.
    pub expected_etag: Option<String>,
    /// Top-level fields to overwrite. Always includes the new `_etag`.
    pub set: Map,
}

/// Removal of a stored document, guarded like [`UpdateRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: DocumentId,
    pub expected_etag: Option<String>,
}

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Paging and ordering for [`DocumentStore::find`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindOptions {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    /// Sort keys, most significant first.
    pub sort: Vec<(String, SortOrder)>,
}

impl FindOptions {
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }
}

/// Persistence backend driven by [`Document`](crate::Document).
///
/// Filters are equality maps over top-level fields, already cast to the
/// model's declared types. An empty filter matches every document; a
/// `Null` entry matches documents where the field is null or absent.
///
/// Implementations map collections and documents onto whatever storage they
/// wrap. Documents arrive in logical form: dates and ids keep their types.
pub trait DocumentStore {
    /// Stores a new document. The map always carries `_id` and `_etag`.
    fn insert(&mut self, collection: &str, document: Map) -> DocumentResult<()>;

    /// Applies a guarded partial write.
    fn update(&mut self, collection: &str, request: UpdateRequest) -> DocumentResult<()>;

    /// Applies a guarded removal.
    fn delete(&mut self, collection: &str, request: DeleteRequest) -> DocumentResult<()>;

    /// Loads a stored document, or `None` if the id is unknown.
    fn fetch(&self, collection: &str, id: DocumentId) -> DocumentResult<Option<Map>>;

    /// Loads every document matching `filter`, ordered and paged by
    /// `options`.
    fn find(
        &self,
        collection: &str,
        filter: &Map,
        options: &FindOptions,
    ) -> DocumentResult<Vec<Map>>;

    /// Counts the documents matching `filter`.
    fn count(&self, collection: &str, filter: &Map) -> DocumentResult<usize>;

    /// Removes every document matching `filter` and returns how many went.
    fn delete_many(&mut self, collection: &str, filter: &Map) -> DocumentResult<usize>;
}
