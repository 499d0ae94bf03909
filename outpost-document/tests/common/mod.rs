//! Shared test helpers for document tests.

#![allow(dead_code)]

use outpost_document::{
    DeleteRequest, DocumentError, DocumentResult, DocumentStore, ETAG_FIELD, FindOptions, Model,
    ModelConfig, SortOrder, UpdateRequest,
};
use outpost_model::{Definition, FieldDef};
use outpost_types::{DocumentId, Map, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Once;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One call seen by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Insert(String, Map),
    Update(String, UpdateRequest),
    Delete(String, DeleteRequest),
}

/// In-memory store enforcing etag guards like a real backend would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub collections: BTreeMap<String, BTreeMap<DocumentId, Map>>,
    pub calls: Vec<StoreCall>,
    /// Filters seen by `find`, `count` and `delete_many`, in order.
    pub filters: RefCell<Vec<Map>>,
    pub fail_next: Option<String>,
}

impl MemoryStore {
    pub fn get(&self, collection: &str, id: DocumentId) -> Option<&Map> {
        self.collections.get(collection)?.get(&id)
    }

    fn check_failure(&mut self) -> DocumentResult<()> {
        match self.fail_next.take() {
            Some(message) => Err(DocumentError::Store(message)),
            None => Ok(()),
        }
    }

    fn matching(&self, collection: &str, filter: &Map) -> Vec<Map> {
        self.filters.borrow_mut().push(filter.clone());
        self.collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matches_filter(doc, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn guarded(
        &mut self,
        collection: &str,
        id: DocumentId,
        expected: &Option<String>,
    ) -> DocumentResult<&mut Map> {
        let doc = self
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(&id))
            .ok_or(DocumentError::NotFound(id))?;
        let current = doc.get(ETAG_FIELD).and_then(Value::as_str).map(str::to_owned);
        if current != *expected {
            return Err(DocumentError::Conflict { id });
        }
        Ok(doc)
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&mut self, collection: &str, document: Map) -> DocumentResult<()> {
        self.check_failure()?;
        self.calls
            .push(StoreCall::Insert(collection.to_owned(), document.clone()));
        let id = document
            .get("_id")
            .and_then(Value::as_id)
            .ok_or_else(|| DocumentError::Store("missing _id".into()))?;
        self.collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id, document);
        Ok(())
    }

    fn update(&mut self, collection: &str, request: UpdateRequest) -> DocumentResult<()> {
        self.check_failure()?;
        self.calls
            .push(StoreCall::Update(collection.to_owned(), request.clone()));
        let doc = self.guarded(collection, request.id, &request.expected_etag)?;
        doc.extend(request.set);
        Ok(())
    }

    fn delete(&mut self, collection: &str, request: DeleteRequest) -> DocumentResult<()> {
        self.check_failure()?;
        self.calls
            .push(StoreCall::Delete(collection.to_owned(), request.clone()));
        self.guarded(collection, request.id, &request.expected_etag)?;
        if let Some(docs) = self.collections.get_mut(collection) {
            docs.remove(&request.id);
        }
        Ok(())
    }

    fn fetch(&self, collection: &str, id: DocumentId) -> DocumentResult<Option<Map>> {
        Ok(self.get(collection, id).cloned())
    }

    fn find(
        &self,
        collection: &str,
        filter: &Map,
        options: &FindOptions,
    ) -> DocumentResult<Vec<Map>> {
        let mut docs = self.matching(collection, filter);
        docs.sort_by(|a, b| {
            options
                .sort
                .iter()
                .map(|(field, order)| {
                    let ordering = compare_fields(a.get(field), b.get(field));
                    match order {
                        SortOrder::Ascending => ordering,
                        SortOrder::Descending => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(docs
            .into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn count(&self, collection: &str, filter: &Map) -> DocumentResult<usize> {
        Ok(self.matching(collection, filter).len())
    }

    fn delete_many(&mut self, collection: &str, filter: &Map) -> DocumentResult<usize> {
        self.check_failure()?;
        self.filters.borrow_mut().push(filter.clone());
        let Some(docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, doc| !matches_filter(doc, filter));
        Ok(before - docs.len())
    }
}

fn matches_filter(doc: &Map, filter: &Map) -> bool {
    filter.iter().all(|(key, expected)| match doc.get(key) {
        Some(found) => found == expected,
        None => expected.is_null(),
    })
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Some(Value::Date(x)), Some(Value::Date(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A blog post model with a default, a nested object and a virtual.
pub fn post_definition() -> Definition {
    Definition::new("Post")
        .field("title", FieldDef::string())
        .field("views", FieldDef::number().with_default(0))
        .field("published", FieldDef::date())
        .field("tags", FieldDef::array_of(FieldDef::string()))
        .field(
            "author",
            FieldDef::object()
                .field("name", FieldDef::string())
                .field("email", FieldDef::string()),
        )
        .field(
            "slug",
            FieldDef::virtual_getter(|proxy| {
                proxy
                    .get_str("title")
                    .map(|t| Value::from(t.to_lowercase().replace(' ', "-")))
            }),
        )
}

/// Converts a JSON object literal into a filter map.
pub fn filter(json: serde_json::Value) -> Map {
    match Value::from(json) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn post_model() -> Model {
    Model::define(post_definition(), ModelConfig::collection("posts")).expect("post model")
}
