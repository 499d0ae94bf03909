use outpost_model::cast::cast;
use outpost_model::{Definition, FieldDef, ObjectProxy, Schema, SchemaError};
use outpost_types::{DocumentId, Map, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

use crate::{
    Document, DocumentError, DocumentHooks, DocumentResult, DocumentStore, FindOptions, NoHooks,
};

/// Identifier field added to every model.
pub const ID_FIELD: &str = "_id";
/// Concurrency tag field added to every model.
pub const ETAG_FIELD: &str = "_etag";

/// Model-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Store collection. Empty means the model name.
    pub collection: String,
}

impl ModelConfig {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
        }
    }
}

/// A compiled model: the schema with its system fields, the collection it
/// lives in, and its lifecycle hooks. Cheap to clone.
#[derive(Clone)]
pub struct Model {
    name: String,
    collection: String,
    schema: Rc<Schema>,
    hooks: Rc<dyn DocumentHooks>,
}

impl Model {
    /// Compiles `definition` with `_id` and `_etag` merged in.
    pub fn define(definition: Definition, config: ModelConfig) -> DocumentResult<Self> {
        if definition.name.trim().is_empty() {
            return Err(SchemaError::MissingName.into());
        }
        let system = Definition::default()
            .field(ID_FIELD, FieldDef::identifier())
            .field(ETAG_FIELD, FieldDef::string());
        let schema = definition.extend(&system).compile()?;
        let collection = if config.collection.is_empty() {
            definition.name.clone()
        } else {
            config.collection
        };
        debug!(model = %definition.name, collection = %collection, "Model defined");
        Ok(Self {
            name: definition.name,
            collection,
            schema,
            hooks: Rc::new(NoHooks),
        })
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl DocumentHooks + 'static) -> Self {
        self.hooks = Rc::new(hooks);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    pub(crate) fn hooks(&self) -> &dyn DocumentHooks {
        self.hooks.as_ref()
    }

    /// Builds a new, unsaved document and runs the `on_init` hook.
    pub fn create(&self, raw: impl Into<Value>) -> DocumentResult<Document> {
        let document = self.hydrate(raw)?;
        self.hooks.on_init(&document)?;
        Ok(document)
    }

    /// Wraps an already stored document. Nothing is marked modified.
    pub fn hydrate(&self, raw: impl Into<Value>) -> DocumentResult<Document> {
        let proxy = ObjectProxy::new(&self.schema, raw)?;
        Ok(Document::attach(self.clone(), proxy))
    }

    /// Loads a document by id.
    pub fn find_by_id(&self, store: &dyn DocumentStore, id: DocumentId) -> DocumentResult<Document> {
        debug!(collection = %self.collection, id = %id, "Finding document");
        let raw = store
            .fetch(&self.collection, id)?
            .ok_or(DocumentError::NotFound(id))?;
        self.hydrate(Value::Object(raw))
    }

    // ── Finders ──────────────────────────────────────────────────

    /// Casts every filter entry to its field's declared type. Keys the
    /// schema does not name, and virtual fields, are dropped.
    pub fn cast_filter(&self, filter: Map) -> DocumentResult<Map> {
        let mut cast_filter = Map::new();
        for (name, value) in filter {
            let Some(field) = self.schema.field(&name) else {
                continue;
            };
            if field.kind.is_virtual() {
                continue;
            }
            let value = cast(&name, &field.kind, value)?;
            cast_filter.insert(name, value);
        }
        Ok(cast_filter)
    }

    /// Loads every document matching `filter`.
    pub fn find(
        &self,
        store: &dyn DocumentStore,
        filter: Map,
        options: &FindOptions,
    ) -> DocumentResult<Vec<Document>> {
        let filter = self.cast_filter(filter)?;
        debug!(collection = %self.collection, filter = filter.len(), "Finding documents");
        store
            .find(&self.collection, &filter, options)?
            .into_iter()
            .map(|raw| self.hydrate(Value::Object(raw)))
            .collect()
    }

    /// Loads the first document matching `filter`, if any.
    pub fn find_one(&self, store: &dyn DocumentStore, filter: Map) -> DocumentResult<Option<Document>> {
        let found = self.find(store, filter, &FindOptions::default().limit(1))?;
        Ok(found.into_iter().next())
    }

    pub fn count(&self, store: &dyn DocumentStore, filter: Map) -> DocumentResult<usize> {
        let filter = self.cast_filter(filter)?;
        debug!(collection = %self.collection, filter = filter.len(), "Counting documents");
        store.count(&self.collection, &filter)
    }

    /// Removes every stored document matching `filter`. Loaded instances
    /// are not touched.
    pub fn remove_where(&self, store: &mut dyn DocumentStore, filter: Map) -> DocumentResult<usize> {
        let filter = self.cast_filter(filter)?;
        debug!(collection = %self.collection, filter = filter.len(), "Removing documents");
        store.delete_many(&self.collection, &filter)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("fields", &self.schema.len())
            .finish()
    }
}
