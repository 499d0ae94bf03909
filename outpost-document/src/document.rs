use outpost_model::{EmitPolicy, Extract, FieldPath, ObjectProxy, SerializeOptions, Subscription};
use outpost_types::{DocumentId, Map, Value};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use tracing::{debug, trace};

use crate::model::{ETAG_FIELD, ID_FIELD};
use crate::{DeleteRequest, DocumentError, DocumentResult, DocumentStore, Model, UpdateRequest};

/// How a path was modified since the last save.
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    /// Something below this path changed.
    Touched,
    /// This path itself was written.
    Changed {
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
}

/// Result of [`Document::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was modified; the store was not contacted.
    Unchanged,
    /// The document was new and got this id.
    Inserted(DocumentId),
    /// The modified fields were written.
    Updated,
}

#[derive(Debug, Default)]
struct DirtySet {
    paths: BTreeMap<String, Modification>,
}

impl DirtySet {
    fn mark(&mut self, path: &FieldPath, new_value: Option<Value>, old_value: Option<Value>) {
        for ancestor in path.ancestors() {
            trace!(path = %ancestor, "Marking as touched");
            self.paths.entry(ancestor).or_insert(Modification::Touched);
        }
        trace!(path = %path, "Marking as modified");
        match self.paths.entry(path.to_string()) {
            // The old value from the first write since the last save wins.
            Entry::Occupied(mut occupied) => {
                let old_value = match occupied.get() {
                    Modification::Changed { old_value: first, .. } => first.clone(),
                    Modification::Touched => old_value,
                };
                occupied.insert(Modification::Changed {
                    old_value,
                    new_value,
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Modification::Changed {
                    old_value,
                    new_value,
                });
            }
        }
    }
}

/// A model instance: an [`ObjectProxy`] plus modification tracking and the
/// save/remove lifecycle.
///
/// Dereferences to the proxy, so reads and writes look the same as on a
/// bare proxy. Every write that emits is recorded as a modification.
pub struct Document {
    model: Model,
    proxy: ObjectProxy,
    dirty: Rc<RefCell<DirtySet>>,
    _tracker: Subscription,
}

impl Document {
    pub(crate) fn attach(model: Model, proxy: ObjectProxy) -> Self {
        let dirty = Rc::new(RefCell::new(DirtySet::default()));
        let sink = Rc::clone(&dirty);
        let tracker = proxy.on_change(move |event| {
            let new_value = event
                .new_value
                .as_ref()
                .and_then(|property| property.logical_value(SerializeOptions::default()));
            sink.borrow_mut().mark(
                &FieldPath::parse(&event.path),
                new_value,
                event.old_value.clone(),
            );
        });
        Self {
            model,
            proxy,
            dirty,
            _tracker: tracker,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn proxy(&self) -> &ObjectProxy {
        &self.proxy
    }

    pub fn id(&self) -> Option<DocumentId> {
        self.proxy.get_id(ID_FIELD)
    }

    pub fn etag(&self) -> Option<String> {
        self.proxy.get_str(ETAG_FIELD)
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    // ── Modification tracking ────────────────────────────────────

    /// Records a modification of `path`. Every proper prefix is marked as
    /// touched.
    pub fn mark_modified(
        &self,
        path: impl Into<FieldPath>,
        new_value: Option<Value>,
        old_value: Option<Value>,
    ) {
        self.dirty
            .borrow_mut()
            .mark(&path.into(), new_value, old_value);
    }

    /// With a path: whether that path (or anything below it) was modified.
    /// Without one: whether anything was.
    pub fn is_modified(&self, path: Option<&str>) -> bool {
        let dirty = self.dirty.borrow();
        match path {
            None => !dirty.paths.is_empty(),
            Some(path) => dirty.paths.contains_key(path),
        }
    }

    pub fn modification(&self, path: &str) -> Option<Modification> {
        self.dirty.borrow().paths.get(path).cloned()
    }

    pub fn modified_paths(&self) -> Vec<String> {
        self.dirty.borrow().paths.keys().cloned().collect()
    }

    pub fn clear_modified(&self) {
        self.dirty.borrow_mut().paths.clear();
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Writes declared defaults into absent top-level fields.
    pub fn apply_defaults(&self) -> DocumentResult<()> {
        let defaults: Vec<(String, Value)> = self
            .model
            .schema()
            .fields()
            .filter_map(|(name, field)| field.default.clone().map(|d| (name.to_owned(), d)))
            .collect();
        for (name, default) in defaults {
            if self.proxy.get(name.as_str()).is_none() {
                self.proxy.set(name.as_str(), default)?;
            }
        }
        Ok(())
    }

    /// Persists the document.
    ///
    /// Defaults are applied and the `validate` and `before_save` hooks run
    /// first. A new document is always inserted under a fresh id; a stored
    /// one only writes its modified top-level fields, guarded by the etag
    /// it was loaded with.
    pub fn save(&self, store: &mut dyn DocumentStore) -> DocumentResult<SaveOutcome> {
        self.apply_defaults()?;
        self.model
            .hooks()
            .validate(self)
            .map_err(DocumentError::Validation)?;
        self.model.hooks().before_save(self)?;

        let outcome = match self.id() {
            None => self.insert(store)?,
            Some(id) => {
                if !self.is_modified(None) {
                    return Ok(SaveOutcome::Unchanged);
                }
                self.update(store, id)?
            }
        };
        self.model.hooks().after_save(self);
        Ok(outcome)
    }

    fn insert(&self, store: &mut dyn DocumentStore) -> DocumentResult<SaveOutcome> {
        let id = DocumentId::new();
        let mut stored = self.stored_form();
        stored.insert(ID_FIELD.to_owned(), Value::Id(id));
        let etag = compute_etag(&stored)?;
        stored.insert(ETAG_FIELD.to_owned(), Value::from(etag.as_str()));

        debug!(collection = %self.model.collection(), id = %id, "Inserting document");
        store.insert(self.model.collection(), stored)?;

        self.proxy.set_with(ID_FIELD, id, EmitPolicy::Suppress)?;
        self.proxy.set_with(ETAG_FIELD, etag, EmitPolicy::Suppress)?;
        self.clear_modified();
        Ok(SaveOutcome::Inserted(id))
    }

    fn update(&self, store: &mut dyn DocumentStore, id: DocumentId) -> DocumentResult<SaveOutcome> {
        let stored = self.stored_form();
        let etag = compute_etag(&stored)?;

        let mut set = Map::new();
        for path in self.modified_paths() {
            if path.contains('.') || path == ETAG_FIELD {
                continue;
            }
            let value = stored.get(&path).cloned().unwrap_or_default();
            set.insert(path, value);
        }
        set.insert(ETAG_FIELD.to_owned(), Value::from(etag.as_str()));

        let request = UpdateRequest {
            id,
            expected_etag: self.etag(),
            set,
        };
        debug!(
            collection = %self.model.collection(),
            id = %id,
            fields = request.set.len(),
            "Updating document"
        );
        store.update(self.model.collection(), request)?;

        self.proxy.set_with(ETAG_FIELD, etag, EmitPolicy::Suppress)?;
        self.clear_modified();
        Ok(SaveOutcome::Updated)
    }

    /// Deletes the stored document, guarded by its etag, and turns this
    /// instance back into an unsaved one: `_id` and `_etag` are dropped.
    pub fn remove(&self, store: &mut dyn DocumentStore) -> DocumentResult<()> {
        let id = self.id().ok_or(DocumentError::Unsaved)?;
        debug!(collection = %self.model.collection(), id = %id, "Removing document");
        store.delete(
            self.model.collection(),
            DeleteRequest {
                id,
                expected_etag: self.etag(),
            },
        )?;
        self.proxy.unset(ID_FIELD, EmitPolicy::Suppress)?;
        self.proxy.unset(ETAG_FIELD, EmitPolicy::Suppress)?;
        self.clear_modified();
        Ok(())
    }

    /// The logical form without virtual fields, which is what gets stored.
    fn stored_form(&self) -> Map {
        match self.proxy.to_object(SerializeOptions::without_virtuals()) {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Hex SHA-256 of the display form, current `_etag` included.
fn compute_etag(stored: &Map) -> DocumentResult<String> {
    let display = stored
        .display_value(SerializeOptions::without_virtuals())
        .unwrap_or(serde_json::Value::Null);
    let body = serde_json::to_vec(&display)?;
    Ok(hex::encode(Sha256::digest(&body)))
}

impl Deref for Document {
    type Target = ObjectProxy;

    fn deref(&self) -> &ObjectProxy {
        &self.proxy
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("model", &self.model.name())
            .field("id", &self.id())
            .field("modified", &self.modified_paths())
            .finish()
    }
}
