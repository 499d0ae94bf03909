use chrono::{DateTime, Utc};
use outpost_types::{DocumentId, Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

use crate::cast::cast;
use crate::error::{ModelError, ModelResult};
use crate::events::{ChangeEmitter, ChangeEvent, EmitPolicy, Listener, Subscription};
use crate::path::FieldPath;
use crate::proxy::{ArrayProxy, DateProxy, Property};
use crate::schema::{FieldKind, Schema};
use crate::serialize::{Extract, SerializeOptions};

/// The proxy backing a structural field.
#[derive(Clone)]
enum Child {
    Object(ObjectProxy),
    Array(ArrayProxy),
    Date(DateProxy),
}

impl Child {
    fn subscribe(&self, listener: Listener) -> Subscription {
        match self {
            Child::Object(o) => o.subscribe(listener),
            Child::Array(a) => a.subscribe(listener),
            Child::Date(d) => d.subscribe(listener),
        }
    }

    fn to_property(&self) -> Property {
        match self {
            Child::Object(o) => Property::Object(o.clone()),
            Child::Array(a) => Property::Array(a.clone()),
            Child::Date(d) => Property::Date(d.clone()),
        }
    }
}

/// One materialized field. Structural fields keep the relay subscription
/// that forwards the child's events next to the child itself.
enum Slot {
    Scalar(Value),
    Child {
        proxy: Child,
        _relay: Subscription,
    },
}

impl Slot {
    fn property(&self) -> Property {
        match self {
            Slot::Scalar(value) => Property::Value(value.clone()),
            Slot::Child { proxy, .. } => proxy.to_property(),
        }
    }
}

struct ObjectInner {
    schema: Rc<Schema>,
    store: RefCell<BTreeMap<String, Slot>>,
    emitter: Rc<ChangeEmitter>,
}

/// Live, type-casting, change-tracking view over one nested object.
///
/// Cloning the handle shares the instance. The backing store is never
/// borrowed while a listener or virtual accessor runs, so both may read and
/// write the proxy they were called from.
#[derive(Clone)]
pub struct ObjectProxy {
    inner: Rc<ObjectInner>,
}

impl ObjectProxy {
    /// Builds a proxy over `raw` and hydrates it without emitting.
    ///
    /// `Null` yields an empty instance. Keys the schema does not name are
    /// dropped, known values are cast, structural values become child
    /// proxies.
    pub fn new(schema: &Rc<Schema>, raw: impl Into<Value>) -> ModelResult<Self> {
        let proxy = Self::empty(schema);
        match raw.into() {
            Value::Null => {}
            Value::Object(map) => proxy.hydrate(map)?,
            other => return Err(ModelError::cast(schema.name(), "object", other.kind_name())),
        }
        Ok(proxy)
    }

    pub fn empty(schema: &Rc<Schema>) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                schema: Rc::clone(schema),
                store: RefCell::new(BTreeMap::new()),
                emitter: ChangeEmitter::new(),
            }),
        }
    }

    fn hydrate(&self, raw: Map) -> ModelResult<()> {
        for (name, value) in raw {
            let Some(field) = self.inner.schema.field(&name) else {
                continue;
            };
            if value.is_null() || field.kind.is_virtual() {
                continue;
            }
            self.set_segments(std::slice::from_ref(&name), value, EmitPolicy::Suppress)?;
        }
        Ok(())
    }

    pub fn schema(&self) -> &Rc<Schema> {
        &self.inner.schema
    }

    pub fn ptr_eq(&self, other: &ObjectProxy) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Names of the fields currently holding a value.
    pub fn keys(&self) -> Vec<String> {
        self.inner.store.borrow().keys().cloned().collect()
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Resolves a dotted or segmented path. Unknown names, an empty path
    /// and non-structural intermediates all resolve to `None`.
    pub fn get(&self, path: impl Into<FieldPath>) -> Option<Property> {
        let path = path.into();
        self.get_segments(path.segments())
    }

    fn get_segments(&self, segments: &[String]) -> Option<Property> {
        let (head, rest) = segments.split_first()?;
        let field = self.inner.schema.field(head)?;
        if let FieldKind::Virtual(accessors) = &field.kind {
            return match rest {
                [] => accessors.call_get(self).map(Property::Value),
                _ => None,
            };
        }
        let property = self.inner.store.borrow().get(head).map(Slot::property)?;
        if rest.is_empty() {
            return Some(property);
        }
        match property {
            Property::Object(child) => child.get_segments(rest),
            Property::Array(child) => child.get_path(rest),
            Property::Date(child) => child.get_path(rest),
            Property::Value(_) => None,
        }
    }

    /// Logical value at `path`.
    pub fn get_value(&self, path: impl Into<FieldPath>) -> Option<Value> {
        self.get(path)
            .and_then(|property| property.logical_value(SerializeOptions::default()))
    }

    pub fn get_str(&self, path: impl Into<FieldPath>) -> Option<String> {
        match self.get(path)? {
            Property::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_f64(&self, path: impl Into<FieldPath>) -> Option<f64> {
        self.get(path)?.as_value()?.as_f64()
    }

    pub fn get_bool(&self, path: impl Into<FieldPath>) -> Option<bool> {
        self.get(path)?.as_value()?.as_bool()
    }

    pub fn get_id(&self, path: impl Into<FieldPath>) -> Option<DocumentId> {
        self.get(path)?.as_value()?.as_id()
    }

    pub fn get_date(&self, path: impl Into<FieldPath>) -> Option<DateTime<Utc>> {
        match self.get(path)? {
            Property::Date(date) => Some(date.value()),
            Property::Value(value) => value.as_date(),
            _ => None,
        }
    }

    pub fn get_object(&self, path: impl Into<FieldPath>) -> Option<ObjectProxy> {
        match self.get(path)? {
            Property::Object(child) => Some(child),
            _ => None,
        }
    }

    pub fn get_array(&self, path: impl Into<FieldPath>) -> Option<ArrayProxy> {
        match self.get(path)? {
            Property::Array(child) => Some(child),
            _ => None,
        }
    }

    pub fn get_date_proxy(&self, path: impl Into<FieldPath>) -> Option<DateProxy> {
        match self.get(path)? {
            Property::Date(child) => Some(child),
            _ => None,
        }
    }

    /// Whether the schema can resolve `path`. Instance data is not
    /// consulted, so an unset field still counts.
    pub fn has(&self, path: impl Into<FieldPath>) -> bool {
        let path = path.into();
        self.inner.schema.has_path(path.segments())
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Casts and writes `value` at `path`, emitting on change.
    pub fn set(&self, path: impl Into<FieldPath>, value: impl Into<Value>) -> ModelResult<()> {
        self.set_with(path, value, EmitPolicy::Propagate)
    }

    pub fn set_with(
        &self,
        path: impl Into<FieldPath>,
        value: impl Into<Value>,
        policy: EmitPolicy,
    ) -> ModelResult<()> {
        let path = path.into();
        if path.is_empty() {
            return Err(ModelError::InvalidPath);
        }
        self.set_segments(path.segments(), value.into(), policy)
    }

    /// Writes every entry of `values`; keys the schema does not name are
    /// skipped.
    pub fn assign(&self, values: Map, policy: EmitPolicy) -> ModelResult<()> {
        for (name, value) in values {
            if self.inner.schema.field(&name).is_none() {
                continue;
            }
            self.set_segments(std::slice::from_ref(&name), value, policy)?;
        }
        Ok(())
    }

    /// Removes the value at `path` so the field reads as absent again.
    /// Works for scalar and structural fields alike. Unknown paths, virtual
    /// fields and unset parents are skipped; nothing is materialized.
    pub fn unset(&self, path: impl Into<FieldPath>, policy: EmitPolicy) -> ModelResult<()> {
        let path = path.into();
        if path.is_empty() {
            return Err(ModelError::InvalidPath);
        }
        self.unset_segments(path.segments(), policy);
        Ok(())
    }

    fn unset_segments(&self, segments: &[String], policy: EmitPolicy) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        let Some(field) = self.inner.schema.field(head) else {
            return;
        };
        if field.kind.is_virtual() {
            return;
        }
        if rest.is_empty() {
            self.remove_slot(head, policy);
            return;
        }
        let child = self.inner.store.borrow().get(head).map(Slot::property);
        if let Some(Property::Object(child)) = child {
            child.unset_segments(rest, policy);
        }
    }

    pub(crate) fn set_segments(
        &self,
        segments: &[String],
        value: Value,
        policy: EmitPolicy,
    ) -> ModelResult<()> {
        let Some((head, rest)) = segments.split_first() else {
            return Err(ModelError::InvalidPath);
        };
        // Checked up front so an unknown leaf never materializes its parents.
        if !self.inner.schema.has_path(segments) {
            trace!(schema = %self.inner.schema.name(), path = %segments.join("."), "Skipping unknown path");
            return Ok(());
        }
        let Some(field) = self.inner.schema.field(head) else {
            return Ok(());
        };
        if !rest.is_empty() {
            return self.set_nested(head, &field.kind, rest, value, policy);
        }
        let value = cast(head, &field.kind, value)?;
        match &field.kind {
            FieldKind::Virtual(accessors) => accessors.call_set(head, self, value),
            kind if kind.is_structural() => self.replace_child(head, kind, value, policy),
            _ => self.replace_scalar(head, value, policy),
        }
    }

    fn replace_scalar(&self, name: &str, value: Value, policy: EmitPolicy) -> ModelResult<()> {
        let old = self.inner.store.borrow().get(name).map(Slot::property);
        let old = old.and_then(|property| property.logical_value(SerializeOptions::default()));
        if old.as_ref().is_some_and(|old| *old == value) {
            return Ok(());
        }
        let replaced = self
            .inner
            .store
            .borrow_mut()
            .insert(name.to_owned(), Slot::Scalar(value.clone()));
        drop(replaced);
        if policy.propagates() {
            self.inner.emitter.emit(&ChangeEvent::field(
                name,
                Some(Property::Value(value)),
                old,
            ));
        }
        Ok(())
    }

    /// Installs a new child proxy for a structural field. The comparison is
    /// between stored shapes, so virtual fields never count as a change.
    fn replace_child(
        &self,
        name: &str,
        kind: &FieldKind,
        value: Value,
        policy: EmitPolicy,
    ) -> ModelResult<()> {
        if value.is_null() {
            self.remove_slot(name, policy);
            return Ok(());
        }

        let stored = SerializeOptions::without_virtuals();
        let old = self.inner.store.borrow().get(name).map(Slot::property);
        let old_value = old.as_ref().and_then(|property| property.logical_value(stored));
        let child = build_child(name, kind, value)?;
        if old.is_some() && old_value == child.to_property().logical_value(stored) {
            return Ok(());
        }

        // The old relay must be gone before the new child is wired up.
        let removed = self.inner.store.borrow_mut().remove(name);
        drop(removed);
        let relay = self.relay(name, &child);
        self.inner.store.borrow_mut().insert(
            name.to_owned(),
            Slot::Child {
                proxy: child.clone(),
                _relay: relay,
            },
        );
        if policy.propagates() {
            self.inner
                .emitter
                .emit(&ChangeEvent::field(name, Some(child.to_property()), old_value));
        }
        Ok(())
    }

    /// Drops the slot of `name`, emitting `new_value: None` if there was one.
    fn remove_slot(&self, name: &str, policy: EmitPolicy) {
        let removed = self.inner.store.borrow_mut().remove(name);
        let Some(removed) = removed else {
            return;
        };
        let old_value = removed
            .property()
            .logical_value(SerializeOptions::without_virtuals());
        drop(removed);
        if policy.propagates() {
            self.inner
                .emitter
                .emit(&ChangeEvent::field(name, None, old_value));
        }
    }

    /// Subscribes to `child` and re-emits its events on this proxy with
    /// `name` prefixed to the path.
    fn relay(&self, name: &str, child: &Child) -> Subscription {
        let parent = Rc::downgrade(&self.inner.emitter);
        let field = name.to_owned();
        child.subscribe(Rc::new(move |event: &ChangeEvent| {
            if let Some(parent) = parent.upgrade() {
                parent.emit(&event.relayed(&field));
            }
        }))
    }

    /// Writes below a structural field, materializing an empty object or
    /// array first if the field is unset. Paths into arrays are skipped.
    fn set_nested(
        &self,
        name: &str,
        kind: &FieldKind,
        rest: &[String],
        value: Value,
        policy: EmitPolicy,
    ) -> ModelResult<()> {
        let existing = self.inner.store.borrow().get(name).map(Slot::property);
        let child = match existing {
            Some(child) => child,
            None => {
                let seed = match kind {
                    FieldKind::Object(_) => Value::object(),
                    FieldKind::Array(_) => Value::array(),
                    _ => return Ok(()),
                };
                self.replace_child(name, kind, seed, EmitPolicy::Suppress)?;
                let created = self.inner.store.borrow().get(name).map(Slot::property);
                match created {
                    Some(child) => child,
                    None => return Ok(()),
                }
            }
        };
        match child {
            Property::Object(child) => child.set_segments(rest, value, policy),
            Property::Date(child) => child.set_path(rest, value, policy),
            Property::Array(_) | Property::Value(_) => Ok(()),
        }
    }

    // ── Serialization ────────────────────────────────────────────

    /// Logical value of the whole instance.
    pub fn to_object(&self, options: SerializeOptions) -> Value {
        self.logical_value(options).unwrap_or_default()
    }

    /// Display value of the whole instance.
    pub fn to_json(&self, options: SerializeOptions) -> serde_json::Value {
        self.display_value(options)
            .unwrap_or(serde_json::Value::Null)
    }

    /// Runs `pass` over every stored field, then over every virtual field
    /// when requested, dropping absent results.
    fn entries<T>(
        &self,
        options: SerializeOptions,
        pass: impl Fn(&dyn Extract) -> Option<T>,
    ) -> Vec<(String, T)> {
        let stored: Vec<(String, Property)> = self
            .inner
            .store
            .borrow()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.property()))
            .collect();
        let mut out: Vec<(String, T)> = stored
            .into_iter()
            .filter_map(|(name, property)| pass(&property).map(|v| (name, v)))
            .collect();
        if options.include_virtuals {
            for (name, field) in self.inner.schema.fields() {
                if let FieldKind::Virtual(accessors) = &field.kind {
                    let computed = accessors.call_get(self);
                    if let Some(v) = pass(&computed) {
                        out.push((name.to_owned(), v));
                    }
                }
            }
        }
        out
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Registers a listener for changes on this proxy and everything below
    /// it. The listener stays registered while the returned handle lives.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.subscribe(Rc::new(listener))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.emitter.listener_count()
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.emitter.subscribe(listener)
    }
}

fn build_child(name: &str, kind: &FieldKind, value: Value) -> ModelResult<Child> {
    match (kind, value) {
        (FieldKind::Object(schema), value) => ObjectProxy::new(schema, value).map(Child::Object),
        (FieldKind::Array(items), Value::Array(elements)) => Ok(Child::Array(
            ArrayProxy::with_kind(name, items.as_deref().cloned(), elements),
        )),
        (FieldKind::Date, Value::Date(date)) => Ok(Child::Date(DateProxy::new(date))),
        (kind, other) => Err(ModelError::cast(
            name,
            kind.field_type().as_str(),
            other.kind_name(),
        )),
    }
}

impl Extract for ObjectProxy {
    fn logical_value(&self, options: SerializeOptions) -> Option<Value> {
        let entries = self.entries(options, |item| item.logical_value(options));
        Some(Value::Object(entries.into_iter().collect()))
    }

    fn display_value(&self, options: SerializeOptions) -> Option<serde_json::Value> {
        let entries = self.entries(options, |item| item.display_value(options));
        Some(serde_json::Value::Object(entries.into_iter().collect()))
    }
}

impl fmt::Debug for ObjectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProxy")
            .field("schema", &self.inner.schema.name())
            .field("fields", &self.keys())
            .finish()
    }
}
