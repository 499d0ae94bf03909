use outpost_types::{Value, deep_equal};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::cast::{cast, cast_elements};
use crate::error::ModelResult;
use crate::events::{ChangeEmitter, ChangeEvent, Listener, Subscription};
use crate::proxy::Property;
use crate::schema::FieldKind;
use crate::serialize::{Extract, SerializeOptions};

struct ArrayInner {
    field: String,
    item_kind: Option<FieldKind>,
    items: RefCell<Vec<Value>>,
    emitter: Rc<ChangeEmitter>,
}

/// Proxy over a sequence.
///
/// Every mutator emits one bare event, whether or not the contents actually
/// changed; the owning object relays it with the field name filled in.
/// Queries work on a snapshot, so closures passed to them may freely touch
/// the proxy.
#[derive(Clone)]
pub struct ArrayProxy {
    inner: Rc<ArrayInner>,
}

impl ArrayProxy {
    /// A free-standing array without an element type.
    pub fn new(items: Vec<Value>) -> Self {
        Self::with_kind("", None, items)
    }

    pub(crate) fn with_kind(field: &str, item_kind: Option<FieldKind>, items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                field: field.to_owned(),
                item_kind,
                items: RefCell::new(items),
                emitter: ChangeEmitter::new(),
            }),
        }
    }

    pub fn ptr_eq(&self, other: &ArrayProxy) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn cast_one(&self, value: Value) -> ModelResult<Value> {
        match &self.inner.item_kind {
            Some(kind) => cast(&self.inner.field, kind, value),
            None => Ok(value),
        }
    }

    fn cast_many(&self, values: Vec<Value>) -> ModelResult<Vec<Value>> {
        match &self.inner.item_kind {
            Some(kind) => cast_elements(&self.inner.field, kind, values),
            None => Ok(values),
        }
    }

    /// Applies `mutate` to the backing sequence, then emits. The borrow is
    /// released before listeners run.
    fn mutate<R>(&self, mutate: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let result = {
            let mut items = self.inner.items.borrow_mut();
            mutate(&mut *items)
        };
        self.inner.emitter.emit(&ChangeEvent::bare());
        result
    }

    // ── Mutators ─────────────────────────────────────────────────

    /// Appends one element and returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> ModelResult<usize> {
        let value = self.cast_one(value.into())?;
        Ok(self.mutate(|items| {
            items.push(value);
            items.len()
        }))
    }

    /// Appends several elements with a single event.
    pub fn push_all(&self, values: impl IntoIterator<Item = Value>) -> ModelResult<usize> {
        let values = self.cast_many(values.into_iter().collect())?;
        Ok(self.mutate(|items| {
            items.extend(values);
            items.len()
        }))
    }

    pub fn pop(&self) -> Option<Value> {
        self.mutate(Vec::pop)
    }

    pub fn shift(&self) -> Option<Value> {
        self.mutate(|items| (!items.is_empty()).then(|| items.remove(0)))
    }

    /// Prepends one element and returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> ModelResult<usize> {
        let value = self.cast_one(value.into())?;
        Ok(self.mutate(|items| {
            items.insert(0, value);
            items.len()
        }))
    }

    pub fn reverse(&self) {
        self.mutate(|items| items.reverse());
    }

    /// Sorts by string form, the default ordering of dynamic arrays.
    pub fn sort(&self) {
        self.mutate(|items| items.sort_by_cached_key(ToString::to_string));
    }

    /// Sorts with a caller-supplied comparison. The comparison runs on a
    /// detached copy.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut sorted = self.to_vec();
        sorted.sort_by(compare);
        self.mutate(|items| *items = sorted);
    }

    /// Removes `delete_count` elements at `start` and inserts `insert` in
    /// their place. A negative `start` counts from the end. Returns the
    /// removed elements.
    pub fn splice(
        &self,
        start: isize,
        delete_count: usize,
        insert: Vec<Value>,
    ) -> ModelResult<Vec<Value>> {
        let insert = self.cast_many(insert)?;
        Ok(self.mutate(|items| {
            let start = resolve_index(start, items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, insert).collect()
        }))
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.index_of(value).is_some()
    }

    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.inner
            .items
            .borrow()
            .iter()
            .position(|item| deep_equal(item, value))
    }

    pub fn last_index_of(&self, value: &Value) -> Option<usize> {
        self.inner
            .items
            .borrow()
            .iter()
            .rposition(|item| deep_equal(item, value))
    }

    pub fn find<F>(&self, mut predicate: F) -> Option<Value>
    where
        F: FnMut(&Value) -> bool,
    {
        self.to_vec().into_iter().find(|item| predicate(item))
    }

    pub fn find_index<F>(&self, predicate: F) -> Option<usize>
    where
        F: FnMut(&Value) -> bool,
    {
        self.to_vec().iter().position(predicate)
    }

    pub fn every<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&Value) -> bool,
    {
        self.to_vec().iter().all(predicate)
    }

    pub fn some<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&Value) -> bool,
    {
        self.to_vec().iter().any(predicate)
    }

    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&Value) -> T,
    {
        self.to_vec().iter().map(f).collect()
    }

    pub fn filter<F>(&self, mut predicate: F) -> Vec<Value>
    where
        F: FnMut(&Value) -> bool,
    {
        self.to_vec()
            .into_iter()
            .filter(|item| predicate(item))
            .collect()
    }

    pub fn fold<B, F>(&self, init: B, f: F) -> B
    where
        F: FnMut(B, &Value) -> B,
    {
        self.to_vec().iter().fold(init, f)
    }

    /// Copies `start..end`; negative bounds count from the end.
    pub fn slice(&self, start: isize, end: Option<isize>) -> Vec<Value> {
        let items = self.inner.items.borrow();
        let start = resolve_index(start, items.len());
        let end = end.map_or(items.len(), |end| resolve_index(end, items.len()));
        if start >= end {
            return Vec::new();
        }
        items[start..end].to_vec()
    }

    /// Joins string forms with `separator`; nulls render as empty strings.
    pub fn join(&self, separator: &str) -> String {
        self.inner
            .items
            .borrow()
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

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

    /// Resolves `length`, an index, or an index followed by keys into a
    /// plain element.
    pub(crate) fn get_path(&self, segments: &[String]) -> Option<Property> {
        let Some((head, rest)) = segments.split_first() else {
            return Some(Property::Array(self.clone()));
        };
        if head == "length" && rest.is_empty() {
            return Some(Property::Value(Value::from(self.len() as f64)));
        }
        let index: usize = head.parse().ok()?;
        let mut value = self.get(index)?;
        for key in rest {
            value = match &value {
                Value::Object(map) => map.get(key)?.clone(),
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?.clone(),
                _ => return None,
            };
        }
        Some(Property::Value(value))
    }
}

fn resolve_index(index: isize, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs())
    } else {
        index.unsigned_abs().min(len)
    }
}

impl fmt::Display for ArrayProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join(","))
    }
}

impl fmt::Debug for ArrayProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}

impl Extract for ArrayProxy {
    fn logical_value(&self, options: SerializeOptions) -> Option<Value> {
        self.to_vec().as_slice().logical_value(options)
    }

    fn display_value(&self, options: SerializeOptions) -> Option<serde_json::Value> {
        self.to_vec().as_slice().display_value(options)
    }
}
