//! Change events and listener bookkeeping.
//!
//! Every proxy owns a [`ChangeEmitter`]. Listeners are registered with
//! `on_change` and live exactly as long as the returned [`Subscription`].
//! A parent proxy relays its children's events by holding such a
//! subscription next to the child in its backing store, so replacing the
//! child drops the relay with it.

use outpost_types::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use tracing::trace;

use crate::proxy::Property;

/// Whether a write announces itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmitPolicy {
    /// Emit change events (the default).
    #[default]
    Propagate,
    /// Apply the write without emitting anything.
    Suppress,
}

impl EmitPolicy {
    pub fn propagates(self) -> bool {
        self == EmitPolicy::Propagate
    }
}

/// A single change notification.
///
/// `current_path` is the field owned by the proxy the listener is attached
/// to; `path` is the full dotted path from that proxy down to the mutated
/// leaf. Array mutations start out as bare events (empty paths, no values)
/// and pick up the field name as they are relayed.
#[derive(Debug, Clone, Default)]
pub struct ChangeEvent {
    pub path: String,
    pub current_path: String,
    pub new_value: Option<Property>,
    pub old_value: Option<Value>,
}

impl ChangeEvent {
    /// An event for a field owned directly by the emitter.
    pub fn field(name: &str, new_value: Option<Property>, old_value: Option<Value>) -> Self {
        Self {
            path: name.to_owned(),
            current_path: name.to_owned(),
            new_value,
            old_value,
        }
    }

    /// An event without payload, used by sequence mutations.
    pub fn bare() -> Self {
        Self::default()
    }

    pub fn is_bare(&self) -> bool {
        self.path.is_empty()
    }

    /// The event as seen one level up, where `field` holds the emitter.
    #[must_use]
    pub fn relayed(&self, field: &str) -> Self {
        let path = if self.path.is_empty() {
            field.to_owned()
        } else {
            format!("{field}.{}", self.path)
        };
        Self {
            path,
            current_path: field.to_owned(),
            new_value: self.new_value.clone(),
            old_value: self.old_value.clone(),
        }
    }

    /// The new value as a plain value, when it is one.
    pub fn new_scalar(&self) -> Option<&Value> {
        match &self.new_value {
            Some(Property::Value(v)) => Some(v),
            _ => None,
        }
    }
}

pub(crate) type Listener = Rc<dyn Fn(&ChangeEvent)>;

#[derive(Default)]
pub(crate) struct ChangeEmitter {
    next_id: Cell<u64>,
    listeners: RefCell<BTreeMap<u64, Listener>>,
}

impl ChangeEmitter {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn subscribe(self: &Rc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id.saturating_add(1));
        self.listeners.borrow_mut().insert(id, listener);
        Subscription {
            emitter: Rc::downgrade(self),
            id,
            active: true,
        }
    }

    /// Calls every listener registered at the time of the call. The listener
    /// table is not borrowed while listeners run, so they may subscribe,
    /// unsubscribe or write to any proxy.
    pub(crate) fn emit(&self, event: &ChangeEvent) {
        let snapshot: Vec<Listener> = self.listeners.borrow().values().cloned().collect();
        trace!(path = %event.path, listeners = snapshot.len(), "Emitting change");
        for listener in snapshot {
            listener(event);
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn remove(&self, id: u64) -> bool {
        self.listeners.borrow_mut().remove(&id).is_some()
    }
}

/// Owned handle to a registered listener. Dropping it unregisters the
/// listener; [`Subscription::detach`] keeps the listener for the lifetime of
/// the proxy instead.
#[must_use = "dropping a Subscription immediately removes the listener"]
pub struct Subscription {
    emitter: Weak<ChangeEmitter>,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Removes the listener now. Returns false if the proxy is already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Leaves the listener registered until the proxy itself is dropped.
    pub fn detach(mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active && self.emitter.strong_count() > 0
    }

    fn release(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.emitter
            .upgrade()
            .is_some_and(|emitter| emitter.remove(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
