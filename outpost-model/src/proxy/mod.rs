//! Proxy types.
//!
//! [`ObjectProxy`] is the general nested-document proxy; [`ArrayProxy`] and
//! [`DateProxy`] wrap the two structural leaves. A field read returns a
//! [`Property`], which is either a plain value or one of the three proxies.

mod array;
mod date;
mod object;

pub use array::ArrayProxy;
pub use date::{DateField, DateProxy};
pub use object::ObjectProxy;

use outpost_types::Value;

use crate::events::{ChangeEvent, Subscription};
use crate::serialize::{Extract, SerializeOptions};

/// What a field read resolves to.
#[derive(Debug, Clone)]
pub enum Property {
    Value(Value),
    Object(ObjectProxy),
    Array(ArrayProxy),
    Date(DateProxy),
}

impl Property {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Property::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectProxy> {
        match self {
            Property::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayProxy> {
        match self {
            Property::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateProxy> {
        match self {
            Property::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        !matches!(self, Property::Value(_))
    }

    /// The logical value with default options.
    pub fn to_value(&self) -> Value {
        self.logical_value(SerializeOptions::default())
            .unwrap_or_default()
    }

    /// Registers a listener on the wrapped proxy. Plain values never emit,
    /// so there is nothing to subscribe to.
    pub fn on_change<F>(&self, listener: F) -> Option<Subscription>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        match self {
            Property::Value(_) => None,
            Property::Object(o) => Some(o.on_change(listener)),
            Property::Array(a) => Some(a.on_change(listener)),
            Property::Date(d) => Some(d.on_change(listener)),
        }
    }
}

/// Plain values compare structurally; proxies compare by identity.
impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Property::Value(a), Property::Value(b)) => a == b,
            (Property::Object(a), Property::Object(b)) => a.ptr_eq(b),
            (Property::Array(a), Property::Array(b)) => a.ptr_eq(b),
            (Property::Date(a), Property::Date(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Property::Value(value)
    }
}

impl From<ObjectProxy> for Property {
    fn from(proxy: ObjectProxy) -> Self {
        Property::Object(proxy)
    }
}

impl From<ArrayProxy> for Property {
    fn from(proxy: ArrayProxy) -> Self {
        Property::Array(proxy)
    }
}

impl From<DateProxy> for Property {
    fn from(proxy: DateProxy) -> Self {
        Property::Date(proxy)
    }
}

impl Extract for Property {
    fn logical_value(&self, options: SerializeOptions) -> Option<Value> {
        match self {
            Property::Value(v) => v.logical_value(options),
            Property::Object(o) => o.logical_value(options),
            Property::Array(a) => a.logical_value(options),
            Property::Date(d) => d.logical_value(options),
        }
    }

    fn display_value(&self, options: SerializeOptions) -> Option<serde_json::Value> {
        match self {
            Property::Value(v) => v.display_value(options),
            Property::Object(o) => o.display_value(options),
            Property::Array(a) => a.display_value(options),
            Property::Date(d) => d.display_value(options),
        }
    }
}
