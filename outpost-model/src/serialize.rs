//! Logical and display extraction.
//!
//! Two independent recursive passes over anything that can sit in a proxy
//! tree. The logical pass keeps dates and document ids as they are; the
//! display pass renders them as strings for client consumption. Both drop
//! absent results, both inside sequences and inside objects.

use outpost_types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options shared by both extraction passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    /// Whether virtual fields are computed and included.
    pub include_virtuals: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            include_virtuals: true,
        }
    }
}

impl SerializeOptions {
    /// Options for extracting the stored shape of a document.
    pub fn without_virtuals() -> Self {
        Self {
            include_virtuals: false,
        }
    }
}

/// Recursive extraction hook. Proxies implement it to control how their
/// contents are rendered; plain values implement it as a structural copy.
pub trait Extract {
    /// Logical value, or `None` when the value is absent.
    fn logical_value(&self, options: SerializeOptions) -> Option<Value>;

    /// Display value, or `None` when the value is absent.
    fn display_value(&self, options: SerializeOptions) -> Option<serde_json::Value>;
}

impl Extract for Value {
    fn logical_value(&self, options: SerializeOptions) -> Option<Value> {
        match self {
            Value::Array(items) => items.as_slice().logical_value(options),
            Value::Object(map) => map.logical_value(options),
            _ => Some(self.clone()),
        }
    }

    fn display_value(&self, options: SerializeOptions) -> Option<serde_json::Value> {
        match self {
            Value::Array(items) => items.as_slice().display_value(options),
            Value::Object(map) => map.display_value(options),
            _ => Some(self.to_json()),
        }
    }
}

impl<T: Extract> Extract for Option<T> {
    fn logical_value(&self, options: SerializeOptions) -> Option<Value> {
        self.as_ref().and_then(|v| v.logical_value(options))
    }

    fn display_value(&self, options: SerializeOptions) -> Option<serde_json::Value> {
        self.as_ref().and_then(|v| v.display_value(options))
    }
}

impl<T: Extract> Extract for [T] {
    fn logical_value(&self, options: SerializeOptions) -> Option<Value> {
        Some(Value::Array(
            self.iter().filter_map(|item| item.logical_value(options)).collect(),
        ))
    }

    fn display_value(&self, options: SerializeOptions) -> Option<serde_json::Value> {
        Some(serde_json::Value::Array(
            self.iter().filter_map(|item| item.display_value(options)).collect(),
        ))
    }
}

impl<T: Extract> Extract for BTreeMap<String, T> {
    fn logical_value(&self, options: SerializeOptions) -> Option<Value> {
        Some(Value::Object(
            self.iter()
                .filter_map(|(key, v)| v.logical_value(options).map(|v| (key.clone(), v)))
                .collect(),
        ))
    }

    fn display_value(&self, options: SerializeOptions) -> Option<serde_json::Value> {
        Some(serde_json::Value::Object(
            self.iter()
                .filter_map(|(key, v)| v.display_value(options).map(|v| (key.clone(), v)))
                .collect(),
        ))
    }
}
