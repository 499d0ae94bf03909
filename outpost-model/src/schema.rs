//! Field definitions and the schema compiler.
//!
//! A [`Definition`] is what users author: a name plus a map of
//! [`FieldDef`]s, buildable in code or deserialized from JSON. It is never
//! mutated. [`Definition::compile`] classifies every field once and produces
//! a separate, immutable [`Schema`] that all proxies of that shape share.

use outpost_types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

use crate::error::{ModelError, ModelResult, SchemaError};
use crate::proxy::{DateField, ObjectProxy};

/// Computes a virtual field's value from the owning proxy.
pub type VirtualGetter = Rc<dyn Fn(&ObjectProxy) -> Option<Value>>;

/// Receives writes to a virtual field. Any concrete field writes it performs
/// go through the proxy and emit their own change events.
pub type VirtualSetter = Rc<dyn Fn(&ObjectProxy, Value) -> ModelResult<()>>;

/// Getter/setter pair backing a virtual field.
#[derive(Clone, Default)]
pub struct VirtualAccessors {
    get: Option<VirtualGetter>,
    set: Option<VirtualSetter>,
}

impl VirtualAccessors {
    pub(crate) fn call_get(&self, proxy: &ObjectProxy) -> Option<Value> {
        self.get.as_ref().and_then(|get| get(proxy))
    }

    pub(crate) fn call_set(&self, field: &str, proxy: &ObjectProxy, value: Value) -> ModelResult<()> {
        match &self.set {
            Some(set) => set(proxy, value),
            None => Err(ModelError::ReadOnly(field.to_owned())),
        }
    }
}

impl fmt::Debug for VirtualAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualAccessors")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

/// The authored definition of a single field.
///
/// Anything the core does not interpret (validation hints such as
/// `required`, `min`, `email`) lands in `hints` untouched so an external
/// validator can pick it up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDef {
    /// Raw type token. Absent or `*` means `any`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_token: Option<String>,
    /// Child fields of an `object` field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FieldDef>,
    /// Element definition of an `array` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldDef>>,
    /// Default applied by the document layer when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Opaque validator hints.
    #[serde(flatten)]
    pub hints: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    accessors: Option<VirtualAccessors>,
}

impl FieldDef {
    /// A field with an arbitrary type token; unknown tokens are rejected at
    /// compile time.
    pub fn of_type(token: &str) -> Self {
        Self {
            type_token: Some(token.to_owned()),
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::of_type("string")
    }

    pub fn number() -> Self {
        Self::of_type("number")
    }

    pub fn boolean() -> Self {
        Self::of_type("boolean")
    }

    pub fn date() -> Self {
        Self::of_type("date")
    }

    pub fn identifier() -> Self {
        Self::of_type("identifier")
    }

    /// A field accepting any value unchanged.
    pub fn any() -> Self {
        Self::default()
    }

    /// An array without an element definition.
    pub fn array() -> Self {
        Self::of_type("array")
    }

    /// An array whose elements are cast to `items`.
    pub fn array_of(items: FieldDef) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of_type("array")
        }
    }

    /// An empty nested object; add children with [`FieldDef::field`].
    pub fn object() -> Self {
        Self::of_type("object")
    }

    /// A computed field backed by a getter and a setter.
    pub fn virtual_field<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&ObjectProxy) -> Option<Value> + 'static,
        S: Fn(&ObjectProxy, Value) -> ModelResult<()> + 'static,
    {
        Self {
            accessors: Some(VirtualAccessors {
                get: Some(Rc::new(get)),
                set: Some(Rc::new(set)),
            }),
            ..Self::of_type("virtual")
        }
    }

    /// A read-only computed field.
    pub fn virtual_getter<G>(get: G) -> Self
    where
        G: Fn(&ObjectProxy) -> Option<Value> + 'static,
    {
        Self {
            accessors: Some(VirtualAccessors {
                get: Some(Rc::new(get)),
                set: None,
            }),
            ..Self::of_type("virtual")
        }
    }

    /// Adds a child field to an object definition.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.properties.insert(name.into(), def);
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_hint(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.hints.insert(key.into(), value);
        self
    }

    /// Attaches accessors to a field parsed from JSON as `"type": "virtual"`.
    #[must_use]
    pub fn with_accessors<G, S>(mut self, get: G, set: S) -> Self
    where
        G: Fn(&ObjectProxy) -> Option<Value> + 'static,
        S: Fn(&ObjectProxy, Value) -> ModelResult<()> + 'static,
    {
        self.accessors = Some(VirtualAccessors {
            get: Some(Rc::new(get)),
            set: Some(Rc::new(set)),
        });
        self
    }
}

/// A named set of top-level fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, FieldDef>,
}

impl Definition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Parses a definition from JSON. Virtual fields parse without accessors;
    /// attach them with [`Definition::field_mut`] before compiling.
    pub fn from_json(text: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.properties.insert(name.into(), def);
        self
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldDef> {
        self.properties.get_mut(name)
    }

    /// Returns a copy of this definition with `other`'s fields laid over it.
    /// Fields present in both are replaced wholesale by `other`'s version.
    #[must_use]
    pub fn extend(&self, other: &Definition) -> Definition {
        let mut merged = self.clone();
        if !other.name.is_empty() {
            merged.name.clone_from(&other.name);
        }
        for (name, def) in &other.properties {
            merged.properties.insert(name.clone(), def.clone());
        }
        merged
    }

    /// Compiles the definition into a shareable schema.
    pub fn compile(&self) -> Result<Rc<Schema>, SchemaError> {
        let schema = compile_fields(&self.name, "", &self.properties)?;
        debug!(schema = %self.name, fields = schema.fields.len(), "Schema compiled");
        Ok(Rc::new(schema))
    }
}

/// The closed set of field type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    Identifier,
    Any,
    Virtual,
}

impl FieldType {
    /// Classifies a raw type token (trimmed, case-insensitive).
    pub fn parse(token: Option<&str>) -> Option<Self> {
        let token = match token {
            None => return Some(FieldType::Any),
            Some(t) => t.trim().to_ascii_lowercase(),
        };
        let ty = match token.as_str() {
            "string" => FieldType::String,
            "number" => FieldType::Number,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "array" => FieldType::Array,
            "object" => FieldType::Object,
            "identifier" | "objectid" => FieldType::Identifier,
            "any" | "*" | "" => FieldType::Any,
            "virtual" => FieldType::Virtual,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Identifier => "identifier",
            FieldType::Any => "any",
            FieldType::Virtual => "virtual",
        }
    }
}

/// A compiled field kind. Structural kinds carry what is needed to build
/// their child proxy.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    Array(Option<Box<FieldKind>>),
    Object(Rc<Schema>),
    Identifier,
    Any,
    Virtual(VirtualAccessors),
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::String => FieldType::String,
            FieldKind::Number => FieldType::Number,
            FieldKind::Boolean => FieldType::Boolean,
            FieldKind::Date => FieldType::Date,
            FieldKind::Array(_) => FieldType::Array,
            FieldKind::Object(_) => FieldType::Object,
            FieldKind::Identifier => FieldType::Identifier,
            FieldKind::Any => FieldType::Any,
            FieldKind::Virtual(_) => FieldType::Virtual,
        }
    }

    /// Object, array and date fields are backed by child proxies.
    pub fn is_structural(&self) -> bool {
        matches!(self, FieldKind::Object(_) | FieldKind::Array(_) | FieldKind::Date)
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, FieldKind::Virtual(_))
    }
}

/// One compiled field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub kind: FieldKind,
    pub default: Option<Value>,
}

/// Immutable compiled schema, indexed by field name.
#[derive(Debug)]
pub struct Schema {
    name: String,
    fields: BTreeMap<String, FieldSchema>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `segments` names something reachable through this schema.
    /// Purely structural: no instance data is consulted.
    pub fn has_path(&self, segments: &[String]) -> bool {
        let Some((head, rest)) = segments.split_first() else {
            return false;
        };
        let Some(field) = self.fields.get(head) else {
            return false;
        };
        match (rest, &field.kind) {
            ([], _) => true,
            (_, FieldKind::Object(child)) => child.has_path(rest),
            ([component], FieldKind::Date) => DateField::from_name(component).is_some(),
            ([member], FieldKind::Array(_)) => member == "length",
            _ => false,
        }
    }
}

fn compile_fields(
    name: &str,
    prefix: &str,
    properties: &BTreeMap<String, FieldDef>,
) -> Result<Schema, SchemaError> {
    let mut fields = BTreeMap::new();
    for (field_name, def) in properties {
        let qualified = if prefix.is_empty() {
            field_name.clone()
        } else {
            format!("{prefix}.{field_name}")
        };
        let kind = compile_kind(&qualified, def)?;
        fields.insert(
            field_name.clone(),
            FieldSchema {
                kind,
                default: def.default.clone(),
            },
        );
    }
    Ok(Schema {
        name: name.to_owned(),
        fields,
    })
}

fn compile_kind(qualified: &str, def: &FieldDef) -> Result<FieldKind, SchemaError> {
    let ty = FieldType::parse(def.type_token.as_deref()).ok_or_else(|| SchemaError::UnknownType {
        field: qualified.to_owned(),
        token: def.type_token.clone().unwrap_or_default(),
    })?;
    let kind = match ty {
        FieldType::String => FieldKind::String,
        FieldType::Number => FieldKind::Number,
        FieldType::Boolean => FieldKind::Boolean,
        FieldType::Date => FieldKind::Date,
        FieldType::Identifier => FieldKind::Identifier,
        FieldType::Any => FieldKind::Any,
        FieldType::Object => {
            let child = compile_fields(&format!("ObjectProxy:{qualified}"), qualified, &def.properties)?;
            FieldKind::Object(Rc::new(child))
        }
        FieldType::Array => {
            let items = match &def.items {
                None => None,
                Some(items) => {
                    let item_kind = compile_kind(&format!("{qualified}.items"), items)?;
                    if item_kind.is_virtual() {
                        return Err(SchemaError::VirtualItems(qualified.to_owned()));
                    }
                    Some(Box::new(item_kind))
                }
            };
            FieldKind::Array(items)
        }
        FieldType::Virtual => match &def.accessors {
            Some(accessors) if accessors.get.is_some() => FieldKind::Virtual(accessors.clone()),
            _ => return Err(SchemaError::MissingGetter(qualified.to_owned())),
        },
    };
    Ok(kind)
}
