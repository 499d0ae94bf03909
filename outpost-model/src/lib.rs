//! Schema-driven proxy tree with change tracking.
//!
//! A [`Definition`] describes the shape of a nested document. Compiling it
//! yields a shared [`Schema`]; an [`ObjectProxy`] built from that schema
//! wraps one raw [`Value`](outpost_types::Value) and exposes it through
//! path-based reads and type-casting writes. Every effective write emits a
//! [`ChangeEvent`] that bubbles to the root with the full dotted path.
//!
//! ```ignore
//! let schema = Definition::new("Post")
//!     .field("title", FieldDef::string())
//!     .field("meta", FieldDef::object().field("views", FieldDef::number()))
//!     .compile()?;
//! let post = ObjectProxy::new(&schema, Value::Null)?;
//! let _sub = post.on_change(|event| println!("{} changed", event.path));
//! post.set("meta.views", 10)?;
//! ```

pub mod cast;
pub mod error;
pub mod events;
pub mod path;
pub mod proxy;
pub mod schema;
pub mod serialize;

pub use error::{ModelError, ModelResult, SchemaError};
pub use events::{ChangeEvent, EmitPolicy, Subscription};
pub use path::FieldPath;
pub use proxy::{ArrayProxy, DateField, DateProxy, ObjectProxy, Property};
pub use schema::{Definition, FieldDef, FieldKind, FieldSchema, FieldType, Schema};
pub use serialize::{Extract, SerializeOptions};
