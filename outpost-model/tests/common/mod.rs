//! Shared test helpers for proxy tests.

#![allow(dead_code)]

use outpost_model::{ChangeEvent, Definition, FieldDef, ObjectProxy, Schema, Subscription};
use outpost_types::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A schema touching every field kind:
///
/// - `str`, `num`, `bool`, `when`, `any`
/// - `arr` (untyped), `tags` (strings)
/// - `obj.deep.blah` nested objects
/// - `virt`, a virtual over `str`: reads `str + ".virtual"`, writes the
///   part before the first `.` back into `str`
pub fn sample_definition() -> Definition {
    Definition::new("Sample")
        .field("str", FieldDef::string())
        .field("num", FieldDef::number())
        .field("bool", FieldDef::boolean())
        .field("when", FieldDef::date())
        .field("any", FieldDef::any())
        .field("arr", FieldDef::array())
        .field("tags", FieldDef::array_of(FieldDef::string()))
        .field(
            "obj",
            FieldDef::object().field(
                "deep",
                FieldDef::object()
                    .field("blah", FieldDef::string())
                    .field("count", FieldDef::number()),
            ),
        )
        .field(
            "virt",
            FieldDef::virtual_field(
                |proxy: &ObjectProxy| {
                    proxy
                        .get_str("str")
                        .map(|s| Value::from(format!("{s}.virtual")))
                },
                |proxy: &ObjectProxy, value: Value| {
                    let text = value.to_string();
                    let head = text.split('.').next().unwrap_or_default().to_owned();
                    proxy.set("str", head)
                },
            ),
        )
}

pub fn sample_schema() -> Rc<Schema> {
    sample_definition().compile().expect("sample schema compiles")
}

pub fn sample_proxy(raw: serde_json::Value) -> ObjectProxy {
    ObjectProxy::new(&sample_schema(), Value::from(raw)).expect("sample proxy builds")
}

/// Collects every event a proxy emits.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<ChangeEvent>>>,
}

impl Recorder {
    pub fn attach(proxy: &ObjectProxy) -> (Self, Subscription) {
        let recorder = Self::default();
        let sink = Rc::clone(&recorder.events);
        let sub = proxy.on_change(move |event| sink.borrow_mut().push(event.clone()));
        (recorder, sub)
    }

    pub fn sink(&self) -> impl Fn(&ChangeEvent) + 'static {
        let sink = Rc::clone(&self.events);
        move |event| sink.borrow_mut().push(event.clone())
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.borrow().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.events.borrow().iter().map(|e| e.path.clone()).collect()
    }

    pub fn current_paths(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|e| e.current_path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
