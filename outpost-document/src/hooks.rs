use crate::{Document, DocumentResult};

/// Optional lifecycle callbacks for a model.
///
/// Every method has a no-op default; implement only what the model needs.
/// Writes made from `on_init` and `before_save` go through the proxy, so
/// they are tracked as modifications like any other write.
pub trait DocumentHooks {
    /// Called once when a new document is created (not when one is loaded).
    fn on_init(&self, document: &Document) -> DocumentResult<()> {
        let _ = document;
        Ok(())
    }

    /// Validates the document before it is persisted.
    /// Return `Err(message)` to reject the save.
    fn validate(&self, document: &Document) -> Result<(), String> {
        let _ = document;
        Ok(())
    }

    /// Called after validation, before anything is written.
    fn before_save(&self, document: &Document) -> DocumentResult<()> {
        let _ = document;
        Ok(())
    }

    /// Called after a successful insert or update.
    fn after_save(&self, document: &Document) {
        let _ = document;
    }
}

/// The hooks of a model that declares none.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl DocumentHooks for NoHooks {}
