use crate::{Application, Context, Error, Value};

/// Minimal string-keyed container protocol.
///
/// Lets code that only knows identifiers look up values without depending
/// on [`Context`] or [`Application`] directly.
pub trait Container {
    fn has(&self, id: &str) -> bool;

    /// Fails with [`Error::NotFound`] for unknown identifiers.
    fn get(&self, id: &str) -> Result<Value, Error>;
}

impl Container for Context {
    fn has(&self, id: &str) -> bool {
        Context::has(self, id)
    }

    fn get(&self, id: &str) -> Result<Value, Error> {
        Context::get(self, id)
    }
}

impl Container for Application {
    fn has(&self, id: &str) -> bool {
        self.context().has(id)
    }

    fn get(&self, id: &str) -> Result<Value, Error> {
        Application::get(self, id)
    }
}
