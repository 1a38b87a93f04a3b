use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::Error;

/// A type-erased value produced by a provider.
///
/// Values are cheap to clone: clones share the same allocation, so
/// [`Value::ptr_eq`] tells whether two values are the same instance.
/// A value may also be null, which is what an optional parameter declared
/// with a null default resolves to.
#[derive(Clone)]
pub struct Value {
    type_name: &'static str,
    inner: Option<Arc<dyn Any + Send + Sync>>,
}

impl Value {
    pub fn new<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T>(value: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            type_name: type_name::<T>(),
            inner: Some(value as Arc<dyn Any + Send + Sync>),
        }
    }

    pub fn null() -> Self {
        Self {
            type_name: "null",
            inner: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    pub fn is<T>(&self) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.inner.as_ref().is_some_and(|v| v.is::<T>())
    }

    /// Name of the Rust type held by this value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns a shared handle to the held value.
    pub fn downcast<T>(&self) -> Result<Arc<T>, Error>
    where
        T: Send + Sync + 'static,
    {
        let inner = self.inner.clone().ok_or(Error::Downcast {
            required: type_name::<T>(),
            actual: self.type_name,
        })?;
        Arc::downcast::<T>(inner).map_err(|_| Error::Downcast {
            required: type_name::<T>(),
            actual: self.type_name,
        })
    }

    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.inner.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns true if both values are null or share one allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.inner, &other.inner) {
            (Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Some(_) => f.debug_tuple("Value").field(&self.type_name).finish(),
            None => f.write_str("Value(null)"),
        }
    }
}

/// Positional cursor over the resolved arguments of an [`Executable`](crate::Executable).
pub struct Args {
    callable: String,
    values: std::vec::IntoIter<Value>,
}

impl Args {
    pub(crate) fn new(callable: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            callable: callable.into(),
            values: values.into_iter(),
        }
    }

    /// Number of values not consumed yet.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// Takes the next raw value, or null when the arguments are exhausted.
    pub fn next_value(&mut self) -> Value {
        self.values.next().unwrap_or_else(Value::null)
    }

    /// Takes the next value as a shared handle of `T`.
    pub fn take<T>(&mut self) -> Result<Arc<T>, Error>
    where
        T: Send + Sync + 'static,
    {
        match self.values.next() {
            Some(value) => value.downcast(),
            None => Err(self.missing::<T>()),
        }
    }

    /// Takes the next value, mapping null to `None`.
    pub fn take_optional<T>(&mut self) -> Result<Option<Arc<T>>, Error>
    where
        T: Send + Sync + 'static,
    {
        match self.values.next() {
            Some(value) if !value.is_null() => value.downcast().map(Some),
            _ => Ok(None),
        }
    }

    /// Takes the next value and clones it out of the shared handle.
    pub fn take_cloned<T>(&mut self) -> Result<T, Error>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.take::<T>().map(|v| T::clone(&v))
    }

    /// Takes every remaining value, for variadic parameters.
    pub fn rest<T>(&mut self) -> Result<Vec<Arc<T>>, Error>
    where
        T: Send + Sync + 'static,
    {
        self.values.by_ref().map(|v| v.downcast()).collect()
    }

    fn missing<T>(&self) -> Error {
        Error::ConstructionFailure {
            callable: self.callable.clone(),
            source: format!("Missing argument of type {}", type_name::<T>()).into(),
        }
    }
}
