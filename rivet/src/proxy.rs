use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::{Error, TypeName, Value};

/// Produces the real value behind a placeholder. Invoked at most once.
pub type Supplier = Box<dyn FnOnce() -> Result<Value, Error> + Send>;

/// Creates placeholders whose construction is deferred until first use.
pub trait LazyProxyFactory: Send + Sync {
    fn create_deferred(&self, ty: &TypeName, supplier: Supplier) -> Result<Value, Error>;
}

/// Default factory, producing [`Deferred`] placeholders.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeferredFactory;

impl LazyProxyFactory for DeferredFactory {
    fn create_deferred(&self, ty: &TypeName, supplier: Supplier) -> Result<Value, Error> {
        Ok(Value::new(Deferred::new(ty.clone(), supplier)))
    }
}

/// Placeholder for a value that is constructed on first access.
///
/// # Examples
///
/// ```rust
/// use rivet::{Deferred, TypeName, Value};
///
/// let deferred = Deferred::new(
///     TypeName::of::<u32>(),
///     Box::new(|| Ok::<_, rivet::Error>(Value::new(7u32))),
/// );
/// assert!(!deferred.is_initialized());
/// assert_eq!(*deferred.downcast::<u32>().unwrap(), 7);
/// assert!(deferred.is_initialized());
/// ```
pub struct Deferred {
    ty: TypeName,
    supplier: Mutex<Option<Supplier>>,
    result: OnceLock<Result<Value, Error>>,
}

impl Deferred {
    pub fn new(ty: TypeName, supplier: Supplier) -> Self {
        Self {
            ty,
            supplier: Mutex::new(Some(supplier)),
            result: OnceLock::new(),
        }
    }

    /// Type of the deferred value.
    pub fn type_name(&self) -> &TypeName {
        &self.ty
    }

    /// Returns the deferred value, constructing it on first call.
    ///
    /// A failed construction is remembered and returned on every later call.
    pub fn get(&self) -> Result<&Value, &Error> {
        self.result
            .get_or_init(|| {
                let supplier = self
                    .supplier
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                match supplier {
                    Some(supplier) => {
                        tracing::trace!("Constructing deferred {}", self.ty);
                        supplier()
                    }
                    None => Err(Error::ConstructionFailure {
                        callable: format!("deferred {}", self.ty),
                        source: "supplier already consumed".into(),
                    }),
                }
            })
            .as_ref()
    }

    /// Returns the deferred value as `T`, constructing it on first call.
    pub fn downcast<T>(&self) -> Result<Arc<T>, Error>
    where
        T: Send + Sync + 'static,
    {
        match self.get() {
            Ok(value) => value.downcast(),
            Err(err) => Err(Error::ConstructionFailure {
                callable: format!("deferred {}", self.ty),
                source: err.to_string().into(),
            }),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.result.get().is_some()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("type", &self.ty)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
