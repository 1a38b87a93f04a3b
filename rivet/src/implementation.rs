use std::collections::HashMap;
use std::sync::Arc;

use crate::{Error, Identifier, Introspector, TypeName, TypeRegistry};

/// Maps a declared type to the identifier of the provider that satisfies it.
pub trait ImplementationResolver: Send + Sync {
    /// Returns `Ok(None)` when nothing is registered for `ty`.
    fn resolve(&self, ty: &TypeName) -> Result<Option<Identifier>, Error>;
}

impl<T> ImplementationResolver for Arc<T>
where
    T: ImplementationResolver + ?Sized,
{
    fn resolve(&self, ty: &TypeName) -> Result<Option<Identifier>, Error> {
        (**self).resolve(ty)
    }
}

/// Resolver that never finds an implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullImplementationResolver;

impl ImplementationResolver for NullImplementationResolver {
    fn resolve(&self, _ty: &TypeName) -> Result<Option<Identifier>, Error> {
        Ok(None)
    }
}

/// Registers every provider under its result type and all of its ancestors.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rivet::{AutomaticImplementationResolver, Error, ImplementationResolver, TypeName, TypeRegistry};
///
/// let registry = TypeRegistry::new().extends("app::Postgres", "app::Database");
/// let mut resolver = AutomaticImplementationResolver::new(Arc::new(registry));
/// resolver.register("postgres", &TypeName::new("app::Postgres"));
///
/// let id = resolver.resolve(&TypeName::new("app::Database")).unwrap();
/// assert_eq!(id.unwrap().as_str(), "postgres");
///
/// resolver.register("mysql", &TypeName::new("app::Database"));
/// let err = resolver.resolve(&TypeName::new("app::Database")).unwrap_err();
/// assert!(matches!(err, Error::AmbiguousImplementation { .. }));
/// ```
#[derive(Clone)]
pub struct AutomaticImplementationResolver {
    introspector: Arc<dyn Introspector>,
    types: HashMap<TypeName, Vec<Identifier>>,
}

impl AutomaticImplementationResolver {
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self {
            introspector,
            types: HashMap::new(),
        }
    }

    pub fn introspector(&self) -> &Arc<dyn Introspector> {
        &self.introspector
    }

    /// Registers `id` as an implementation of `ty` and of every ancestor of `ty`.
    pub fn register(&mut self, id: impl Into<Identifier>, ty: &TypeName) -> &mut Self {
        let id = id.into();
        let ancestors = self.introspector.ancestors(ty);
        for ty in std::iter::once(ty.clone()).chain(ancestors) {
            let candidates = self.types.entry(ty).or_default();
            if !candidates.contains(&id) {
                candidates.push(id.clone());
            }
        }
        self
    }

    /// Identifiers registered under `ty`, in registration order.
    pub fn candidates(&self, ty: &TypeName) -> &[Identifier] {
        self.types.get(ty).map(Vec::as_slice).unwrap_or_default()
    }
}

impl Default for AutomaticImplementationResolver {
    fn default() -> Self {
        Self::new(Arc::new(TypeRegistry::new()))
    }
}

impl ImplementationResolver for AutomaticImplementationResolver {
    fn resolve(&self, ty: &TypeName) -> Result<Option<Identifier>, Error> {
        match self.candidates(ty) {
            [] => Ok(None),
            [id] => Ok(Some(id.clone())),
            candidates => Err(Error::AmbiguousImplementation {
                type_name: ty.clone(),
                candidates: candidates.to_vec(),
            }),
        }
    }
}

/// Explicit type to identifier overrides, consulted before any fallback.
#[derive(Clone, Default)]
pub struct PrimaryImplementationResolver {
    primaries: HashMap<TypeName, Identifier>,
    fallback: Option<Arc<dyn ImplementationResolver>>,
}

impl PrimaryImplementationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `id` as the implementation of `ty`, replacing any earlier override.
    pub fn with(mut self, ty: impl Into<TypeName>, id: impl Into<Identifier>) -> Self {
        self.insert(ty, id);
        self
    }

    pub fn insert(&mut self, ty: impl Into<TypeName>, id: impl Into<Identifier>) -> &mut Self {
        self.primaries.insert(ty.into(), id.into());
        self
    }

    /// Consults `fallback` for types without an override.
    pub fn with_fallback<R>(mut self, fallback: R) -> Self
    where
        R: ImplementationResolver + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn primary(&self, ty: &TypeName) -> Option<&Identifier> {
        self.primaries.get(ty)
    }

    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty()
    }
}

impl ImplementationResolver for PrimaryImplementationResolver {
    fn resolve(&self, ty: &TypeName) -> Result<Option<Identifier>, Error> {
        if let Some(id) = self.primaries.get(ty) {
            return Ok(Some(id.clone()));
        }
        match &self.fallback {
            Some(fallback) => fallback.resolve(ty),
            None => Ok(None),
        }
    }
}
