use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    AutomaticImplementationResolver, Error, Identifier, ImplementationResolver, Introspector,
    NotFound, PrimaryImplementationResolver, Provider, TypeName, TypeRegistry, Value,
};

/// Immutable registry of providers, addressable by identifier and by type.
///
/// A context is cheap to clone. Registration through [`Context::with`] is
/// pure and returns a new context, so configurations can be branched. Once a
/// context has served a lookup it refuses further registrations.
///
/// # Examples
///
/// ```rust
/// use rivet::{Context, Provider};
///
/// let context = Context::new()
///     .with("greeting", Provider::value_of("Hello".to_string()))
///     .unwrap();
///
/// let greeting = context.get_type(&rivet::TypeName::of::<String>()).unwrap();
/// assert_eq!(*greeting.downcast::<String>().unwrap(), "Hello");
/// assert!(context.has("greeting"));
/// assert!(!context.has("missing"));
/// ```
#[derive(Clone)]
pub struct Context(Arc<ContextInner>);

struct ContextInner {
    providers: Vec<(Identifier, Provider)>,
    index: HashMap<Identifier, usize>,
    primary: PrimaryImplementationResolver,
    automatic: AutomaticImplementationResolver,
    resolver: Option<Arc<dyn ImplementationResolver>>,
    sealed: AtomicBool,
}

impl Clone for ContextInner {
    fn clone(&self) -> Self {
        Self {
            providers: self.providers.clone(),
            index: self.index.clone(),
            primary: self.primary.clone(),
            automatic: self.automatic.clone(),
            resolver: self.resolver.clone(),
            sealed: AtomicBool::new(false),
        }
    }
}

impl Context {
    /// Creates an empty context without declared type hierarchy.
    pub fn new() -> Self {
        Self::with_introspector(Arc::new(TypeRegistry::new()))
    }

    /// Creates an empty context that autowires through `introspector`.
    pub fn with_introspector(introspector: Arc<dyn Introspector>) -> Self {
        Self(Arc::new(ContextInner {
            providers: Vec::new(),
            index: HashMap::new(),
            primary: PrimaryImplementationResolver::new(),
            automatic: AutomaticImplementationResolver::new(introspector),
            resolver: None,
            sealed: AtomicBool::new(false),
        }))
    }

    /// Returns a new context with `provider` registered under `id`.
    ///
    /// When the provider declares a result type, `id` is also registered as
    /// an implementation of that type and its ancestors.
    pub fn with(&self, id: impl Into<Identifier>, provider: Provider) -> Result<Context, Error> {
        let id = id.into();
        if self.is_sealed() {
            return Err(Error::ContextSealed(id));
        }
        if self.0.index.contains_key(&id) {
            return Err(Error::DuplicateIdentifier(id));
        }
        let mut inner = ContextInner::clone(&self.0);
        if let Some(ty) = provider.result_type() {
            inner.automatic.register(id.clone(), &ty);
        }
        inner.index.insert(id.clone(), inner.providers.len());
        inner.providers.push((id, provider));
        Ok(Self(Arc::new(inner)))
    }

    /// Returns a new context where `id` is the implementation of `ty`,
    /// regardless of automatic registrations.
    pub fn with_primary(
        &self,
        ty: impl Into<TypeName>,
        id: impl Into<Identifier>,
    ) -> Result<Context, Error> {
        let id = id.into();
        if self.is_sealed() {
            return Err(Error::ContextSealed(id));
        }
        let mut inner = ContextInner::clone(&self.0);
        inner.primary.insert(ty, id);
        Ok(Self(Arc::new(inner)))
    }

    /// Returns a new context that resolves types through `resolver` only.
    pub fn with_implementation_resolver<R>(&self, resolver: R) -> Context
    where
        R: ImplementationResolver + 'static,
    {
        let mut inner = ContextInner::clone(&self.0);
        inner.resolver = Some(Arc::new(resolver));
        Self(Arc::new(inner))
    }

    /// Produces the value registered under `id`.
    pub fn get(&self, id: impl Into<Identifier>) -> Result<Value, Error> {
        Resolution::new(self).get(&id.into())
    }

    /// Produces the value of the implementation of `ty`.
    pub fn get_type(&self, ty: &TypeName) -> Result<Value, Error> {
        Resolution::new(self).get_type(ty)
    }

    /// Runs `provider` in a fresh resolution over this context.
    pub fn resolve(&self, provider: &Provider) -> Result<Value, Error> {
        provider.get(&Resolution::new(self))
    }

    pub fn has(&self, id: &str) -> bool {
        self.0.index.contains_key(id)
    }

    /// Returns true if `ty` resolves to a registered identifier.
    ///
    /// An ambiguous type counts as present: a lookup would fail with
    /// [`Error::AmbiguousImplementation`], not with [`Error::NotFound`].
    pub fn has_type(&self, ty: &TypeName) -> bool {
        match self.resolve_type(ty) {
            Ok(Some(id)) => self.has(id.as_str()),
            Ok(None) => false,
            Err(Error::AmbiguousImplementation { .. }) => true,
            Err(_) => false,
        }
    }

    /// Identifier of the implementation of `ty`, if any.
    pub fn resolve_type(&self, ty: &TypeName) -> Result<Option<Identifier>, Error> {
        if let Some(resolver) = &self.0.resolver {
            return resolver.resolve(ty);
        }
        match self.0.primary.resolve(ty)? {
            Some(id) => Ok(Some(id)),
            None => self.0.automatic.resolve(ty),
        }
    }

    /// Returns the provider registered under `id`.
    pub fn provider(&self, id: &Identifier) -> Result<Provider, Error> {
        self.0
            .index
            .get(id)
            .map(|&index| self.0.providers[index].1.clone())
            .ok_or_else(|| NotFound::Identifier(id.clone()).into())
    }

    /// Returns the provider implementing `ty`.
    pub fn type_provider(&self, ty: &TypeName) -> Result<Provider, Error> {
        match self.resolve_type(ty)? {
            Some(id) => self.provider(&id),
            None => Err(NotFound::Type(ty.clone()).into()),
        }
    }

    /// Registered identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &Identifier> {
        self.0.providers.iter().map(|(id, _)| id)
    }

    /// Registered providers in registration order.
    pub fn providers(&self) -> impl Iterator<Item = (&Identifier, &Provider)> {
        self.0.providers.iter().map(|(id, provider)| (id, provider))
    }

    pub fn len(&self) -> usize {
        self.0.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.providers.is_empty()
    }

    /// Returns true once the context has served a lookup.
    pub fn is_sealed(&self) -> bool {
        self.0.sealed.load(Ordering::Acquire)
    }

    fn seal(&self) {
        if !self.0.sealed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Context sealed with {} provider(s)", self.len());
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable configuration phase of a [`Context`].
///
/// # Examples
///
/// ```rust
/// use rivet::{ContextBuilder, Error, Provider, TypeName};
///
/// let mut builder = ContextBuilder::new();
/// builder.add("first", Provider::value_of(1u32)).unwrap();
/// builder.add("second", Provider::value_of(2u32)).unwrap();
///
/// let context = builder.build();
/// let err = context.get_type(&TypeName::of::<u32>()).unwrap_err();
/// assert!(matches!(err, Error::AmbiguousImplementation { .. }));
///
/// let mut builder = ContextBuilder::new();
/// builder.add("first", Provider::value_of(1u32)).unwrap();
/// builder.add("second", Provider::value_of(2u32)).unwrap();
/// builder.primary(TypeName::of::<u32>(), "second");
///
/// let context = builder.build();
/// let value = context.get_type(&TypeName::of::<u32>()).unwrap();
/// assert_eq!(*value.downcast::<u32>().unwrap(), 2);
/// ```
pub struct ContextBuilder {
    providers: Vec<(Identifier, Provider)>,
    index: HashMap<Identifier, usize>,
    primary: PrimaryImplementationResolver,
    automatic: AutomaticImplementationResolver,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::with_introspector(Arc::new(TypeRegistry::new()))
    }

    pub fn with_introspector(introspector: Arc<dyn Introspector>) -> Self {
        Self {
            providers: Vec::new(),
            index: HashMap::new(),
            primary: PrimaryImplementationResolver::new(),
            automatic: AutomaticImplementationResolver::new(introspector),
        }
    }

    /// Registers `provider` under `id`.
    pub fn add(&mut self, id: impl Into<Identifier>, provider: Provider) -> Result<&mut Self, Error> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateIdentifier(id));
        }
        if let Some(ty) = provider.result_type() {
            self.automatic.register(id.clone(), &ty);
        }
        self.index.insert(id.clone(), self.providers.len());
        self.providers.push((id, provider));
        Ok(self)
    }

    /// Declares `id` as the implementation of `ty`.
    pub fn primary(&mut self, ty: impl Into<TypeName>, id: impl Into<Identifier>) -> &mut Self {
        self.primary.insert(ty, id);
        self
    }

    pub fn has(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Moves every registration into a new context and leaves the builder
    /// empty, keeping its introspector.
    pub fn build(&mut self) -> Context {
        tracing::debug!("Building context with {} provider(s)", self.providers.len());
        let introspector = self.automatic.introspector().clone();
        let automatic = AutomaticImplementationResolver::new(introspector);
        Context(Arc::new(ContextInner {
            providers: std::mem::take(&mut self.providers),
            index: std::mem::take(&mut self.index),
            primary: std::mem::take(&mut self.primary),
            automatic: std::mem::replace(&mut self.automatic, automatic),
            resolver: None,
            sealed: AtomicBool::new(false),
        }))
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one resolution call chain over a [`Context`].
///
/// Tracks the identifiers currently being resolved so that re-entering one of
/// them fails with [`Error::CyclicDependency`] instead of recursing forever.
/// Each top-level lookup gets its own resolution, so concurrent lookups never
/// observe each other's frames.
pub struct Resolution<'a> {
    context: &'a Context,
    dependents: RefCell<Vec<Identifier>>,
}

impl<'a> Resolution<'a> {
    pub fn new(context: &'a Context) -> Self {
        context.seal();
        Self {
            context,
            dependents: RefCell::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &'a Context {
        self.context
    }

    /// Produces the value registered under `id` within this call chain.
    pub fn get(&self, id: &Identifier) -> Result<Value, Error> {
        let provider = self.context.provider(id)?;
        if self.dependents.borrow().contains(id) {
            return Err(self.cycle(id.clone()));
        }
        let _frame = Frame::push(self, id.clone());
        tracing::trace!("Resolving {id}");
        provider.get(self)
    }

    /// Produces the value of the implementation of `ty` within this call chain.
    pub fn get_type(&self, ty: &TypeName) -> Result<Value, Error> {
        match self.context.resolve_type(ty)? {
            Some(id) => self.get(&id),
            None => Err(NotFound::Type(ty.clone()).into()),
        }
    }

    /// Identifiers asking for the one currently being resolved, outermost first.
    pub fn dependents(&self) -> Vec<Identifier> {
        let dependents = self.dependents.borrow();
        let len = dependents.len().saturating_sub(1);
        dependents[..len].to_vec()
    }

    /// Identifier currently being resolved.
    pub fn current(&self) -> Option<Identifier> {
        self.dependents.borrow().last().cloned()
    }

    pub(crate) fn cycle(&self, identifier: Identifier) -> Error {
        let mut chain = self.dependents.borrow().clone();
        chain.push(identifier.clone());
        Error::CyclicDependency { identifier, chain }
    }
}

struct Frame<'r, 'a> {
    resolution: &'r Resolution<'a>,
}

impl<'r, 'a> Frame<'r, 'a> {
    fn push(resolution: &'r Resolution<'a>, id: Identifier) -> Self {
        resolution.dependents.borrow_mut().push(id);
        Self { resolution }
    }
}

impl Drop for Frame<'_, '_> {
    fn drop(&mut self) {
        self.resolution.dependents.borrow_mut().pop();
    }
}
