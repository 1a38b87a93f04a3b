//! Type and callable metadata consumed by the resolution engine.
//!
//! The engine never inspects Rust syntax itself. Callables are described by
//! [`Executable`] values, usually generated by `#[derive(Injectable)]` or
//! `#[injectable]`, and type ancestry is answered by an [`Introspector`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::{Args, StdError, TypeName, Value};

/// Answers type hierarchy questions for autowiring.
pub trait Introspector: Send + Sync {
    /// Returns every ancestor of `ty` (parents and implemented interfaces,
    /// transitively), excluding `ty` itself.
    fn ancestors(&self, ty: &TypeName) -> Vec<TypeName>;

    /// Returns true if a value of type `ty` may satisfy a parameter declared as `to`.
    fn is_assignable(&self, ty: &TypeName, to: &TypeName) -> bool {
        ty == to || self.ancestors(ty).contains(to)
    }
}

impl<T> Introspector for Arc<T>
where
    T: Introspector + ?Sized,
{
    fn ancestors(&self, ty: &TypeName) -> Vec<TypeName> {
        (**self).ancestors(ty)
    }

    fn is_assignable(&self, ty: &TypeName, to: &TypeName) -> bool {
        (**self).is_assignable(ty, to)
    }
}

/// Explicitly declared type hierarchy.
///
/// # Examples
///
/// ```rust
/// use rivet::{Introspector, TypeName, TypeRegistry};
///
/// struct Postgres;
///
/// let registry = TypeRegistry::new()
///     .implements::<Postgres>("app::Database")
///     .extends("app::Database", "app::Storage");
///
/// let ancestors = registry.ancestors(&TypeName::of::<Postgres>());
/// assert!(ancestors.contains(&TypeName::new("app::Storage")));
/// ```
#[derive(Clone, Default)]
pub struct TypeRegistry {
    parents: HashMap<TypeName, Vec<TypeName>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `parent` as a direct ancestor of `child`.
    pub fn extends(mut self, child: impl Into<TypeName>, parent: impl Into<TypeName>) -> Self {
        self.add(child, parent);
        self
    }

    /// Declares that the Rust type `T` implements the interface `parent`.
    pub fn implements<T>(self, parent: impl Into<TypeName>) -> Self
    where
        T: ?Sized + 'static,
    {
        self.extends(TypeName::of::<T>(), parent)
    }

    pub fn add(&mut self, child: impl Into<TypeName>, parent: impl Into<TypeName>) -> &mut Self {
        let parent = parent.into();
        let parents = self.parents.entry(child.into()).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        self
    }
}

impl Introspector for TypeRegistry {
    fn ancestors(&self, ty: &TypeName) -> Vec<TypeName> {
        let mut seen = HashSet::new();
        let mut ancestors = Vec::new();
        let mut pending = vec![ty.clone()];
        seen.insert(ty.clone());
        while let Some(current) = pending.pop() {
            for parent in self.parents.get(&current).into_iter().flatten() {
                if seen.insert(parent.clone()) {
                    ancestors.push(parent.clone());
                    pending.push(parent.clone());
                }
            }
        }
        ancestors
    }
}

/// Memoizes the ancestry answers of another introspector.
pub struct CachingIntrospector<I> {
    inner: I,
    cache: DashMap<TypeName, Arc<[TypeName]>>,
}

impl<I> CachingIntrospector<I>
where
    I: Introspector,
{
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Number of types whose ancestry has been computed.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<I> Introspector for CachingIntrospector<I>
where
    I: Introspector,
{
    fn ancestors(&self, ty: &TypeName) -> Vec<TypeName> {
        if let Some(cached) = self.cache.get(ty) {
            return cached.to_vec();
        }
        let ancestors: Arc<[TypeName]> = self.inner.ancestors(ty).into();
        self.cache.insert(ty.clone(), ancestors.clone());
        ancestors.to_vec()
    }
}

/// Declared type of a parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterType {
    Untyped,
    Named(TypeName),
    Union(Vec<TypeName>),
}

impl ParameterType {
    /// Every member type, one for a named type and none for untyped.
    pub fn members(&self) -> &[TypeName] {
        match self {
            ParameterType::Untyped => &[],
            ParameterType::Named(ty) => std::slice::from_ref(ty),
            ParameterType::Union(types) => types,
        }
    }
}

/// Metadata of one parameter of an [`Executable`].
#[derive(Clone)]
pub struct Parameter {
    name: String,
    position: usize,
    declared_type: ParameterType,
    default: Option<Value>,
    variadic: bool,
    markers: Vec<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: 0,
            declared_type: ParameterType::Untyped,
            default: None,
            variadic: false,
            markers: Vec::new(),
        }
    }

    /// Declares the parameter type as the Rust type `T`.
    pub fn typed<T>(self) -> Self
    where
        T: ?Sized + 'static,
    {
        self.of_type(TypeName::of::<T>())
    }

    pub fn of_type(mut self, ty: impl Into<TypeName>) -> Self {
        self.declared_type = ParameterType::Named(ty.into());
        self
    }

    pub fn union<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.declared_type = ParameterType::Union(types.into_iter().map(Into::into).collect());
        self
    }

    /// Makes the parameter optional with the given default value.
    pub fn optional(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn declared_type(&self) -> &ParameterType {
        &self.declared_type
    }

    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("declared_type", &self.declared_type)
            .field("optional", &self.is_optional())
            .field("variadic", &self.variadic)
            .field("markers", &self.markers)
            .finish()
    }
}

type Invoke = dyn Fn(Args) -> Result<Value, StdError> + Send + Sync;

/// A constructor or factory together with its parameter metadata.
///
/// # Examples
///
/// ```rust
/// use rivet::{Executable, Parameter, Value};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// let executable = Executable::new("Greeter::new", |mut args| {
///     let greeting = args.take_cloned::<String>()?;
///     Ok(Value::new(Greeter { greeting }))
/// })
/// .returns::<Greeter>()
/// .param(Parameter::new("greeting").typed::<String>());
///
/// assert_eq!(executable.parameters().len(), 1);
/// ```
#[derive(Clone)]
pub struct Executable {
    name: String,
    result_type: Option<TypeName>,
    parameters: Vec<Parameter>,
    invoke: Arc<Invoke>,
}

impl Executable {
    pub fn new<F>(name: impl Into<String>, invoke: F) -> Self
    where
        F: Fn(Args) -> Result<Value, StdError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            result_type: None,
            parameters: Vec::new(),
            invoke: Arc::new(invoke),
        }
    }

    /// Declares the result type as the Rust type `T`.
    pub fn returns<T>(self) -> Self
    where
        T: ?Sized + 'static,
    {
        self.returns_type(TypeName::of::<T>())
    }

    pub fn returns_type(mut self, ty: impl Into<TypeName>) -> Self {
        self.result_type = Some(ty.into());
        self
    }

    /// Appends a parameter; its position is the number of parameters before it.
    pub fn param(mut self, mut parameter: Parameter) -> Self {
        parameter.position = self.parameters.len();
        self.parameters.push(parameter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn result_type(&self) -> Option<&TypeName> {
        self.result_type.as_ref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn invoke(&self, values: Vec<Value>) -> Result<Value, StdError> {
        (self.invoke)(Args::new(self.name.clone(), values))
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("name", &self.name)
            .field("result_type", &self.result_type)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Types that know how to construct themselves from injected arguments.
///
/// Usually implemented with `#[derive(Injectable)]` or the `#[injectable]`
/// attribute on an impl block with a `#[factory]` method.
pub trait Injectable: Send + Sync + 'static {
    /// Returns the constructor of this type.
    fn executable() -> Executable;
}
