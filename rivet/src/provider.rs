use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::{
    Error, Executable, Identifier, Lifecycle, LazyProxyFactory, Parameter, Resolution, StdError,
    TypeName, Value,
};

/// A unit of construction: produces a value on demand and reports which
/// providers must be ready before it can run.
///
/// Providers are cheap to clone. Clones share identity, which is what the
/// lifecycle coordinator uses to visit shared dependencies only once.
#[derive(Clone)]
pub struct Provider(Arc<ProviderKind>);

enum ProviderKind {
    Value {
        value: Value,
        result_type: Option<TypeName>,
    },
    Factory(FactoryProvider),
    Delegate(DelegateProvider),
    Identifier(Identifier),
    Type(TypeName),
    OptionalType {
        ty: TypeName,
        default: Provider,
    },
    Singleton(SingletonProvider),
    Proxy(ProxyProvider),
    Custom(Box<dyn CustomProvider>),
}

/// A resolved parameter together with the provider bound to it.
#[derive(Clone, Debug)]
pub struct Argument {
    pub parameter: Parameter,
    pub provider: Provider,
}

/// Extension point for providers outside of the built-in variants.
///
/// # Examples
///
/// ```rust
/// use rivet::{ContextBuilder, CustomProvider, Error, Provider, Resolution, Value};
///
/// struct Answer;
///
/// impl CustomProvider for Answer {
///     fn get(&self, _resolution: &Resolution<'_>) -> Result<Value, Error> {
///         Ok(Value::new(42u32))
///     }
/// }
///
/// let mut builder = ContextBuilder::new();
/// builder.add("answer", Provider::custom(Answer)).unwrap();
/// let context = builder.build();
///
/// let answer = context.get("answer").unwrap();
/// assert_eq!(*answer.downcast::<u32>().unwrap(), 42);
/// ```
pub trait CustomProvider: Send + Sync + 'static {
    fn get(&self, resolution: &Resolution<'_>) -> Result<Value, Error>;

    /// Providers that must be instantiated and started before this one.
    fn dependencies(&self, resolution: &Resolution<'_>) -> Result<Vec<Provider>, Error> {
        let _ = resolution;
        Ok(Vec::new())
    }

    /// Type under which the provider is autowired.
    fn result_type(&self) -> Option<TypeName> {
        None
    }

    /// Lifecycle hooks, if the provider has any.
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

impl Provider {
    fn from_kind(kind: ProviderKind) -> Self {
        Self(Arc::new(kind))
    }

    /// A provider returning the given value without declared type.
    pub fn value(value: Value) -> Self {
        Self::from_kind(ProviderKind::Value {
            value,
            result_type: None,
        })
    }

    /// A provider returning `value`, autowired under the Rust type `T`.
    pub fn value_of<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::from_kind(ProviderKind::Value {
            value: Value::new(value),
            result_type: Some(TypeName::of::<T>()),
        })
    }

    /// Invokes `executable` with one value per argument provider.
    pub fn factory(executable: Executable, arguments: Vec<Argument>) -> Self {
        Self::from_kind(ProviderKind::Factory(FactoryProvider {
            executable,
            arguments,
        }))
    }

    /// A provider backed by a closure over the current resolution.
    pub fn delegate<F>(delegate: F) -> Self
    where
        F: Fn(&Resolution<'_>) -> Result<Value, StdError> + Send + Sync + 'static,
    {
        Self::from_kind(ProviderKind::Delegate(DelegateProvider {
            result_type: None,
            delegate: Box::new(delegate),
        }))
    }

    /// Same as [`Provider::delegate`], autowired under `result_type`.
    pub fn typed_delegate<F>(result_type: impl Into<TypeName>, delegate: F) -> Self
    where
        F: Fn(&Resolution<'_>) -> Result<Value, StdError> + Send + Sync + 'static,
    {
        Self::from_kind(ProviderKind::Delegate(DelegateProvider {
            result_type: Some(result_type.into()),
            delegate: Box::new(delegate),
        }))
    }

    /// Refers to the provider registered under `id`.
    pub fn identifier(id: impl Into<Identifier>) -> Self {
        Self::from_kind(ProviderKind::Identifier(id.into()))
    }

    /// Asks the context for the implementation of `ty`.
    pub fn type_ref(ty: impl Into<TypeName>) -> Self {
        Self::from_kind(ProviderKind::Type(ty.into()))
    }

    /// Asks the context for `ty` if it can be satisfied, otherwise uses `default`.
    pub fn optional_type_ref(ty: impl Into<TypeName>, default: Provider) -> Self {
        Self::from_kind(ProviderKind::OptionalType {
            ty: ty.into(),
            default,
        })
    }

    /// Memoizes the first value produced by `provider`.
    ///
    /// The lifecycle coordinator constructs the value eagerly during
    /// instantiation.
    pub fn singleton(provider: Provider) -> Self {
        Self::singleton_with(provider, SingletonOptions::new())
    }

    /// Memoizes the first value produced by `provider`, constructing it on
    /// first use only.
    pub fn lazy_singleton(provider: Provider) -> Self {
        Self::singleton_with(provider, SingletonOptions::new().lazy(true))
    }

    /// Memoizes the first value produced by `provider` and runs the
    /// callbacks of `options` when the lifecycle starts and stops.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::{Arc, Mutex};
    /// use rivet::{ContextBuilder, LifecycleCoordinator, Provider, SingletonOptions};
    ///
    /// let events = Arc::new(Mutex::new(Vec::new()));
    /// let (started, stopped) = (events.clone(), events.clone());
    /// let options = SingletonOptions::new()
    ///     .on_start(move |value| {
    ///         started.lock().unwrap().push(format!("start {}", value.downcast::<u32>()?));
    ///         Ok(())
    ///     })
    ///     .on_stop(move |_| {
    ///         stopped.lock().unwrap().push("stop".to_string());
    ///         Ok(())
    ///     });
    ///
    /// let mut builder = ContextBuilder::new();
    /// builder
    ///     .add("answer", Provider::singleton_with(Provider::value_of(42u32), options))
    ///     .unwrap();
    ///
    /// let mut coordinator = LifecycleCoordinator::new(builder.build());
    /// coordinator.instantiate().unwrap();
    /// coordinator.start().unwrap();
    /// coordinator.stop().unwrap();
    /// assert_eq!(*events.lock().unwrap(), ["start 42", "stop"]);
    /// ```
    pub fn singleton_with(provider: Provider, options: SingletonOptions) -> Self {
        Self::from_kind(ProviderKind::Singleton(SingletonProvider::new(
            provider, options,
        )))
    }

    /// Hands out placeholders created by `factory` that run `provider` on first use.
    pub fn proxy(provider: Provider, factory: Arc<dyn LazyProxyFactory>) -> Self {
        Self::from_kind(ProviderKind::Proxy(ProxyProvider { provider, factory }))
    }

    pub fn custom<P>(provider: P) -> Self
    where
        P: CustomProvider,
    {
        Self::from_kind(ProviderKind::Custom(Box::new(provider)))
    }

    /// Produces the value.
    pub fn get(&self, resolution: &Resolution<'_>) -> Result<Value, Error> {
        match self.0.as_ref() {
            ProviderKind::Value { value, .. } => Ok(value.clone()),
            ProviderKind::Factory(factory) => factory.get(resolution),
            ProviderKind::Delegate(delegate) => delegate.get(resolution),
            ProviderKind::Identifier(id) => resolution.get(id),
            ProviderKind::Type(ty) => resolution.get_type(ty),
            ProviderKind::OptionalType { ty, default } => {
                if resolution.context().has_type(ty) {
                    resolution.get_type(ty)
                } else {
                    default.get(resolution)
                }
            }
            ProviderKind::Singleton(singleton) => singleton.get(resolution),
            ProviderKind::Proxy(proxy) => proxy.get(resolution),
            ProviderKind::Custom(custom) => custom.get(resolution),
        }
    }

    /// Providers that must be ready before this one can run.
    pub fn dependencies(&self, resolution: &Resolution<'_>) -> Result<Vec<Provider>, Error> {
        let context = resolution.context();
        match self.0.as_ref() {
            ProviderKind::Value { .. } | ProviderKind::Delegate(_) | ProviderKind::Proxy(_) => {
                Ok(Vec::new())
            }
            ProviderKind::Factory(factory) => Ok(factory
                .arguments
                .iter()
                .map(|argument| argument.provider.clone())
                .collect()),
            ProviderKind::Identifier(id) => Ok(vec![context.provider(id)?]),
            ProviderKind::Type(ty) => Ok(vec![context.type_provider(ty)?]),
            ProviderKind::OptionalType { ty, default } => {
                if context.has_type(ty) {
                    Ok(vec![context.type_provider(ty)?])
                } else {
                    Ok(vec![default.clone()])
                }
            }
            ProviderKind::Singleton(singleton) => singleton.provider.dependencies(resolution),
            ProviderKind::Custom(custom) => custom.dependencies(resolution),
        }
    }

    /// Type under which the provider is autowired, if any.
    ///
    /// References to other providers never declare a type, so they cannot be
    /// picked up as an implementation of the type they refer to.
    pub fn result_type(&self) -> Option<TypeName> {
        match self.0.as_ref() {
            ProviderKind::Value { result_type, .. } => result_type.clone(),
            ProviderKind::Factory(factory) => factory.executable.result_type().cloned(),
            ProviderKind::Delegate(delegate) => delegate.result_type.clone(),
            ProviderKind::Identifier(_)
            | ProviderKind::Type(_)
            | ProviderKind::OptionalType { .. } => None,
            ProviderKind::Singleton(singleton) => singleton.provider.result_type(),
            ProviderKind::Proxy(proxy) => proxy.provider.result_type(),
            ProviderKind::Custom(custom) => custom.result_type(),
        }
    }

    /// The provider a singleton wraps.
    ///
    /// The lifecycle coordinator visits it before the singleton itself, so a
    /// wrapped provider with lifecycle hooks is managed too. Proxies do not
    /// expose theirs: the wrapped provider runs on first use only.
    pub fn unwrap(&self) -> Option<&Provider> {
        match self.0.as_ref() {
            ProviderKind::Singleton(singleton) => Some(&singleton.provider),
            _ => None,
        }
    }

    /// Lifecycle hooks of this provider, if it has any.
    pub fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        match self.0.as_ref() {
            ProviderKind::Singleton(singleton) => Some(singleton),
            ProviderKind::Custom(custom) => custom.lifecycle(),
            _ => None,
        }
    }

    /// Returns true if both handles refer to the same provider.
    pub fn ptr_eq(&self, other: &Provider) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity key, stable for the lifetime of the provider.
    pub fn key(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            ProviderKind::Value { value, .. } => f.debug_tuple("Value").field(value).finish(),
            ProviderKind::Factory(factory) => f
                .debug_tuple("Factory")
                .field(&factory.executable.name())
                .finish(),
            ProviderKind::Delegate(delegate) => f
                .debug_tuple("Delegate")
                .field(&delegate.result_type)
                .finish(),
            ProviderKind::Identifier(id) => f.debug_tuple("Identifier").field(id).finish(),
            ProviderKind::Type(ty) => f.debug_tuple("TypeReference").field(ty).finish(),
            ProviderKind::OptionalType { ty, default } => f
                .debug_struct("OptionalTypeReference")
                .field("type", ty)
                .field("default", default)
                .finish(),
            ProviderKind::Singleton(singleton) => f
                .debug_struct("Singleton")
                .field("provider", &singleton.provider)
                .field("options", &singleton.options)
                .finish(),
            ProviderKind::Proxy(proxy) => f.debug_tuple("Proxy").field(&proxy.provider).finish(),
            ProviderKind::Custom(custom) => f.debug_tuple("Custom").field(&custom.name()).finish(),
        }
    }
}

struct FactoryProvider {
    executable: Executable,
    arguments: Vec<Argument>,
}

impl FactoryProvider {
    fn get(&self, resolution: &Resolution<'_>) -> Result<Value, Error> {
        let mut values = Vec::with_capacity(self.arguments.len());
        for argument in &self.arguments {
            values.push(argument.provider.get(resolution)?);
        }
        tracing::trace!("Invoking {}", self.executable.name());
        self.executable
            .invoke(values)
            .map_err(|source| Error::ConstructionFailure {
                callable: self.executable.name().to_string(),
                source,
            })
    }
}

type Delegate = dyn Fn(&Resolution<'_>) -> Result<Value, StdError> + Send + Sync;

struct DelegateProvider {
    result_type: Option<TypeName>,
    delegate: Box<Delegate>,
}

impl DelegateProvider {
    fn get(&self, resolution: &Resolution<'_>) -> Result<Value, Error> {
        (self.delegate)(resolution).map_err(|err| match err.downcast::<Error>() {
            // Errors raised by the engine itself keep their kind.
            Ok(err) => *err,
            Err(source) => Error::ConstructionFailure {
                callable: "delegate".into(),
                source,
            },
        })
    }
}

/// Callback receiving the memoized value of a singleton.
pub type SingletonHook = Arc<dyn Fn(&Value) -> Result<(), StdError> + Send + Sync>;

/// Construction mode and lifecycle callbacks of a singleton provider.
#[derive(Clone, Default)]
pub struct SingletonOptions {
    lazy: bool,
    on_start: Vec<SingletonHook>,
    on_stop: Vec<SingletonHook>,
}

impl SingletonOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs the value on first use instead of during instantiation.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Runs `callback` with the value when the lifecycle starts.
    ///
    /// A lazy singleton built after start runs it right after construction.
    pub fn on_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value) -> Result<(), StdError> + Send + Sync + 'static,
    {
        self.on_start.push(Arc::new(callback));
        self
    }

    /// Runs `callback` with the value when the lifecycle stops, before the
    /// value is dropped.
    pub fn on_stop<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value) -> Result<(), StdError> + Send + Sync + 'static,
    {
        self.on_stop.push(Arc::new(callback));
        self
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }
}

impl fmt::Debug for SingletonOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonOptions")
            .field("lazy", &self.lazy)
            .field("on_start", &self.on_start.len())
            .field("on_stop", &self.on_stop.len())
            .finish()
    }
}

struct SingletonProvider {
    provider: Provider,
    options: SingletonOptions,
    state: Mutex<SingletonState>,
    // Held while the wrapped provider runs, so concurrent first calls construct once.
    init: Mutex<()>,
}

#[derive(Default)]
struct SingletonState {
    value: Option<Value>,
    building: Option<ThreadId>,
    started: bool,
}

impl SingletonProvider {
    fn new(provider: Provider, options: SingletonOptions) -> Self {
        Self {
            provider,
            options,
            state: Mutex::new(SingletonState::default()),
            init: Mutex::new(()),
        }
    }

    fn get(&self, resolution: &Resolution<'_>) -> Result<Value, Error> {
        let current = thread::current().id();
        {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = &state.value {
                return Ok(value.clone());
            }
            if state.building == Some(current) {
                return Err(resolution.cycle(Identifier::new(format!("{:?}", self.provider))));
            }
        }
        let _init = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        let started = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = &state.value {
                return Ok(value.clone());
            }
            state.building = Some(current);
            state.started
        };
        let result = self.provider.get(resolution).and_then(|value| {
            if started {
                run_hooks("start", &self.options.on_start, &value)?;
            }
            Ok(value)
        });
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.building = None;
        if let Ok(value) = &result {
            state.value = Some(value.clone());
        }
        result
    }
}

impl Lifecycle for SingletonProvider {
    fn instantiate(&self, resolution: &Resolution<'_>) -> Result<(), Error> {
        if !self.options.lazy {
            self.get(resolution)?;
        }
        Ok(())
    }

    fn start(&self, _resolution: &Resolution<'_>) -> Result<(), Error> {
        let _init = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        let value = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.started = true;
            state.value.clone()
        };
        match value {
            Some(value) => run_hooks("start", &self.options.on_start, &value),
            None => Ok(()),
        }
    }

    fn stop(&self, _resolution: &Resolution<'_>) -> Result<(), Error> {
        let _init = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        let (value, started) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            (state.value.take(), std::mem::take(&mut state.started))
        };
        match value {
            Some(value) if started => run_hooks("stop", &self.options.on_stop, &value),
            _ => Ok(()),
        }
    }
}

fn run_hooks(phase: &'static str, hooks: &[SingletonHook], value: &Value) -> Result<(), Error> {
    for hook in hooks {
        hook(value).map_err(|source| Error::Hook { phase, source })?;
    }
    Ok(())
}

struct ProxyProvider {
    provider: Provider,
    factory: Arc<dyn LazyProxyFactory>,
}

impl ProxyProvider {
    fn get(&self, resolution: &Resolution<'_>) -> Result<Value, Error> {
        let context = resolution.context().clone();
        let provider = self.provider.clone();
        let ty = self
            .provider
            .result_type()
            .unwrap_or_else(TypeName::of::<Value>);
        self.factory
            .create_deferred(&ty, Box::new(move || context.resolve(&provider)))
    }
}
