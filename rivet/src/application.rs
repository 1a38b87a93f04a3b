use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::{
    ArgumentResolver, Arguments, Context, ContextBuilder, Definition, Definitions, Error,
    Executable, Identifier, Introspector, LifecycleCoordinator, Provider, Status, TypeName,
    TypeRegistry, Value,
};

static NEXT_INJECTOR: AtomicU64 = AtomicU64::new(1);

/// Compiles [`Definition`]s into providers.
///
/// Every injector has a unique id; singleton definitions build one provider
/// per injector, so all uses of a singleton definition within one injector
/// share one value.
pub struct Injector {
    id: u64,
    alive: Arc<()>,
    definitions: Definitions,
    resolver: ArgumentResolver,
    introspector: Arc<dyn Introspector>,
}

impl Injector {
    pub fn new(definitions: Definitions) -> Self {
        Self::with_introspector(definitions, Arc::new(TypeRegistry::new()))
    }

    pub fn with_introspector(definitions: Definitions, introspector: Arc<dyn Introspector>) -> Self {
        Self {
            id: NEXT_INJECTOR.fetch_add(1, Ordering::Relaxed),
            alive: Arc::new(()),
            definitions,
            resolver: ArgumentResolver::new(introspector.clone()),
            introspector,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handle that stops upgrading once the injector is dropped.
    pub(crate) fn alive(&self) -> Weak<()> {
        Arc::downgrade(&self.alive)
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn introspector(&self) -> &Arc<dyn Introspector> {
        &self.introspector
    }

    pub fn argument_resolver(&self) -> &ArgumentResolver {
        &self.resolver
    }

    /// Builds a provider invoking `executable` with arguments bound from `arguments`.
    pub fn executable_provider(
        &self,
        executable: &Executable,
        arguments: &Arguments,
    ) -> Result<Provider, Error> {
        let arguments = self.resolver.resolve(self, executable, arguments)?;
        Ok(Provider::factory(executable.clone(), arguments))
    }

    /// Builds every definition into a fresh context.
    pub fn context(&self) -> Result<Context, Error> {
        let mut builder = ContextBuilder::with_introspector(self.introspector.clone());
        for (id, definition) in self.definitions.iter() {
            tracing::debug!("Building definition {id}: {definition:?}");
            builder.add(id, definition.build(self)?)?;
        }
        for (ty, id) in self.definitions.primaries() {
            builder.primary(ty, id);
        }
        Ok(builder.build())
    }
}

/// Behaviour switches of an [`Application`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ApplicationOptions {
    /// Instantiate and start on first access instead of waiting for
    /// [`Application::start`].
    pub auto_start: bool,
}

/// A built provider graph together with its lifecycle.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rivet::{Application, Executable, Parameter, Value, factory, arguments, singleton, value};
///
/// struct Greeter {
///     name: String,
/// }
///
/// let greeter = Executable::new("Greeter", |mut args| {
///     let name = args.take_cloned::<String>()?;
///     Ok(Value::new(Greeter { name }))
/// })
/// .returns::<Greeter>()
/// .param(Parameter::new("name").typed::<String>());
///
/// let app = Application::builder()
///     .define("name", value("world".to_string()))
///     .define("greeter", singleton(factory(greeter, arguments())))
///     .build()
///     .unwrap();
///
/// app.start().unwrap();
/// let greeter: Arc<Greeter> = app.get_typed().unwrap();
/// assert_eq!(greeter.name, "world");
/// app.stop().unwrap();
/// ```
pub struct Application {
    injector: Injector,
    context: Context,
    coordinator: Mutex<LifecycleCoordinator>,
    options: ApplicationOptions,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder {
            definitions: Definitions::new(),
            introspector: None,
            options: ApplicationOptions::default(),
            error: None,
        }
    }

    pub fn new(injector: Injector, options: ApplicationOptions) -> Result<Self, Error> {
        let context = injector.context()?;
        Ok(Self {
            coordinator: Mutex::new(LifecycleCoordinator::new(context.clone())),
            injector,
            context,
            options,
        })
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn options(&self) -> ApplicationOptions {
        self.options
    }

    pub fn status(&self) -> Status {
        self.coordinator().status()
    }

    /// Instantiates and starts every lifecycle provider.
    pub fn start(&self) -> Result<(), Error> {
        let mut coordinator = self.coordinator();
        coordinator.instantiate()?;
        coordinator.start()
    }

    /// Stops every lifecycle provider in reverse order.
    pub fn stop(&self) -> Result<(), Error> {
        self.coordinator().stop()
    }

    pub fn get(&self, id: impl Into<Identifier>) -> Result<Value, Error> {
        self.ensure_started("get")?;
        self.context.get(id)
    }

    pub fn get_type(&self, ty: &TypeName) -> Result<Value, Error> {
        self.ensure_started("get_type")?;
        self.context.get_type(ty)
    }

    /// Returns the implementation of the Rust type `T`.
    pub fn get_typed<T>(&self) -> Result<Arc<T>, Error>
    where
        T: Send + Sync + 'static,
    {
        self.get_type(&TypeName::of::<T>())?.downcast()
    }

    /// Builds `definition` against this application and produces its value.
    pub fn invoke(&self, definition: &Definition) -> Result<Value, Error> {
        self.ensure_started("invoke")?;
        let provider = definition.build(&self.injector)?;
        self.context.resolve(&provider)
    }

    /// Starts an auto-started application on first access.
    ///
    /// Once stopped, including after a failed start, lookups are refused.
    fn ensure_started(&self, operation: &'static str) -> Result<(), Error> {
        if !self.options.auto_start {
            return Ok(());
        }
        let mut coordinator = self.coordinator();
        match coordinator.status() {
            Status::None => {
                coordinator.instantiate()?;
                coordinator.start()
            }
            status @ (Status::Stopping | Status::Stopped) => {
                Err(Error::Lifecycle { operation, status })
            }
            _ => Ok(()),
        }
    }

    fn coordinator(&self) -> MutexGuard<'_, LifecycleCoordinator> {
        self.coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for configuring and building an [`Application`].
pub struct ApplicationBuilder {
    definitions: Definitions,
    introspector: Option<Arc<dyn Introspector>>,
    options: ApplicationOptions,
    error: Option<Error>,
}

impl ApplicationBuilder {
    /// Registers `definition` under `id`.
    ///
    /// A duplicate identifier is reported by [`ApplicationBuilder::build`].
    pub fn define(mut self, id: impl Into<Identifier>, definition: impl Into<Definition>) -> Self {
        if let Err(err) = self.definitions.define(id, definition) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Registers `definition` under a generated identifier.
    pub fn add(mut self, definition: impl Into<Definition>) -> Self {
        self.definitions.add(definition);
        self
    }

    /// Declares `id` as the implementation of `ty`.
    pub fn primary(mut self, ty: impl Into<TypeName>, id: impl Into<Identifier>) -> Self {
        self.definitions.primary(ty, id);
        self
    }

    pub fn definitions(mut self, definitions: Definitions) -> Self {
        self.definitions = definitions;
        self
    }

    pub fn introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    pub fn options(mut self, options: ApplicationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.options.auto_start = auto_start;
        self
    }

    pub fn build(self) -> Result<Application, Error> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let injector = match self.introspector {
            Some(introspector) => Injector::with_introspector(self.definitions, introspector),
            None => Injector::new(self.definitions),
        };
        Application::new(injector, self.options)
    }
}
