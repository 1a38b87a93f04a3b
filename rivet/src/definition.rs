use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::{
    Arguments, DeferredFactory, Error, Executable, Identifier, Injectable, Injector,
    LazyProxyFactory, Provider, SingletonOptions, TypeName,
};

/// Configuration-time description of how to build a [`Provider`].
///
/// Definitions are compiled by an [`Injector`] once the whole graph is
/// known. They are cheap to clone and clones share identity, which is what
/// makes one singleton definition yield one provider per injector.
#[derive(Clone)]
pub struct Definition(Arc<DefinitionKind>);

enum DefinitionKind {
    Provider(Provider),
    Factory {
        executable: Executable,
        arguments: Arguments,
    },
    Singleton {
        definition: Definition,
        options: SingletonOptions,
        // Keyed by injector id; entries of dropped injectors are pruned on the next build.
        built: Mutex<HashMap<u64, (Weak<()>, Provider)>>,
    },
    Proxy {
        definition: Definition,
        factory: Arc<dyn LazyProxyFactory>,
    },
}

impl Definition {
    fn from_kind(kind: DefinitionKind) -> Self {
        Self(Arc::new(kind))
    }

    /// Type under which the built provider is autowired.
    pub fn result_type(&self) -> Option<TypeName> {
        match self.0.as_ref() {
            DefinitionKind::Provider(provider) => provider.result_type(),
            DefinitionKind::Factory { executable, .. } => executable.result_type().cloned(),
            DefinitionKind::Singleton { definition, .. }
            | DefinitionKind::Proxy { definition, .. } => definition.result_type(),
        }
    }

    /// Compiles the definition into a provider.
    pub fn build(&self, injector: &Injector) -> Result<Provider, Error> {
        match self.0.as_ref() {
            DefinitionKind::Provider(provider) => Ok(provider.clone()),
            DefinitionKind::Factory {
                executable,
                arguments,
            } => injector.executable_provider(executable, arguments),
            DefinitionKind::Singleton {
                definition,
                options,
                built,
            } => {
                let id = injector.id();
                {
                    let mut built = built.lock().unwrap_or_else(PoisonError::into_inner);
                    built.retain(|_, (alive, _)| alive.strong_count() > 0);
                    if let Some((_, provider)) = built.get(&id) {
                        return Ok(provider.clone());
                    }
                }
                let inner = definition.build(injector)?;
                let provider = Provider::singleton_with(inner, options.clone());
                let mut built = built.lock().unwrap_or_else(PoisonError::into_inner);
                let (_, provider) = built
                    .entry(id)
                    .or_insert_with(|| (injector.alive(), provider));
                Ok(provider.clone())
            }
            DefinitionKind::Proxy {
                definition,
                factory,
            } => Ok(Provider::proxy(definition.build(injector)?, factory.clone())),
        }
    }
}

impl From<Provider> for Definition {
    fn from(value: Provider) -> Self {
        provider(value)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            DefinitionKind::Provider(provider) => {
                f.debug_tuple("Provider").field(provider).finish()
            }
            DefinitionKind::Factory { executable, .. } => {
                f.debug_tuple("Factory").field(&executable.name()).finish()
            }
            DefinitionKind::Singleton {
                definition,
                options,
                ..
            } => f
                .debug_struct("Singleton")
                .field("definition", definition)
                .field("options", options)
                .finish(),
            DefinitionKind::Proxy { definition, .. } => {
                f.debug_tuple("Proxy").field(definition).finish()
            }
        }
    }
}

/// Ordered collection of definitions with primary type overrides.
///
/// # Examples
///
/// ```rust
/// use rivet::{Definitions, value};
///
/// let mut definitions = Definitions::new();
/// definitions.define("port", value(8080u16)).unwrap();
/// let generated = definitions.add(value("localhost".to_string()));
///
/// assert!(generated.as_str().starts_with('#'));
/// assert!(definitions.define("port", value(80u16)).is_err());
/// assert_eq!(definitions.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Definitions {
    definitions: Vec<(Identifier, Definition)>,
    primaries: Vec<(TypeName, Identifier)>,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition` under `id`.
    pub fn define(
        &mut self,
        id: impl Into<Identifier>,
        definition: impl Into<Definition>,
    ) -> Result<&mut Self, Error> {
        let id = id.into();
        if self.get(id.as_str()).is_some() {
            return Err(Error::DuplicateIdentifier(id));
        }
        self.definitions.push((id, definition.into()));
        Ok(self)
    }

    /// Registers `definition` under a generated identifier and returns it.
    pub fn add(&mut self, definition: impl Into<Definition>) -> Identifier {
        let definition = definition.into();
        let next = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let id = match definition.result_type() {
            Some(ty) => Identifier::new(format!("#{next}-{ty}")),
            None => Identifier::new(format!("#{next}")),
        };
        self.definitions.push((id.clone(), definition));
        id
    }

    /// Declares `id` as the implementation of `ty`.
    pub fn primary(&mut self, ty: impl Into<TypeName>, id: impl Into<Identifier>) -> &mut Self {
        let ty = ty.into();
        let id = id.into();
        match self.primaries.iter_mut().find(|(existing, _)| *existing == ty) {
            Some(primary) => primary.1 = id,
            None => self.primaries.push((ty, id)),
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&Definition> {
        self.definitions
            .iter()
            .find(|(existing, _)| existing.as_str() == id)
            .map(|(_, definition)| definition)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Definition)> {
        self.definitions.iter().map(|(id, definition)| (id, definition))
    }

    pub fn primaries(&self) -> impl Iterator<Item = (&TypeName, &Identifier)> {
        self.primaries.iter().map(|(ty, id)| (ty, id))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Constructs `T` through its [`Injectable`] constructor with autowired arguments.
pub fn object<T>() -> Definition
where
    T: Injectable,
{
    factory(T::executable(), Arguments::new())
}

/// Constructs `T` through its [`Injectable`] constructor with the given rules.
pub fn object_with<T>(arguments: Arguments) -> Definition
where
    T: Injectable,
{
    factory(T::executable(), arguments)
}

/// Invokes `executable` with arguments resolved from `arguments`.
pub fn factory(executable: Executable, arguments: Arguments) -> Definition {
    Definition::from_kind(DefinitionKind::Factory {
        executable,
        arguments,
    })
}

/// A fixed value, autowired under its Rust type.
pub fn value<T>(value: T) -> Definition
where
    T: Send + Sync + 'static,
{
    provider(Provider::value_of(value))
}

/// An already built provider.
pub fn provider(provider: Provider) -> Definition {
    Definition::from_kind(DefinitionKind::Provider(provider))
}

/// Shares one value of `definition`, constructed eagerly when the
/// application instantiates.
pub fn singleton(definition: impl Into<Definition>) -> Definition {
    singleton_with(definition, SingletonOptions::new())
}

/// Shares one value of `definition`, constructed on first use.
pub fn lazy_singleton(definition: impl Into<Definition>) -> Definition {
    singleton_with(definition, SingletonOptions::new().lazy(true))
}

/// Shares one value of `definition` with the construction mode and
/// start/stop callbacks of `options`.
pub fn singleton_with(definition: impl Into<Definition>, options: SingletonOptions) -> Definition {
    Definition::from_kind(DefinitionKind::Singleton {
        definition: definition.into(),
        options,
        built: Mutex::new(HashMap::new()),
    })
}

/// Defers `definition` behind a [`Deferred`](crate::Deferred) placeholder.
pub fn proxy(definition: impl Into<Definition>) -> Definition {
    proxy_with(definition, Arc::new(DeferredFactory))
}

/// Defers `definition` behind a placeholder created by `factory`.
pub fn proxy_with(
    definition: impl Into<Definition>,
    factory: Arc<dyn LazyProxyFactory>,
) -> Definition {
    Definition::from_kind(DefinitionKind::Proxy {
        definition: definition.into(),
        factory,
    })
}

/// An empty rule set.
pub fn arguments() -> Arguments {
    Arguments::new()
}
