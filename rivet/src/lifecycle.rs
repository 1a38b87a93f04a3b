use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::{Context, Error, Identifier, Provider, Resolution};

/// Optional hooks a provider exposes to the [`LifecycleCoordinator`].
///
/// Every hook defaults to doing nothing.
pub trait Lifecycle: Send + Sync {
    fn instantiate(&self, resolution: &Resolution<'_>) -> Result<(), Error> {
        let _ = resolution;
        Ok(())
    }

    fn start(&self, resolution: &Resolution<'_>) -> Result<(), Error> {
        let _ = resolution;
        Ok(())
    }

    fn stop(&self, resolution: &Resolution<'_>) -> Result<(), Error> {
        let _ = resolution;
        Ok(())
    }
}

/// Status of a [`LifecycleCoordinator`] run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    None,
    Instantiating,
    Instantiated,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Status::None => "none",
            Status::Instantiating => "instantiating",
            Status::Instantiated => "instantiated",
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
        };
        f.write_str(status)
    }
}

/// Drives instantiate, start and stop over every provider of a context.
///
/// Providers are visited depth-first in registration order, the provider a
/// singleton wraps first, then dependencies. Providers reachable through
/// several paths are visited once. Only providers exposing [`Provider::lifecycle`] are managed; stop
/// runs over them in exact reverse order.
///
/// # Examples
///
/// ```rust
/// use rivet::{ContextBuilder, LifecycleCoordinator, Provider, Status};
///
/// let mut builder = ContextBuilder::new();
/// builder
///     .add("answer", Provider::singleton(Provider::value_of(42u32)))
///     .unwrap();
///
/// let mut coordinator = LifecycleCoordinator::new(builder.build());
/// coordinator.instantiate().unwrap();
/// coordinator.start().unwrap();
/// assert_eq!(coordinator.status(), Status::Running);
/// assert_eq!(coordinator.managed().len(), 1);
///
/// coordinator.stop().unwrap();
/// assert_eq!(coordinator.status(), Status::Stopped);
/// ```
pub struct LifecycleCoordinator {
    context: Context,
    status: Status,
    managed: Vec<Provider>,
}

enum Visit {
    InProgress,
    Done,
}

impl LifecycleCoordinator {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            status: Status::None,
            managed: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Managed providers in the order they were instantiated.
    pub fn managed(&self) -> &[Provider] {
        &self.managed
    }

    /// Identifier of a managed provider, if it is registered directly.
    pub fn identifier(&self, provider: &Provider) -> Option<&Identifier> {
        self.context
            .providers()
            .find(|(_, registered)| registered.ptr_eq(provider))
            .map(|(id, _)| id)
    }

    /// Instantiates every lifecycle provider, dependencies first.
    ///
    /// On failure everything instantiated so far is stopped in reverse order
    /// before the error is returned.
    pub fn instantiate(&mut self) -> Result<(), Error> {
        self.transition("instantiate", &[Status::None], Status::Instantiating)?;
        let context = self.context.clone();
        let resolution = Resolution::new(&context);
        let mut visits = HashMap::new();
        let mut path = Vec::new();
        let names: HashMap<usize, Identifier> = context
            .providers()
            .map(|(id, provider)| (provider.key(), id.clone()))
            .collect();
        for (_, provider) in context.providers() {
            if let Err(err) = self.visit(&resolution, provider, &names, &mut visits, &mut path) {
                return Err(self.unwind(&resolution, err));
            }
        }
        self.status = Status::Instantiated;
        tracing::debug!("Instantiated {} managed provider(s)", self.managed.len());
        Ok(())
    }

    /// Starts every managed provider in instantiation order.
    pub fn start(&mut self) -> Result<(), Error> {
        self.transition("start", &[Status::Instantiated], Status::Starting)?;
        let context = self.context.clone();
        let resolution = Resolution::new(&context);
        for index in 0..self.managed.len() {
            let provider = self.managed[index].clone();
            if let Some(lifecycle) = provider.lifecycle() {
                if let Err(err) = lifecycle.start(&resolution) {
                    return Err(self.unwind(&resolution, err));
                }
            }
        }
        self.status = Status::Running;
        tracing::debug!("Started {} managed provider(s)", self.managed.len());
        Ok(())
    }

    /// Stops every managed provider in reverse order.
    ///
    /// A failing provider does not prevent the remaining ones from stopping;
    /// all failures are reported together as [`Error::Stop`].
    pub fn stop(&mut self) -> Result<(), Error> {
        self.transition("stop", &[Status::Starting, Status::Running], Status::Stopping)?;
        let context = self.context.clone();
        let resolution = Resolution::new(&context);
        let errors = self.stop_managed(&resolution);
        self.status = Status::Stopped;
        tracing::debug!("Stopped {} managed provider(s)", self.managed.len());
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Stop(errors))
        }
    }

    fn transition(
        &mut self,
        operation: &'static str,
        allowed: &[Status],
        next: Status,
    ) -> Result<(), Error> {
        if !allowed.contains(&self.status) {
            return Err(Error::Lifecycle {
                operation,
                status: self.status,
            });
        }
        tracing::debug!("Lifecycle {} -> {}", self.status, next);
        self.status = next;
        Ok(())
    }

    fn visit(
        &mut self,
        resolution: &Resolution<'_>,
        provider: &Provider,
        names: &HashMap<usize, Identifier>,
        visits: &mut HashMap<usize, Visit>,
        path: &mut Vec<Identifier>,
    ) -> Result<(), Error> {
        let key = provider.key();
        let name = names.get(&key).cloned();
        match visits.get(&key) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => {
                let identifier = name.unwrap_or_else(|| Identifier::new(format!("{provider:?}")));
                let mut chain = path.clone();
                chain.push(identifier.clone());
                return Err(Error::CyclicDependency { identifier, chain });
            }
            None => {}
        }
        visits.insert(key, Visit::InProgress);
        if let Some(name) = &name {
            path.push(name.clone());
        }
        if let Some(wrapped) = provider.unwrap() {
            self.visit(resolution, wrapped, names, visits, path)?;
        }
        for dependency in provider.dependencies(resolution)? {
            self.visit(resolution, &dependency, names, visits, path)?;
        }
        if name.is_some() {
            path.pop();
        }
        visits.insert(key, Visit::Done);
        if let Some(lifecycle) = provider.lifecycle() {
            self.managed.push(provider.clone());
            lifecycle.instantiate(resolution)?;
        }
        Ok(())
    }

    fn unwind(&mut self, resolution: &Resolution<'_>, cause: Error) -> Error {
        tracing::warn!("Lifecycle failed while {}: {cause}", self.status);
        self.status = Status::Stopping;
        let stop_errors = self.stop_managed(resolution);
        self.status = Status::Stopped;
        if stop_errors.is_empty() {
            cause
        } else {
            Error::Unwind {
                cause: Box::new(cause),
                stop_errors,
            }
        }
    }

    fn stop_managed(&self, resolution: &Resolution<'_>) -> Vec<Error> {
        let mut errors = Vec::new();
        let mut stopped = HashSet::new();
        for provider in self.managed.iter().rev() {
            if !stopped.insert(provider.key()) {
                continue;
            }
            let Some(lifecycle) = provider.lifecycle() else {
                continue;
            };
            if let Err(err) = lifecycle.stop(resolution) {
                tracing::error!("Failed to stop {provider:?}: {err}");
                errors.push(err);
            }
        }
        errors
    }
}
