use thiserror::Error;

use crate::{Identifier, Status, TypeName};

/// Type alias for boxed errors that can be sent across threads.
///
/// This is the error type returned by user supplied constructors and factories.
pub type StdError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while wiring, resolving or running a provider graph.
#[derive(Error, Debug)]
pub enum Error {
    /// More than one rule of the same precedence tier matches a parameter.
    #[error("Ambiguous binding for parameter #{position} (${parameter}): {reason}")]
    AmbiguousBinding {
        parameter: String,
        position: usize,
        reason: String,
    },
    /// More than one registered provider claims the same type.
    #[error("Multiple implementations found for {type_name}: {}", join(.candidates, ", "))]
    AmbiguousImplementation {
        type_name: TypeName,
        candidates: Vec<Identifier>,
    },
    /// A required parameter without declared type has no binding.
    #[error(
        "Failed to determine argument #{position} (${parameter}) of {callable}, because no definition matches"
    )]
    UnresolvedParameter {
        callable: String,
        parameter: String,
        position: usize,
    },
    /// A required union-typed parameter cannot be chosen automatically.
    #[error(
        "Failed to determine argument #{position} (${parameter}) of {callable}, because union types cannot be resolved automatically"
    )]
    AmbiguousType {
        callable: String,
        parameter: String,
        position: usize,
    },
    /// The identifier is already registered.
    #[error("Identifier conflict: {0}")]
    DuplicateIdentifier(Identifier),
    /// Nothing is registered for the identifier or type.
    #[error(transparent)]
    NotFound(#[from] NotFound),
    /// An identifier was requested while it was already being resolved.
    #[error("Detected a cyclic dependency while resolving {identifier}: {}", join(.chain, " -> "))]
    CyclicDependency {
        identifier: Identifier,
        chain: Vec<Identifier>,
    },
    /// A lifecycle operation was invoked from a state that does not allow it.
    #[error("Invalid lifecycle operation '{operation}' for status {status}")]
    Lifecycle {
        operation: &'static str,
        status: Status,
    },
    /// The context already serves lookups and can no longer be extended.
    #[error("Context already started, cannot register {0}")]
    ContextSealed(Identifier),
    /// The constructor or factory itself failed.
    #[error("Could not execute {callable}: {source}")]
    ConstructionFailure {
        callable: String,
        #[source]
        source: StdError,
    },
    /// A singleton start or stop callback failed.
    #[error("Singleton {phase} callback failed: {source}")]
    Hook {
        phase: &'static str,
        #[source]
        source: StdError,
    },
    /// A value was accessed as a type it does not hold.
    #[error("Failed to downcast, required: '{required}' actual: '{actual}'")]
    Downcast {
        required: &'static str,
        actual: &'static str,
    },
    /// One or more providers failed to stop.
    #[error("{} provider(s) failed to stop: {}", .0.len(), join(.0, "; "))]
    Stop(Vec<Error>),
    /// Startup failed and the following best-effort stop reported errors too.
    #[error("{cause} (unwind reported {} error(s): {})", .stop_errors.len(), join(.stop_errors, "; "))]
    Unwind {
        #[source]
        cause: Box<Error>,
        stop_errors: Vec<Error>,
    },
}

/// Lookup by identifier or by type that resolved to nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("Unknown identifier: {0}")]
    Identifier(Identifier),
    #[error("No implementation found for type {0}")]
    Type(TypeName),
}

impl Error {
    /// Returns the error that started an unwind, or `self` otherwise.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Unwind { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}
