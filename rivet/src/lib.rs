//! # rivet
//!
//! A dependency injection runtime for Rust applications: it constructs, wires
//! and manages the lifecycle of objects from a declarative graph of
//! providers, resolving constructor arguments from explicit bindings or from
//! declared parameter types.
//!
//! ## Core Concepts
//!
//! - **Provider**: A unit of construction that produces a value on demand and
//!   reports the providers it depends on
//! - **Definition**: A configuration-time description of how to build a provider
//! - **Arguments**: Binding rules for constructor parameters, keyed by position,
//!   name, marker or type
//! - **Context**: The immutable registry of providers, addressable by identifier and by type
//! - **Lifecycle**: Dependency-ordered instantiate and start, reverse-ordered stop
//!
//! ## Basic Usage
//!
//! Registering providers and looking values up:
//!
//! ```rust
//! use rivet::{ContextBuilder, Provider, TypeName};
//!
//! let mut builder = ContextBuilder::new();
//! builder
//!     .add("database_url", Provider::value_of("sqlite::memory:".to_string()))
//!     .unwrap();
//! let context = builder.build();
//!
//! let url = context.get("database_url").unwrap();
//! assert_eq!(*url.downcast::<String>().unwrap(), "sqlite::memory:");
//!
//! let url = context.get_type(&TypeName::of::<String>()).unwrap();
//! assert_eq!(*url.downcast::<String>().unwrap(), "sqlite::memory:");
//! ```
//!
//! ## Constructors And Autowiring
//!
//! Callables are described by an [`Executable`]. Parameters without an
//! explicit rule are resolved by their declared type:
//!
//! ```rust
//! use std::sync::Arc;
//! use rivet::{Application, Executable, Parameter, Value, factory, arguments, value};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserRepository {
//!     database: Arc<Database>,
//! }
//!
//! let database = Executable::new("Database", |mut args| {
//!     Ok(Value::new(Database { url: args.take_cloned::<String>()? }))
//! })
//! .returns::<Database>()
//! .param(Parameter::new("url").typed::<String>());
//!
//! let repository = Executable::new("UserRepository", |mut args| {
//!     Ok(Value::new(UserRepository { database: args.take::<Database>()? }))
//! })
//! .returns::<UserRepository>()
//! .param(Parameter::new("database").typed::<Database>());
//!
//! let app = Application::builder()
//!     .define("url", value("postgresql://localhost:5432/mydb".to_string()))
//!     .define("database", factory(database, arguments()))
//!     .define("users", factory(repository, arguments()))
//!     .build()
//!     .unwrap();
//!
//! let users: Arc<UserRepository> = app.get_typed().unwrap();
//! assert_eq!(users.database.url, "postgresql://localhost:5432/mydb");
//! ```
//!
//! ## Using Macros
//!
//! With the `macros` feature enabled, constructors are generated:
//!
//! ```rust
//! use std::sync::Arc;
//! use rivet::{Application, Injectable, object, singleton, value};
//!
//! #[derive(Injectable)]
//! struct Database {
//!     url: String,
//! }
//!
//! #[derive(Injectable)]
//! struct UserRepository {
//!     database: Arc<Database>,
//! }
//!
//! let app = Application::builder()
//!     .define("url", value("postgresql://localhost:5432/mydb".to_string()))
//!     .define("database", singleton(object::<Database>()))
//!     .define("users", object::<UserRepository>())
//!     .build()
//!     .unwrap();
//!
//! app.start().unwrap();
//! let users: Arc<UserRepository> = app.get_typed().unwrap();
//! assert_eq!(users.database.url, "postgresql://localhost:5432/mydb");
//! app.stop().unwrap();
//! ```
//!
//! ## Features
//!
//! - `macros` (default): Enables `#[derive(Injectable)]` and `#[injectable]`

mod application;
mod arguments;
mod container;
mod context;
mod definition;
mod error;
mod implementation;
mod introspect;
mod lifecycle;
mod provider;
mod proxy;
mod resolver;
mod types;
mod value;

pub use application::*;
pub use arguments::*;
pub use container::*;
pub use context::*;
pub use definition::*;
pub use error::*;
pub use implementation::*;
pub use introspect::*;
pub use lifecycle::*;
pub use provider::*;
pub use proxy::*;
pub use resolver::*;
pub use types::*;
pub use value::*;

#[cfg(feature = "macros")]
pub use rivet_macros::*;
