//! # rivet-base
//!
//! Base services for rivet applications: typed JSON configuration, tracing
//! setup and a bootstrap that builds an [`Application`](rivet::Application)
//! from configuration.
//!
//! ## Core Components
//!
//! - **Configuration System**: Type-safe configuration loading and merging from multiple sources
//! - **Tracing Integration**: Structured logging with a runtime adjustable level
//! - **Bootstrap**: Application assembly driven by the `container` section
//!
//! ## Configuration Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rivet::Application;
//! use rivet_base::{Config, ConfigSection};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct DatabaseConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl ConfigSection for DatabaseConfig {
//!     fn key() -> &'static str {
//!         "database"
//!     }
//! }
//!
//! let config = Config::new().with("database", DatabaseConfig {
//!     host: "localhost".to_string(),
//!     port: 5432,
//! });
//!
//! let app = Application::builder()
//!     .define("database_config", config.definition::<DatabaseConfig>().unwrap())
//!     .build()
//!     .unwrap();
//!
//! let db_config: Arc<DatabaseConfig> = app.get_typed().unwrap();
//! assert_eq!(db_config.port, 5432);
//! ```
//!
//! ## Features
//!
//! - `macros` (default): Enables the `#[config_section("key")]` macro

mod bootstrap;
mod config;
mod tracing;

pub use bootstrap::*;
pub use config::*;
pub use tracing::*;

#[cfg(feature = "macros")]
pub use rivet_macros::config_section;
