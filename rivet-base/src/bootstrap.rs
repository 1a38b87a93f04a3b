use std::sync::Arc;

use rivet::{
    Application, CachingIntrospector, Definition, Definitions, Identifier, Introspector, StdError,
    TypeRegistry,
};
use serde::{Deserialize, Serialize};

use crate::{Config, ConfigSection, Tracing, TracingConfig};

/// The `container` configuration section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Instantiate and start the application on first access.
    #[serde(default)]
    pub auto_start: bool,
    /// Memoize type ancestry lookups.
    #[serde(default = "default_cache_introspection")]
    pub cache_introspection: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            auto_start: false,
            cache_introspection: default_cache_introspection(),
        }
    }
}

impl ConfigSection for ContainerConfig {
    fn key() -> &'static str {
        "container"
    }
}

fn default_cache_introspection() -> bool {
    true
}

/// Identifier under which the [`Config`] is registered.
pub const CONFIG_ID: &str = "config";
/// Identifier under which the [`Tracing`] handle is registered.
pub const TRACING_ID: &str = "tracing";

/// Builds an [`Application`] from a [`Config`].
///
/// The config itself is registered under [`CONFIG_ID`]. When tracing is
/// enabled and the config has a `tracing` section, the subscriber is
/// installed and its handle registered under [`TRACING_ID`].
///
/// # Examples
///
/// ```rust
/// use rivet::value;
/// use rivet_base::{Bootstrap, Config, ContainerConfig};
///
/// let config = Config::new().with("container", ContainerConfig {
///     auto_start: true,
///     ..Default::default()
/// });
///
/// let app = Bootstrap::new(config)
///     .define("port", value(8080u16))
///     .build()
///     .unwrap();
///
/// let port = app.get("port").unwrap();
/// assert_eq!(*port.downcast::<u16>().unwrap(), 8080);
/// assert_eq!(app.status(), rivet::Status::Running);
/// ```
pub struct Bootstrap {
    config: Config,
    definitions: Definitions,
    introspector: Option<Arc<dyn Introspector>>,
    tracing: bool,
    pending: Vec<(Identifier, Definition)>,
}

impl Bootstrap {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            definitions: Definitions::new(),
            introspector: None,
            tracing: false,
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn definitions(mut self, definitions: Definitions) -> Self {
        self.definitions = definitions;
        self
    }

    /// Registers `definition` under `id`; conflicts are reported by [`Bootstrap::build`].
    pub fn define(mut self, id: impl Into<Identifier>, definition: impl Into<Definition>) -> Self {
        self.pending.push((id.into(), definition.into()));
        self
    }

    pub fn introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Installs the global tracing subscriber from the `tracing` section.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }

    pub fn build(self) -> Result<Application, StdError> {
        let container: ContainerConfig = self.config.section_or_default()?;
        let mut definitions = self.definitions;
        for (id, definition) in self.pending {
            definitions.define(id, definition)?;
        }
        if self.tracing
            && let Some(config) = self.config.get::<Option<TracingConfig>>(TracingConfig::key())?
        {
            definitions.define(TRACING_ID, rivet::value(Tracing::init(&config)?))?;
        }
        definitions.define(CONFIG_ID, rivet::value(self.config))?;

        let introspector = self
            .introspector
            .unwrap_or_else(|| Arc::new(TypeRegistry::new()));
        let introspector: Arc<dyn Introspector> = if container.cache_introspection {
            Arc::new(CachingIntrospector::new(introspector))
        } else {
            introspector
        };
        tracing::debug!(
            "Bootstrapping application with {} definition(s)",
            definitions.len()
        );
        Ok(Application::builder()
            .definitions(definitions)
            .introspector(introspector)
            .auto_start(container.auto_start)
            .build()?)
    }
}
