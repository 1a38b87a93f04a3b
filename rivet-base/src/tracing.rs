use std::str::FromStr as _;
use std::sync::Mutex;

use rivet::StdError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{Registry, reload};

use crate::ConfigSection;

/// Handle of the installed tracing subscriber.
///
/// Keeps the configured directives so the level can be changed at runtime
/// without losing them.
pub struct Tracing {
    default_level: tracing::Level,
    directives: Vec<Directive>,
    level: Mutex<tracing::Level>,
    reload_handle: reload::Handle<EnvFilter, Registry>,
}

impl Tracing {
    /// Installs a registry with a reloadable [`EnvFilter`] and a fmt layer.
    ///
    /// Fails if a global subscriber is already installed.
    pub fn init(config: &TracingConfig) -> Result<Self, StdError> {
        let mut directives = Vec::new();
        for directive in &config.directives {
            directives.push(directive.parse::<Directive>()?);
        }
        let (env_filter, reload_handle) =
            reload::Layer::new(new_env_filter(&directives, config.level));
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::Layer::default())
            .try_init()?;
        tracing::debug!("Tracing initialized with level {}", config.level);
        Ok(Self {
            default_level: config.level,
            directives,
            level: Mutex::new(config.level),
            reload_handle,
        })
    }

    pub fn level(&self) -> tracing::Level {
        *self.level.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Replaces the global level, keeping the configured directives.
    pub fn set_level(&self, level: tracing::Level) -> Result<(), StdError> {
        self.reload_handle
            .reload(new_env_filter(&self.directives, level))?;
        *self.level.lock().unwrap_or_else(|err| err.into_inner()) = level;
        Ok(())
    }

    /// Parses `level` and applies it; `None` restores the configured level.
    pub fn set_level_str(&self, level: Option<&str>) -> Result<(), StdError> {
        let level = match level {
            Some(v) => tracing::Level::from_str(v)?,
            None => self.default_level,
        };
        self.set_level(level)
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directives: Default::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(
        serialize_with = "serialize_level",
        deserialize_with = "deserialize_level",
        default = "default_level"
    )]
    pub level: tracing::Level,
    #[serde(default)]
    pub directives: Vec<String>,
}

impl ConfigSection for TracingConfig {
    fn key() -> &'static str {
        "tracing"
    }
}

fn new_env_filter(directives: &[Directive], level: tracing::Level) -> EnvFilter {
    let mut filter = EnvFilter::default();
    for directive in directives {
        filter = filter.add_directive(directive.clone());
    }
    filter.add_directive(level.into())
}

fn serialize_level<S>(v: &tracing::Level, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(v.as_str())
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<tracing::Level, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    String::deserialize(deserializer)
        .and_then(|v| tracing::Level::from_str(&v).map_err(|v| Error::custom(format!("{v}"))))
}

fn default_level() -> tracing::Level {
    tracing::Level::DEBUG
}
