use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rivet::Definition;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as Json;
use thiserror::Error;

/// Errors raised while reading or decoding configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config document: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Invalid config entry '{key}': {source}")]
    Entry {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON document of named configuration entries.
///
/// Every top-level key is an entry; typed sections are entries whose key is
/// given by [`ConfigSection::key`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    entries: BTreeMap<String, Json>,
}

/// A typed configuration section stored under a fixed key.
pub trait ConfigSection: DeserializeOwned {
    fn key() -> &'static str;
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: impl AsRef<str>) -> Result<Self, ConfigError> {
        serde_json::from_str(text.as_ref()).map_err(ConfigError::Parse)
    }

    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::parse(text)
    }

    /// Decodes the entry `key`; a missing entry decodes from `null`.
    pub fn get<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        let entry = self.entries.get(key).cloned().unwrap_or_default();
        serde_json::from_value(entry).map_err(|source| ConfigError::Entry {
            key: key.to_string(),
            source,
        })
    }

    pub fn set<T>(&mut self, key: impl Into<String>, value: T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(entry) => {
                self.entries.insert(key, entry);
                Ok(())
            }
            Err(source) => Err(ConfigError::Entry { key, source }),
        }
    }

    /// Builder form of [`Config::set`]. An entry that cannot be encoded is
    /// logged and left out.
    pub fn with<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Serialize,
    {
        if let Err(err) = self.set(key, value) {
            tracing::warn!("Skipping config entry: {err}");
        }
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Overlays `other` on top of `self`.
    ///
    /// Objects merge key by key, arrays are appended and anything else is
    /// replaced by the overlay.
    pub fn merge_from(&mut self, other: Self) {
        for (key, overlay) in other.entries {
            match self.entries.get_mut(&key) {
                Some(entry) => overlay_json(entry, overlay),
                None => {
                    self.entries.insert(key, overlay);
                }
            }
        }
    }

    /// Decodes the section `T`.
    pub fn section<T>(&self) -> Result<T, ConfigError>
    where
        T: ConfigSection,
    {
        self.get(T::key())
    }

    /// Decodes the section `T`, falling back to its default when absent.
    pub fn section_or_default<T>(&self) -> Result<T, ConfigError>
    where
        T: ConfigSection + Default,
    {
        Ok(self.get::<Option<T>>(T::key())?.unwrap_or_default())
    }

    /// Decodes the section `T` into a value definition, so it can be injected.
    pub fn definition<T>(&self) -> Result<Definition, ConfigError>
    where
        T: ConfigSection + Send + Sync + 'static,
    {
        Ok(rivet::value(self.section::<T>()?))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn overlay_json(base: &mut Json, overlay: Json) {
    match (base, overlay) {
        (Json::Object(base), Json::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(entry) => overlay_json(entry, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Json::Array(base), Json::Array(overlay)) => base.extend(overlay),
        (base, overlay) => *base = overlay,
    }
}
