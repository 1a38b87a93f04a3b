use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Key of a provider registered in a [`Context`](crate::Context).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Arc<str>);

impl Identifier {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&String> for Identifier {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl From<&Identifier> for Identifier {
    fn from(value: &Identifier) -> Self {
        value.clone()
    }
}

/// Declared type of a provider result or of a parameter.
///
/// Two type names are equal when their normalized keys are equal: the
/// comparison ignores case and a single leading `::` path separator, so
/// `::app::Database`, `app::Database` and `APP::DATABASE` denote the same type.
#[derive(Clone)]
pub struct TypeName {
    name: Arc<str>,
    key: Arc<str>,
}

impl TypeName {
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        Self {
            key: Arc::from(normalize(name)),
            name: Arc::from(name),
        }
    }

    /// Returns the type name of `T` as reported by [`std::any::type_name`].
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self::new(std::any::type_name::<T>())
    }

    /// The name as it was spelled at registration.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The normalized comparison key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

fn normalize(name: &str) -> String {
    name.strip_prefix("::").unwrap_or(name).to_lowercase()
}

impl PartialEq for TypeName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TypeName {}

impl Hash for TypeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeName({:?})", &*self.name)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&TypeName> for TypeName {
    fn from(value: &TypeName) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_normalization() {
        assert_eq!(TypeName::new("::app::Database"), TypeName::new("app::database"));
        assert_eq!(TypeName::new("APP::DATABASE"), TypeName::new("app::Database"));
        assert_ne!(TypeName::new("::::app::Database"), TypeName::new("app::Database"));
        assert_eq!(TypeName::new("::app::Database").to_string(), "::app::Database");
    }

    #[test]
    fn test_type_name_of() {
        struct Local;
        assert_eq!(TypeName::of::<Local>().as_str(), std::any::type_name::<Local>());
    }
}
