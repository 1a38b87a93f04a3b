use crate::{Definition, TypeName};

/// Immutable set of parameter binding rules.
///
/// Rules are keyed by position, name, marker or type. Every `with`-style
/// method returns a new set and leaves `self` untouched, so one set can be
/// shared as the base of several definitions.
///
/// # Examples
///
/// ```rust
/// use rivet::{arguments, value};
///
/// let base = arguments().name("host", value("localhost".to_string()));
/// let local = base.index(1, value(8080u16));
///
/// assert!(base.by_index(1).is_none());
/// assert!(local.by_index(1).is_some());
/// assert!(local.by_name("host").is_some());
/// ```
#[derive(Clone, Default)]
pub struct Arguments {
    indexed: Vec<(usize, Definition)>,
    named: Vec<(String, Definition)>,
    marked: Vec<(String, Definition)>,
    typed: Vec<(TypeName, Definition)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the parameter at `position`.
    pub fn index(&self, position: usize, definition: impl Into<Definition>) -> Self {
        let mut arguments = self.clone();
        upsert(&mut arguments.indexed, position, definition.into());
        arguments
    }

    /// Binds the parameter called `name`.
    pub fn name(&self, name: impl Into<String>, definition: impl Into<Definition>) -> Self {
        let mut arguments = self.clone();
        upsert(&mut arguments.named, name.into(), definition.into());
        arguments
    }

    /// Binds every parameter carrying `marker`.
    pub fn marker(&self, marker: impl Into<String>, definition: impl Into<Definition>) -> Self {
        let mut arguments = self.clone();
        upsert(&mut arguments.marked, marker.into(), definition.into());
        arguments
    }

    /// Binds every parameter declared as `ty` or as one of its ancestors.
    pub fn of_type(&self, ty: impl Into<TypeName>, definition: impl Into<Definition>) -> Self {
        let mut arguments = self.clone();
        upsert(&mut arguments.typed, ty.into(), definition.into());
        arguments
    }

    /// Same as [`Arguments::of_type`] for the Rust type `T`.
    pub fn typed<T>(&self, definition: impl Into<Definition>) -> Self
    where
        T: ?Sized + 'static,
    {
        self.of_type(TypeName::of::<T>(), definition)
    }

    /// Returns the union of both sets; rules of `other` replace rules of
    /// `self` with the same key.
    pub fn merge(&self, other: &Arguments) -> Self {
        let mut arguments = self.clone();
        for (key, definition) in &other.indexed {
            upsert(&mut arguments.indexed, *key, definition.clone());
        }
        for (key, definition) in &other.named {
            upsert(&mut arguments.named, key.clone(), definition.clone());
        }
        for (key, definition) in &other.marked {
            upsert(&mut arguments.marked, key.clone(), definition.clone());
        }
        for (key, definition) in &other.typed {
            upsert(&mut arguments.typed, key.clone(), definition.clone());
        }
        arguments
    }

    pub fn by_index(&self, position: usize) -> Option<&Definition> {
        find(&self.indexed, &position)
    }

    pub fn by_name(&self, name: &str) -> Option<&Definition> {
        self.named
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, definition)| definition)
    }

    pub fn by_marker(&self, marker: &str) -> Option<&Definition> {
        self.marked
            .iter()
            .find(|(key, _)| key == marker)
            .map(|(_, definition)| definition)
    }

    /// Type rules in insertion order.
    pub fn type_rules(&self) -> impl Iterator<Item = (&TypeName, &Definition)> {
        self.typed.iter().map(|(ty, definition)| (ty, definition))
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty()
            && self.named.is_empty()
            && self.marked.is_empty()
            && self.typed.is_empty()
    }
}

fn upsert<K: PartialEq>(rules: &mut Vec<(K, Definition)>, key: K, definition: Definition) {
    match rules.iter_mut().find(|(existing, _)| *existing == key) {
        Some(rule) => rule.1 = definition,
        None => rules.push((key, definition)),
    }
}

fn find<'a, K: PartialEq>(rules: &'a [(K, Definition)], key: &K) -> Option<&'a Definition> {
    rules
        .iter()
        .find(|(existing, _)| existing == key)
        .map(|(_, definition)| definition)
}
