use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

/// Open key/value map for caller diagnostics.
///
/// Values may be of any `'static` type. Reads are typed: asking for the
/// wrong type behaves exactly like asking for a missing key.
#[derive(Default)]
pub struct Metadata {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<V: Any + Send + Sync>(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), Box::new(value));
    }

    pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
        self.entries.get(key).and_then(|value| (**value).downcast_ref::<V>())
    }

    /// Untyped lookup
    pub fn get_any(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.entries.get(key).map(|value| &**value)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Debug for Metadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
