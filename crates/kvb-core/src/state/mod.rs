//! Shared mutable context of one build.
//!
//! Steps communicate only through well-known keys (see
//! [`kvb_model::constants`]). Values are type-erased; reading a key with
//! the wrong type behaves as if the key were absent.
use std::{any::Any, collections::HashMap, fmt};

#[derive(Default)]
pub struct StateBag {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl StateBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value.
    pub fn put<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.values.insert(key.into(), Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key)?.downcast_mut::<T>()
    }

    /// String value of `key`, if present and non-empty.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get::<String>(key)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Append to a `Vec<T>` stored under `key`, creating it if needed.
    pub fn append<T>(&mut self, key: &str, item: T)
    where
        T: Any + Send + Sync,
    {
        match self.get_mut::<Vec<T>>(key) {
            Some(list) => list.push(item),
            None => self.put(key, vec![item]),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for StateBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("StateBag").field("keys", &keys).finish()
    }
}
