//! Ordered, key-normalizing multi-map with change notifications.
//!
//! [`MapStore`] backs request headers (as [`HeaderStore`]) and the query
//! parameters of an [`Address`](crate::Address). Insertion order is kept, so
//! serialized headers and query strings come out in the order they were set.

use crate::events::EventEmitter;
use crate::protocol::headers::join_values;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

/// Key normalization applied uniformly to every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyCase {
    /// Keys are compared verbatim
    #[default]
    Preserve,
    /// Keys are lowercased
    Lower,
    /// Keys are uppercased
    Upper,
}

impl KeyCase {
    fn apply(self, key: &str) -> String {
        match self {
            KeyCase::Preserve => key.to_string(),
            KeyCase::Lower => key.to_lowercase(),
            KeyCase::Upper => key.to_uppercase(),
        }
    }
}

/// Ordered map emitting `create`/`update`/`delete` events.
///
/// Events are named `<prefix>.create` etc. when a prefix is configured, or
/// plain `create` otherwise.
pub struct MapStore<V> {
    entries: Vec<(String, V)>,
    key_case: KeyCase,
    prefix: String,
    events: EventEmitter,
}

/// Header store: lowercase keys, `header.*` events.
pub type HeaderStore = MapStore<String>;

impl<V> MapStore<V>
where
    V: Clone + PartialEq + Serialize,
{
    /// Create an empty store.
    pub fn new(key_case: KeyCase, prefix: &str) -> Self {
        let prefix = prefix.trim().trim_end_matches('.');
        MapStore {
            entries: Vec::new(),
            key_case,
            prefix: if prefix.is_empty() {
                String::new()
            } else {
                format!("{}.", prefix)
            },
            events: EventEmitter::new(),
        }
    }

    /// Create a store seeded with entries. Seeding does not emit events.
    pub fn with_entries<K, I>(entries: I, key_case: KeyCase, prefix: &str) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut store = Self::new(key_case, prefix);
        for (key, value) in entries {
            let key = store.key(key.as_ref());
            match store.position(&key) {
                Some(i) => store.entries[i].1 = value,
                None => store.entries.push((key, value)),
            }
        }
        store
    }

    fn key(&self, name: &str) -> String {
        self.key_case.apply(name)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn event(&self, kind: &str) -> String {
        format!("{}{}", self.prefix, kind)
    }

    /// Observer list for this store
    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Key normalization mode
    pub fn key_case(&self) -> KeyCase {
        self.key_case
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value stored under `name`
    pub fn get(&self, name: &str) -> Option<&V> {
        let key = self.key(name);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Whether `name` is present
    pub fn has(&self, name: &str) -> bool {
        self.position(&self.key(name)).is_some()
    }

    /// Insert or replace a value.
    ///
    /// Setting an unchanged value is a no-op and emits nothing.
    pub fn set(&mut self, name: &str, value: V) {
        let key = self.key(name);
        match self.position(&key) {
            Some(i) => {
                if self.entries[i].1 == value {
                    return;
                }
                let old = std::mem::replace(&mut self.entries[i].1, value.clone());
                self.events.emit(
                    self.event("update"),
                    json!({ "name": name, "old": to_value(&old), "new": to_value(&value) }),
                );
            }
            None => {
                self.entries.push((key, value.clone()));
                self.events.emit(
                    self.event("create"),
                    json!({ "name": name, "value": to_value(&value) }),
                );
            }
        }
    }

    /// Remove `name`, returning its previous value.
    pub fn delete(&mut self, name: &str) -> Option<V> {
        let key = self.key(name);
        let i = self.position(&key)?;
        let (_, old) = self.entries.remove(i);
        self.events.emit(
            self.event("delete"),
            json!({ "name": name, "value": to_value(&old) }),
        );
        Some(old)
    }

    /// Remove every entry, emitting one `delete` per entry.
    pub fn clear(&mut self) {
        let drained: Vec<(String, V)> = self.entries.drain(..).collect();
        for (name, value) in drained {
            self.events.emit(
                self.event("delete"),
                json!({ "name": name, "value": to_value(&value) }),
            );
        }
    }

    /// Snapshot of all entries at call time
    pub fn entries(&self) -> Vec<(String, V)> {
        self.entries.clone()
    }

    /// Snapshot of all keys at call time
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of all values at call time
    pub fn values(&self) -> Vec<V> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Borrowing iterator over the current entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries as a JSON object.
    pub fn to_object(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), to_value(v)))
            .collect()
    }
}

impl MapStore<String> {
    /// Empty header store.
    pub fn headers() -> Self {
        Self::new(KeyCase::Lower, "header")
    }

    /// Header store seeded with `entries`.
    pub fn headers_from<K, V, I>(entries: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::with_entries(
            entries.into_iter().map(|(k, v)| (k, v.into())),
            KeyCase::Lower,
            "header",
        )
    }

    /// Append to an existing value with `", "`, or create it.
    pub fn append(&mut self, name: &str, value: &str) {
        let key = self.key(name);
        match self.position(&key) {
            Some(i) => {
                let old = self.entries[i].1.clone();
                let joined = join_values(&old, value);
                self.entries[i].1 = joined.clone();
                self.events.emit(
                    self.event("update"),
                    json!({ "name": name, "old": old, "new": joined }),
                );
            }
            None => {
                self.entries.push((key, value.to_string()));
                self.events.emit(
                    self.event("create"),
                    json!({ "name": name, "value": value }),
                );
            }
        }
    }
}

impl<V: Clone> Clone for MapStore<V> {
    /// Copies the entries; the clone starts with no listeners.
    fn clone(&self) -> Self {
        MapStore {
            entries: self.entries.clone(),
            key_case: self.key_case,
            prefix: self.prefix.clone(),
            events: EventEmitter::new(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for MapStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

fn to_value<V: Serialize>(value: &V) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
