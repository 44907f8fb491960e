//! Durable key-value storage seam
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

/// Trait for abstracting the local durable store (one JSON string per key).
/// Platform-specific implementations should provide this
pub trait KeyValueStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Write `value` under `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Remove `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be removed.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// In-memory store for tests and native tooling. Clones share one map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing any serialization.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.get_raw(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.insert_raw(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Read and parse a JSON value, falling back to the default when the key is
/// missing, unreadable or corrupt. Failures are logged, never returned.
pub(crate) fn load_json_or_default<S, T>(storage: &S, key: &str) -> T
where
    S: KeyValueStore,
    T: serde::de::DeserializeOwned + Default,
{
    match storage.read(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            log::warn!("discarding corrupt data under {key}: {err}");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(err) => {
            log::warn!("failed to read {key}: {err}");
            T::default()
        }
    }
}

/// Serialize and write a JSON value, logging failures.
pub(crate) fn save_json<S, T>(storage: &S, key: &str, value: &T) -> bool
where
    S: KeyValueStore,
    T: serde::Serialize,
{
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(err) => {
            log::error!("failed to serialize {key}: {err}");
            return false;
        }
    };
    match storage.write(key, &raw) {
        Ok(()) => true,
        Err(err) => {
            log::error!("failed to persist {key}: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_shares_entries_between_clones() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.write("k", "v").unwrap();
        assert_eq!(other.read("k").unwrap().as_deref(), Some("v"));
        other.remove("k").unwrap();
        assert!(!store.contains("k"));
    }

    #[test]
    fn corrupt_json_falls_back_to_default() {
        let store = MemoryStore::new();
        store.insert_raw("k", "{not json");
        let value: Vec<String> = load_json_or_default(&store, "k");
        assert!(value.is_empty());
        let missing: Vec<String> = load_json_or_default(&store, "missing");
        assert!(missing.is_empty());
    }

    #[test]
    fn save_json_writes_through() {
        let store = MemoryStore::new();
        assert!(save_json(&store, "k", &vec!["a"]));
        assert_eq!(store.get_raw("k").as_deref(), Some(r#"["a"]"#));
    }
}
