//! `localStorage`-backed key-value store

use cryptotrace_engine::KeyValueStore;

use crate::dom;

/// Key-value store over `window.localStorage`. The handle is looked up on
/// every call so a store can be created before the page has a window.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStore;

#[derive(Debug, thiserror::Error)]
pub enum WebStorageError {
    #[error("localStorage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LocalStore {
    fn storage() -> Result<web_sys::Storage, WebStorageError> {
        dom::local_storage().map_err(|err| WebStorageError::Unavailable(dom::js_error_message(&err)))
    }
}

impl KeyValueStore for LocalStore {
    type Error = WebStorageError;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Self::storage()?
            .get_item(key)
            .map_err(|err| WebStorageError::Storage(dom::js_error_message(&err)))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|err| WebStorageError::Storage(dom::js_error_message(&err)))
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        Self::storage()?
            .remove_item(key)
            .map_err(|err| WebStorageError::Storage(dom::js_error_message(&err)))
    }
}
