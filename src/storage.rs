//! Contextual Storage
//!
//! Ambient key/value storage with two backends:
//!
//! - [`SharedStorage`] - one map shared by every clone of the handle
//! - [`ThreadStorage`] - one map per thread
//!
//! Either can back a token through [`contextual_token`].

use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use solder_tokens::{BoxError, ContextualDynamicValue};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Contextual storage lock poisoned")]
    Poisoned,
}

/// How keys are compared.
///
/// `IgnoreCase` folds ASCII letters only, matching the tokenizer's
/// case-insensitive lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyComparison {
    #[default]
    Ordinal,
    IgnoreCase,
}

impl KeyComparison {
    fn normalize(self, key: &str) -> String {
        match self {
            Self::Ordinal => key.to_string(),
            Self::IgnoreCase => key.to_ascii_lowercase(),
        }
    }
}

/// Ambient key/value storage.
pub trait ContextualStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn remove(&self, key: &str) -> Option<Value>;
    fn clear(&self);
    /// Stored keys, sorted.
    fn keys(&self) -> Vec<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

// =============================================================================
// SHARED
// =============================================================================

/// Storage shared across threads through cloned handles.
#[derive(Debug, Clone, Default)]
pub struct SharedStorage {
    inner: Arc<RwLock<HashMap<String, Value>>>,
    comparison: KeyComparison,
}

impl SharedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comparison(comparison: KeyComparison) -> Self {
        Self {
            inner: Arc::default(),
            comparison,
        }
    }

    /// Like [`ContextualStorage::get`], reporting a poisoned lock.
    pub fn try_get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let map = self.inner.read().map_err(|_| StorageError::Poisoned)?;
        Ok(map.get(&self.comparison.normalize(key)).cloned())
    }

    /// Like [`ContextualStorage::set`], reporting a poisoned lock.
    pub fn try_set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut map = self.inner.write().map_err(|_| StorageError::Poisoned)?;
        map.insert(self.comparison.normalize(key), value);
        Ok(())
    }
}

impl ContextualStorage for SharedStorage {
    fn get(&self, key: &str) -> Option<Value> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&self.comparison.normalize(key)).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(self.comparison.normalize(key), value);
    }

    fn remove(&self, key: &str) -> Option<Value> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(&self.comparison.normalize(key))
    }

    fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn keys(&self) -> Vec<String> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }
}

// =============================================================================
// THREAD-LOCAL
// =============================================================================

thread_local! {
    static THREAD_VALUES: RefCell<HashMap<String, Value>> = RefCell::new(HashMap::new());
}

/// Storage private to the calling thread.
///
/// All `ThreadStorage` handles on one thread see the same map.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadStorage {
    comparison: KeyComparison,
}

impl ThreadStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comparison(comparison: KeyComparison) -> Self {
        Self { comparison }
    }
}

impl ContextualStorage for ThreadStorage {
    fn get(&self, key: &str) -> Option<Value> {
        let key = self.comparison.normalize(key);
        THREAD_VALUES.with(|values| values.borrow().get(&key).cloned())
    }

    fn set(&self, key: &str, value: Value) {
        let key = self.comparison.normalize(key);
        THREAD_VALUES.with(|values| {
            values.borrow_mut().insert(key, value);
        });
    }

    fn remove(&self, key: &str) -> Option<Value> {
        let key = self.comparison.normalize(key);
        THREAD_VALUES.with(|values| values.borrow_mut().remove(&key))
    }

    fn clear(&self) {
        THREAD_VALUES.with(|values| values.borrow_mut().clear());
    }

    fn keys(&self) -> Vec<String> {
        THREAD_VALUES.with(|values| {
            let mut keys: Vec<String> = values.borrow().keys().cloned().collect();
            keys.sort();
            keys
        })
    }
}

// =============================================================================
// TOKEN BRIDGE
// =============================================================================

/// Token strategy that reads `key` from `storage` at expansion time.
pub fn contextual_token(
    storage: Arc<dyn ContextualStorage>,
    key: impl Into<String>,
) -> ContextualDynamicValue<dyn ContextualStorage> {
    let key = key.into();
    ContextualDynamicValue::new(storage, move |storage, _args| {
        storage
            .get(&key)
            .ok_or_else(|| BoxError::from(format!("no contextual value for '{key}'")))
    })
}
