//! # State Keeper
//!
//! Saves and restores a component's transient state across process death.
//!
//! A component registers a supplier under a key; when the host asks for a
//! [`SavedState`] every supplier is called and its output serialized with
//! serde. On recreation the host hands the saved document back, and each key
//! can be consumed exactly once.
//!
//! Consuming a key whose payload no longer deserializes into the requested
//! type logs a warning and yields `None`, so callers fall back to defaults
//! instead of resurrecting half a state.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::KeeperError;

/// Opaque saved-state document: key -> serialized payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    entries: BTreeMap<String, serde_json::Value>,
}

impl SavedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

type Supplier = Rc<dyn Fn() -> Result<serde_json::Value, serde_json::Error>>;

struct StateKeeperInner {
    saved: BTreeMap<String, serde_json::Value>,
    suppliers: BTreeMap<String, Supplier>,
}

/// Shared handle; clones see the same registrations.
#[derive(Clone)]
pub struct StateKeeper {
    inner: Rc<RefCell<StateKeeperInner>>,
}

impl Default for StateKeeper {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StateKeeper {
    pub fn new(saved: Option<SavedState>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StateKeeperInner {
                saved: saved.map(|s| s.entries).unwrap_or_default(),
                suppliers: BTreeMap::new(),
            })),
        }
    }

    /// Takes the saved payload for `key`. A second call returns `None`.
    pub fn consume<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.inner.borrow_mut().saved.remove(key)?;
        match serde_json::from_value(value) {
            Ok(restored) => Some(restored),
            Err(e) => {
                warn!("Discarding saved state for '{}': {}", key, e);
                None
            }
        }
    }

    pub fn register<T, F>(&self, key: &str, supplier: F) -> Result<(), KeeperError>
    where
        T: Serialize,
        F: Fn() -> T + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        if inner.suppliers.contains_key(key) {
            return Err(KeeperError::AlreadyRegistered(key.to_string()));
        }
        inner
            .suppliers
            .insert(key.to_string(), Rc::new(move || serde_json::to_value(supplier())));
        Ok(())
    }

    pub fn unregister(&self, key: &str) {
        self.inner.borrow_mut().suppliers.remove(key);
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.inner.borrow().suppliers.contains_key(key)
    }

    /// Calls every registered supplier. Suppliers that fail to serialize are
    /// skipped with a warning.
    pub fn save(&self) -> SavedState {
        let suppliers: Vec<(String, Supplier)> = self
            .inner
            .borrow()
            .suppliers
            .iter()
            .map(|(k, s)| (k.clone(), Rc::clone(s)))
            .collect();

        let mut saved = SavedState::new();
        for (key, supplier) in suppliers {
            match supplier() {
                Ok(value) => saved.insert(key, value),
                Err(e) => warn!("Failed to save state for '{}': {}", key, e),
            }
        }
        debug!("Saved {} state entries", saved.len());
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Scroll {
        offset: u32,
    }

    #[test]
    fn test_save_then_consume_restores_value() {
        let keeper = StateKeeper::new(None);
        keeper.register("scroll", || Scroll { offset: 42 }).unwrap();

        let saved = keeper.save();
        let restored = StateKeeper::new(Some(saved));

        assert_eq!(restored.consume::<Scroll>("scroll"), Some(Scroll { offset: 42 }));
    }

    #[test]
    fn test_consume_is_single_shot() {
        let mut saved = SavedState::new();
        saved.insert("n", serde_json::json!(7));
        let keeper = StateKeeper::new(Some(saved));

        assert_eq!(keeper.consume::<u32>("n"), Some(7));
        assert_eq!(keeper.consume::<u32>("n"), None);
    }

    #[test]
    fn test_consume_with_wrong_shape_yields_none() {
        let mut saved = SavedState::new();
        saved.insert("scroll", serde_json::json!("not a struct"));
        let keeper = StateKeeper::new(Some(saved));

        assert_eq!(keeper.consume::<Scroll>("scroll"), None);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let keeper = StateKeeper::new(None);
        keeper.register("a", || 1).unwrap();

        let err = keeper.register("a", || 2).unwrap_err();
        assert!(matches!(err, KeeperError::AlreadyRegistered(ref k) if k == "a"));
    }

    #[test]
    fn test_save_reads_latest_value_from_supplier() {
        let keeper = StateKeeper::new(None);
        let counter = Rc::new(Cell::new(1u32));
        let source = Rc::clone(&counter);
        keeper.register("count", move || source.get()).unwrap();

        counter.set(5);

        let restored = StateKeeper::new(Some(keeper.save()));
        assert_eq!(restored.consume::<u32>("count"), Some(5));
    }

    #[test]
    fn test_unregistered_supplier_is_not_saved() {
        let keeper = StateKeeper::new(None);
        keeper.register("a", || 1).unwrap();
        keeper.unregister("a");

        assert!(!keeper.is_registered("a"));
        assert!(keeper.save().is_empty());
    }

    #[test]
    fn test_saved_state_json_round_trip() {
        let mut saved = SavedState::new();
        saved.insert("k", serde_json::json!({ "nested": [1, 2, 3] }));

        let json = saved.to_json().unwrap();
        assert_eq!(SavedState::from_json(&json).unwrap(), saved);
    }
}
