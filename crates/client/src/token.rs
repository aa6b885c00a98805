//! Auth token persistence seam.

use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A simple string key-value store for the renewed auth token.
pub trait TokenStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// A shared store, so the embedding application can read the token the
/// client persisted.
impl<T: TokenStore> TokenStore for Rc<RefCell<T>> {
    fn get(&self, key: &str) -> Option<String> {
        self.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.borrow_mut().set(key, value);
    }
}

/// Reads the saved token under `key`. An empty stored value counts as none.
pub fn saved_token(store: &dyn TokenStore, key: &str) -> Option<String> {
    store.get(key).filter(|token| !token.is_empty())
}

/// Process-local token store.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore {
    entries: HashMap<String, String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one entry.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut store = Self::new();
        store.set(key, value);
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}
