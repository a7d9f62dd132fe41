//! Named store lookup.
//!
//! The registry is an ordinary value owned by whatever sets up the UI layer;
//! there is no process-wide instance.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Id used when callers don't name a store.
pub const DEFAULT_STORE_ID: &str = "default";

#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: HashMap<String, Store>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `id` (or [`DEFAULT_STORE_ID`]). Fails if the id
    /// is taken.
    pub fn set_store(&mut self, store: Store, id: Option<&str>) -> Result<()> {
        let id = id.unwrap_or(DEFAULT_STORE_ID);
        if self.stores.contains_key(id) {
            return Err(StoreError::DuplicateStore {
                store_id: id.to_owned(),
            });
        }
        debug!(store_id = id, instance = %store.instance_id(), "store registered");
        self.stores.insert(id.to_owned(), store);
        Ok(())
    }

    /// Look up a store by id (or [`DEFAULT_STORE_ID`]).
    pub fn get_store(&self, id: Option<&str>) -> Result<Store> {
        let id = id.unwrap_or(DEFAULT_STORE_ID);
        self.stores
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::StoreNotFound {
                store_id: id.to_owned(),
            })
    }

    pub fn remove_store(&mut self, id: Option<&str>) -> Option<Store> {
        self.stores.remove(id.unwrap_or(DEFAULT_STORE_ID))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
