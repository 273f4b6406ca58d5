use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{ListKey, ListStore, StorageError};

/// In-memory [`ListStore`]. Clones share the same lists.
#[derive(Debug, Clone, Default)]
pub struct MemoryListStore {
    lists: Arc<Mutex<HashMap<ListKey, Vec<String>>>>,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lists(&self) -> std::sync::MutexGuard<'_, HashMap<ListKey, Vec<String>>> {
        // A poisoned map still holds consistent whole-list values.
        self.lists.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ListStore for MemoryListStore {
    async fn load(&self, key: &ListKey) -> Result<Vec<String>, StorageError> {
        Ok(self.lists().get(key).cloned().unwrap_or_default())
    }

    async fn save(&self, key: &ListKey, items: &[String]) -> Result<(), StorageError> {
        self.lists().insert(key.clone(), items.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &ListKey) -> Result<(), StorageError> {
        self.lists().remove(key);
        Ok(())
    }
}
