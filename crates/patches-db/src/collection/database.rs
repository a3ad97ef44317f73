//! Database: a named registry of datasets.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, StorageError};

use super::dataset::{Dataset, WeakDataset};

/// A registry slot. Datasets created by name are owned by the database;
/// derived datasets are listed only while some handle keeps them alive.
pub(crate) enum Entry {
    Owned(Dataset),
    Derived(WeakDataset),
}

impl Entry {
    fn get(&self) -> Option<Dataset> {
        match self {
            Entry::Owned(dataset) => Some(dataset.clone()),
            Entry::Derived(weak) => weak.upgrade(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Entry::Owned(_) => true,
            Entry::Derived(weak) => weak.is_alive(),
        }
    }
}

pub(crate) type Registry = Mutex<BTreeMap<String, Entry>>;

/// Registry of datasets by name. Cloning shares the registry.
///
/// Datasets hold a weak reference back to their registry, so deleting a
/// dataset through any handle also unregisters it.
#[derive(Clone, Default)]
pub struct Database {
    datasets: Arc<Registry>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("datasets", &self.list_datasets())
            .finish()
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_registry(datasets: Arc<Registry>) -> Self {
        Self { datasets }
    }

    /// Create a dataset owned by the database: it stays registered until it
    /// is deleted.
    pub fn create_dataset(&self, name: &str) -> Result<Dataset> {
        self.register(name, true)
    }

    /// Create a dataset derived from another one. The registry does not keep
    /// it alive: once every handle is dropped it is no longer listed.
    pub(crate) fn create_derived_dataset(&self, name: &str) -> Result<Dataset> {
        self.register(name, false)
    }

    fn register(&self, name: &str, owned: bool) -> Result<Dataset> {
        let mut datasets = self.datasets.lock();
        if datasets.get(name).is_some_and(Entry::is_alive) {
            return Err(StorageError::DatasetExists(name.to_string()).into());
        }
        let dataset = Dataset::with_registry(name.to_string(), Arc::downgrade(&self.datasets));
        let entry = if owned {
            Entry::Owned(dataset.clone())
        } else {
            Entry::Derived(dataset.downgrade())
        };
        datasets.insert(name.to_string(), entry);
        debug!(dataset = name, owned, "created dataset");
        Ok(dataset)
    }

    pub fn load_dataset(&self, name: &str) -> Result<Dataset> {
        let mut datasets = self.datasets.lock();
        match datasets.get(name).and_then(Entry::get) {
            Some(dataset) => Ok(dataset),
            None => {
                datasets.remove(name);
                Err(StorageError::DatasetNotFound(name.to_string()).into())
            }
        }
    }

    pub fn dataset_exists(&self, name: &str) -> bool {
        self.datasets.lock().get(name).is_some_and(Entry::is_alive)
    }

    /// Names of the registered datasets, in order. Derived datasets with no
    /// live handle are pruned.
    pub fn list_datasets(&self) -> Vec<String> {
        let mut datasets = self.datasets.lock();
        datasets.retain(|_, entry| entry.is_alive());
        datasets.keys().cloned().collect()
    }

    pub fn delete_dataset(&self, name: &str) -> Result<()> {
        // Clone the handle out first: `Dataset::delete` takes the registry lock.
        let dataset = self.load_dataset(name)?;
        dataset.delete()
    }
}

// ============================================================================
// Tests
// ============================================================================
