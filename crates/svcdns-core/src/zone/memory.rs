// # Memory Zone Store
//
// In-memory implementation of ZoneStore.
//
// ## Purpose
//
// Holds records in a map and behaves like a remote store from the
// reconciler's point of view: it assigns identifiers on create, answers
// exact-match field queries and removes records by identifier.
//
// ## When to Use
//
// - Testing the reconciler without a network
// - Dry experiments with the full binary (`ZoneStoreConfig::Memory`)
//
// Nothing survives the process.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::ZoneStoreConfig;
use crate::model::{ManagedRecord, RecordField};
use crate::traits::zone_store::{ZoneStore, ZoneStoreFactory};
use crate::Error;

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<u64, ManagedRecord>,
    next_id: u64,
}

impl Inner {
    fn insert(&mut self, mut record: ManagedRecord) -> ManagedRecord {
        self.next_id += 1;
        let key = self.next_id;
        // RouterOS-style identifiers: '*' followed by a hex counter
        record.id = format!("*{:X}", key);
        self.records.insert(key, record.clone());
        record
    }
}

/// In-memory zone store implementation
///
/// Clones share the same underlying records, so a test can keep one handle
/// for assertions while the reconciler owns another.
///
/// # Example
///
/// ```rust,no_run
/// use svcdns_core::{ManagedRecord, MemoryZoneStore, RecordField, ZoneStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryZoneStore::new();
///
///     let created = store
///         .create(ManagedRecord::address("web.example.com", "10.0.0.1", "dns"))
///         .await?;
///     assert_eq!(created.id, "*1");
///
///     let found = store.list_by_field(RecordField::Comment, "dns").await?;
///     assert_eq!(found.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryZoneStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryZoneStore {
    /// Create a new empty memory zone store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as if it already existed in the zone
    ///
    /// Any identifier on the input is replaced by a fresh one.
    pub async fn seed(&self, record: ManagedRecord) -> ManagedRecord {
        self.inner.write().await.insert(record)
    }

    /// All records, in creation order
    pub async fn snapshot(&self) -> Vec<ManagedRecord> {
        self.inner.read().await.records.values().cloned().collect()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

#[async_trait]
impl ZoneStore for MemoryZoneStore {
    async fn list_by_field(
        &self,
        field: RecordField,
        value: &str,
    ) -> Result<Vec<ManagedRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .records
            .values()
            .filter(|record| field.value_of(record) == value)
            .cloned()
            .collect())
    }

    async fn create(&self, record: ManagedRecord) -> Result<ManagedRecord, Error> {
        if record.is_stored() {
            return Err(Error::invalid_input(format!(
                "Record {} already carries identifier {}",
                record.name, record.id
            )));
        }
        Ok(self.inner.write().await.insert(record))
    }

    async fn delete(&self, record: &ManagedRecord) -> Result<(), Error> {
        if !record.is_stored() {
            return Err(Error::invalid_input(format!(
                "Cannot delete {} without an identifier",
                record.name
            )));
        }

        let mut guard = self.inner.write().await;
        let key = guard
            .records
            .iter()
            .find(|(_, stored)| stored.id == record.id)
            .map(|(key, _)| *key);

        match key {
            Some(key) => {
                guard.records.remove(&key);
                Ok(())
            }
            None => Err(Error::store_rejected(&record.id, 404, "no such item")),
        }
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory zone stores
pub struct MemoryZoneStoreFactory;

impl ZoneStoreFactory for MemoryZoneStoreFactory {
    fn create(&self, config: &ZoneStoreConfig) -> Result<Box<dyn ZoneStore>, Error> {
        match config {
            ZoneStoreConfig::Memory => Ok(Box::new(MemoryZoneStore::new())),
            _ => Err(Error::config("Invalid config for memory zone store")),
        }
    }
}
