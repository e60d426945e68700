// # Zone Store Trait
//
// Defines the interface for the remote record store holding the zone.
//
// ## Implementations
//
// - RouterOS REST API: `svcdns-zone-routeros` crate
// - In-memory: [`crate::zone::MemoryZoneStore`]
//
// ## Usage
//
// ```rust,ignore
// use svcdns_core::{ManagedRecord, RecordField, ZoneStore};
//
// let existing = store.list_by_field(RecordField::Name, "web.example.com").await?;
// let created = store
//     .create(ManagedRecord::address("web.example.com", "10.0.0.1", "dns"))
//     .await?;
// store.delete(&created).await?;
// ```

use async_trait::async_trait;

use crate::model::{ManagedRecord, RecordField};

/// Trait for zone store implementations
///
/// Each method is a single request/response exchange against the store.
///
/// # Constraints
///
/// - No retries and no backoff: every failure is returned as-is
/// - No caching between calls: every lookup is a fresh query
/// - Identifiers come from the store; callers never make them up
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// List every record whose `field` equals `value` exactly
    ///
    /// A non-success answer without a body yields an empty list.
    /// Transport failures are errors.
    async fn list_by_field(
        &self,
        field: RecordField,
        value: &str,
    ) -> Result<Vec<ManagedRecord>, crate::Error>;

    /// Create a record and return it with the store-assigned identifier
    ///
    /// The input must not carry an identifier.
    async fn create(&self, record: ManagedRecord) -> Result<ManagedRecord, crate::Error>;

    /// Delete a record by identifier
    async fn delete(&self, record: &ManagedRecord) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing zone stores from configuration
pub trait ZoneStoreFactory: Send + Sync {
    /// Create a ZoneStore instance from configuration
    fn create(
        &self,
        config: &crate::config::ZoneStoreConfig,
    ) -> Result<Box<dyn ZoneStore>, crate::Error>;
}
