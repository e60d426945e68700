// # svcdns-core
//
// Core library for keeping a DNS zone in step with a service directory.
//
// ## Architecture Overview
//
// - **ServiceDirectory**: Trait for reading the desired state (service name → addresses)
// - **ZoneStore**: Trait for the remote record store (list-by-field, create, delete)
// - **Reconciler**: Computes and applies the diff between desired state and the zone
// - **BackendRegistry**: Plugin-based registry for directory and zone store backends
//
// ## Design Principles
//
// 1. **Separation of Concerns**: The convergence algorithm lives here, transports live in backend crates
// 2. **Ownership Scoping**: Only records carrying the configured tag are ever created or removed
// 3. **Plugin-Based**: Backends are registered dynamically, no hard-coded if-else
// 4. **Idempotency**: A second pass over unchanged input performs no mutations

pub mod traits;
pub mod reconciler;
pub mod registry;
pub mod config;
pub mod error;
pub mod model;
pub mod zone;

// Re-export core types for convenience
pub use traits::{ServiceDirectory, ZoneStore};
pub use reconciler::{Reconciler, ReconcileEvent, ReconcileReport};
pub use registry::BackendRegistry;
pub use config::{
    DirectoryConfig, FailurePolicy, NomadTlsConfig, ReconcileConfig, SvcDnsConfig, ZoneStoreConfig,
};
pub use error::{Error, Result};
pub use model::{DesiredState, ManagedRecord, RecordField, record_kind_for};
pub use zone::MemoryZoneStore;
