// # Zone Store Implementations
//
// Zone stores that live inside the core crate. Remote stores ship as
// separate backend crates.

pub mod memory;

pub use memory::{MemoryZoneStore, MemoryZoneStoreFactory};
