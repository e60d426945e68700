//! Core traits for svcdns
//!
//! This module defines the abstract interfaces that all backends must follow.
//!
//! - [`ServiceDirectory`]: Read the desired state from a service directory
//! - [`ZoneStore`]: List, create and delete records in a DNS zone

pub mod directory;
pub mod zone_store;

pub use directory::{ServiceDirectory, ServiceDirectoryFactory};
pub use zone_store::{ZoneStore, ZoneStoreFactory};
