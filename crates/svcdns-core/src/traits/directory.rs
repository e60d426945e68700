// # Service Directory Trait
//
// Defines the interface for reading the desired state from a discovery source.
//
// ## Implementations
//
// - Nomad: `svcdns-directory-nomad` crate
//
// ## Usage
//
// ```rust,ignore
// use svcdns_core::ServiceDirectory;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let directory = /* ServiceDirectory implementation */;
//
//     // Every service tagged "dns", across all visible namespaces
//     let desired = directory.list_services("dns").await?;
//     for (name, addresses) in desired.iter() {
//         println!("{name}: {addresses:?}");
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::DesiredState;

/// Trait for service directory implementations
///
/// A directory reports which addresses currently serve each service name.
/// The reconciler only ever sees the resulting [`DesiredState`], so any
/// discovery backend exposing namespaces, tagged services and instance
/// addresses can sit behind this trait.
///
/// # Failure
///
/// Any enumeration or fetch failure aborts the whole call. Implementations
/// never return a partial result, because a partial desired state would make
/// the reconciler delete records for services it simply failed to read.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// List services and their addresses
    ///
    /// # Parameters
    ///
    /// - `tag`: only services carrying this tag are included. An empty tag
    ///   disables filtering.
    ///
    /// # Returns
    ///
    /// - `Ok(DesiredState)`: name → addresses across every visible namespace
    /// - `Err(Error)`: if any request failed
    async fn list_services(&self, tag: &str) -> Result<DesiredState, crate::Error>;

    /// Get the directory name (for logging/debugging)
    fn directory_name(&self) -> &'static str;
}

/// Helper trait for constructing directories from configuration
pub trait ServiceDirectoryFactory: Send + Sync {
    /// Create a ServiceDirectory instance from configuration
    fn create(
        &self,
        config: &crate::config::DirectoryConfig,
    ) -> Result<Box<dyn ServiceDirectory>, crate::Error>;
}
