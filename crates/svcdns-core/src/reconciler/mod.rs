//! Zone reconciler
//!
//! The Reconciler is responsible for:
//! - Looking up existing records for every desired service name
//! - Creating records for desired addresses that have none
//! - Deleting tagged records that no longer match any desired address
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ ServiceDirectory │─── DesiredState ───┐
//! └──────────────────┘                    │
//!                                         ▼
//!                                ┌──────────────┐
//!                                │  Reconciler  │
//!                                └──────────────┘
//!                                         │
//!                      ┌──────────────────┴──────────────────┐
//!                      │                                     │
//!                      ▼                                     ▼
//!              ┌──────────────┐                     ┌──────────────┐
//!              │  ZoneStore   │                     │    Events    │
//!              │ (list/create │                     │   (notify)   │
//!              │   /delete)   │                     └──────────────┘
//!              └──────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. For each service name, list records named `<name>.<domain>`
//! 2. Index the ones carrying the ownership tag by address
//! 3. Mark matching records as seen, create the missing ones
//! 4. List every record carrying the ownership tag, zone-wide
//! 5. Delete the ones that were not seen
//!
//! Deletion is driven by the tag scan rather than by name so that services
//! which vanished from the directory entirely are pruned as well.

use crate::config::{FailurePolicy, ReconcileConfig};
use crate::error::{Error, Result};
use crate::model::{DesiredState, ManagedRecord, RecordField};
use crate::traits::ZoneStore;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A pass started
    PassStarted {
        services: usize,
        owner_tag: String,
    },

    /// A record was created (or would have been, in dry-run mode)
    RecordCreated {
        record: ManagedRecord,
    },

    /// An existing record matched a desired address
    RecordRetained {
        record: ManagedRecord,
    },

    /// A stale record was deleted (or would have been, in dry-run mode)
    RecordDeleted {
        record: ManagedRecord,
    },

    /// A name could not be reconciled (`continue` policy only)
    NameFailed {
        name: String,
        error: String,
    },

    /// A pass finished
    PassFinished {
        created: usize,
        retained: usize,
        deleted: usize,
        failed: usize,
    },
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records created during the pass
    pub created: Vec<ManagedRecord>,
    /// Existing records that matched a desired address
    pub retained: Vec<ManagedRecord>,
    /// Records deleted during the pass
    pub deleted: Vec<ManagedRecord>,
    /// Record names that could not be reconciled
    pub failed: Vec<String>,
    /// Whether mutations were only logged
    pub dry_run: bool,
}

impl ReconcileReport {
    /// True when the pass changed nothing
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }

    /// Number of create and delete operations
    pub fn mutations(&self) -> usize {
        self.created.len() + self.deleted.len()
    }
}

/// Core reconciler
///
/// Drives a [`ZoneStore`] towards a [`DesiredState`], touching only records
/// whose comment equals the ownership tag.
///
/// ## Concurrency
///
/// A pass issues one store call at a time and awaits it before the next.
/// The Seen Set lives for a single pass. Two passes against the same zone
/// and tag must not run at the same time; nothing here coordinates them.
pub struct Reconciler {
    /// Zone store holding the records
    store: Box<dyn ZoneStore>,

    /// Domain suffix appended to service names
    domain: String,

    /// Comment marking records owned by this reconciler
    owner_tag: String,

    /// Behaviour on per-name failures
    failure_policy: FailurePolicy,

    /// Log mutations instead of sending them
    dry_run: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `store`: Zone store implementation
    /// - `config`: Reconciliation settings
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields reconcile events
    pub fn new(
        store: Box<dyn ZoneStore>,
        config: ReconcileConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            store,
            owner_tag: config.effective_owner_tag().to_string(),
            domain: config.domain,
            failure_policy: config.failure_policy,
            dry_run: config.dry_run,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// The ownership tag this reconciler manages
    pub fn owner_tag(&self) -> &str {
        &self.owner_tag
    }

    /// Fully-qualified record name for a service
    pub fn fqdn(&self, service: &str) -> String {
        format!("{}.{}", service, self.domain)
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileReport)`: The zone now matches `desired`
    /// - `Err(Error)`: The first failure (`abort` policy), or
    ///   [`Error::Incomplete`] after a full pass with failures (`continue` policy)
    pub async fn reconcile(&self, desired: &DesiredState) -> Result<ReconcileReport> {
        info!(
            "Reconciling {} service(s) into {} via {} [tag: {}] [mode: {}]",
            desired.len(),
            self.domain,
            self.store.store_name(),
            self.owner_tag,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );
        self.emit_event(ReconcileEvent::PassStarted {
            services: desired.len(),
            owner_tag: self.owner_tag.clone(),
        });

        let mut report = ReconcileReport {
            dry_run: self.dry_run,
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        // Names whose existing records must survive pruning because they were never checked
        let mut protected: HashSet<String> = HashSet::new();

        for (name, addresses) in desired.iter() {
            let fqdn = self.fqdn(name);
            if let Err(e) = self
                .reconcile_name(&fqdn, addresses, &mut seen, &mut report)
                .await
            {
                self.handle_failure(&fqdn, e, &mut report)?;
                protected.insert(fqdn);
            }
        }

        self.prune(&seen, &protected, &mut report).await?;

        info!(
            "Reconciliation finished: {} created, {} retained, {} deleted, {} failed",
            report.created.len(),
            report.retained.len(),
            report.deleted.len(),
            report.failed.len()
        );
        self.emit_event(ReconcileEvent::PassFinished {
            created: report.created.len(),
            retained: report.retained.len(),
            deleted: report.deleted.len(),
            failed: report.failed.len(),
        });

        if !report.failed.is_empty() {
            return Err(Error::Incomplete {
                failed: report.failed.clone(),
            });
        }

        Ok(report)
    }

    /// Bring the records of a single name in line with its desired addresses
    async fn reconcile_name(
        &self,
        fqdn: &str,
        addresses: &[String],
        seen: &mut HashSet<String>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let existing = self.store.list_by_field(RecordField::Name, fqdn).await?;

        let mut index: HashMap<String, ManagedRecord> = HashMap::new();
        for record in existing {
            if record.comment != self.owner_tag {
                debug!(
                    "Ignoring record {} for {}: owned by tag '{}'",
                    record.id, fqdn, record.comment
                );
                continue;
            }
            index.insert(record.address.clone(), record);
        }

        let mut handled: HashSet<&str> = HashSet::new();
        for address in addresses {
            if !handled.insert(address.as_str()) {
                debug!("Duplicate address {} for {}, skipping", address, fqdn);
                continue;
            }

            if let Some(record) = index.remove(address) {
                debug!("Record {} already present: {} -> {}", record.id, fqdn, address);
                seen.insert(record.id.clone());
                self.emit_event(ReconcileEvent::RecordRetained {
                    record: record.clone(),
                });
                report.retained.push(record);
                continue;
            }

            let record = ManagedRecord::address(fqdn, address.as_str(), self.owner_tag.as_str());
            let created = self.create(record).await?;
            if created.is_stored() {
                seen.insert(created.id.clone());
            }
            self.emit_event(ReconcileEvent::RecordCreated {
                record: created.clone(),
            });
            report.created.push(created);
        }

        Ok(())
    }

    /// Delete every tagged record that was not seen during this pass
    async fn prune(
        &self,
        seen: &HashSet<String>,
        protected: &HashSet<String>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let tagged = self
            .store
            .list_by_field(RecordField::Comment, &self.owner_tag)
            .await?;

        for record in tagged {
            if seen.contains(&record.id) {
                continue;
            }
            if protected.contains(&record.name) {
                debug!("Keeping {}: its name failed earlier in this pass", record);
                continue;
            }

            if let Err(e) = self.delete(&record).await {
                let name = record.name.clone();
                self.handle_failure(&name, e, report)?;
                continue;
            }
            self.emit_event(ReconcileEvent::RecordDeleted {
                record: record.clone(),
            });
            report.deleted.push(record);
        }

        Ok(())
    }

    /// Create a record, or log it in dry-run mode
    async fn create(&self, record: ManagedRecord) -> Result<ManagedRecord> {
        if self.dry_run {
            info!("[DRY-RUN] Would create record {} -> {}", record.name, record.address);
            return Ok(record);
        }

        let created = self.store.create(record).await?;
        info!(
            "Created record {}: {} -> {}",
            created.id, created.name, created.address
        );
        Ok(created)
    }

    /// Delete a record, or log it in dry-run mode
    async fn delete(&self, record: &ManagedRecord) -> Result<()> {
        if self.dry_run {
            info!("[DRY-RUN] Would delete record {}", record);
            return Ok(());
        }

        self.store.delete(record).await?;
        info!("Deleted record {}", record);
        Ok(())
    }

    /// Apply the failure policy to an error for `name`
    ///
    /// Returns the error under `abort`; records it and returns `Ok` under `continue`.
    fn handle_failure(&self, name: &str, err: Error, report: &mut ReconcileReport) -> Result<()> {
        match self.failure_policy {
            FailurePolicy::Abort => {
                error!("Reconciliation of {} failed: {}", name, err);
                Err(err)
            }
            FailurePolicy::Continue => {
                warn!("Reconciliation of {} failed, continuing: {}", name, err);
                self.emit_event(ReconcileEvent::NameFailed {
                    name: name.to_string(),
                    error: err.to_string(),
                });
                if !report.failed.iter().any(|failed| failed == name) {
                    report.failed.push(name.to_string());
                }
                Ok(())
            }
        }
    }

    /// Emit a reconcile event
    fn emit_event(&self, event: ReconcileEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            // Nobody is listening; events are optional
            Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::MemoryZoneStore;

    #[test]
    fn test_report_noop() {
        let mut report = ReconcileReport::default();
        assert!(report.is_noop());

        report
            .retained
            .push(ManagedRecord::address("web.example.com", "10.0.0.1", "dns"));
        assert!(report.is_noop());

        report
            .created
            .push(ManagedRecord::address("web.example.com", "10.0.0.2", "dns"));
        assert!(!report.is_noop());
        assert_eq!(report.mutations(), 1);
    }

    #[test]
    fn test_new_rejects_empty_tag() {
        let result = Reconciler::new(
            Box::new(MemoryZoneStore::new()),
            ReconcileConfig::new("example.com", ""),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_fqdn_and_owner_tag() {
        let (reconciler, _rx) = Reconciler::new(
            Box::new(MemoryZoneStore::new()),
            ReconcileConfig::new("lan.example.com", "dns").with_owner_tag("svcdns"),
        )
        .unwrap();

        assert_eq!(reconciler.fqdn("web"), "web.lan.example.com");
        assert_eq!(reconciler.owner_tag(), "svcdns");
    }

    #[tokio::test]
    async fn test_events_emitted_for_created_records() {
        let (reconciler, mut rx) = Reconciler::new(
            Box::new(MemoryZoneStore::new()),
            ReconcileConfig::new("example.com", "dns"),
        )
        .unwrap();

        let desired = DesiredState::new().with_service("web", ["10.0.0.1"]);
        reconciler.reconcile(&desired).await.unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(ReconcileEvent::PassStarted { services: 1, .. })
        ));
        match rx.recv().await {
            Some(ReconcileEvent::RecordCreated { record }) => {
                assert_eq!(record.name, "web.example.com");
                assert_eq!(record.id, "*1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            rx.recv().await,
            Some(ReconcileEvent::PassFinished {
                created: 1,
                deleted: 0,
                ..
            })
        ));
    }
}
