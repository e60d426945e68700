//! Test doubles and common utilities for reconciler contract tests
//!
//! The doubles wrap the in-memory zone store so the tests can assert on
//! both the final zone contents and the calls that produced them.

#![allow(dead_code)]

use svcdns_core::error::{Error, Result};
use svcdns_core::{
    DesiredState, ManagedRecord, MemoryZoneStore, ReconcileConfig, RecordField, ZoneStore,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DOMAIN: &str = "example.com";
pub const TAG: &str = "nomad-dns";

/// A zone store that records calls and can be told to fail
#[derive(Clone)]
pub struct ScriptedZoneStore {
    inner: MemoryZoneStore,
    list_calls: Arc<AtomicUsize>,
    create_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
    /// Addresses whose create is rejected
    reject_create: Arc<Mutex<HashSet<String>>>,
    /// Names whose lookup fails at the transport level
    fail_lookup: Arc<Mutex<HashSet<String>>>,
    /// Identifiers whose delete is rejected
    reject_delete: Arc<Mutex<HashSet<String>>>,
}

impl ScriptedZoneStore {
    pub fn new(inner: MemoryZoneStore) -> Self {
        Self {
            inner,
            list_calls: Arc::new(AtomicUsize::new(0)),
            create_calls: Arc::new(AtomicUsize::new(0)),
            delete_calls: Arc::new(AtomicUsize::new(0)),
            reject_create: Arc::new(Mutex::new(HashSet::new())),
            fail_lookup: Arc::new(Mutex::new(HashSet::new())),
            reject_delete: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn reject_create_of(&self, address: &str) {
        self.reject_create.lock().unwrap().insert(address.to_string());
    }

    pub fn fail_lookup_of(&self, name: &str) {
        self.fail_lookup.lock().unwrap().insert(name.to_string());
    }

    pub fn reject_delete_of(&self, id: &str) {
        self.reject_delete.lock().unwrap().insert(id.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Reset call counters between passes
    pub fn reset_counters(&self) {
        self.list_calls.store(0, Ordering::SeqCst);
        self.create_calls.store(0, Ordering::SeqCst);
        self.delete_calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ZoneStore for ScriptedZoneStore {
    async fn list_by_field(&self, field: RecordField, value: &str) -> Result<Vec<ManagedRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if field == RecordField::Name && self.fail_lookup.lock().unwrap().contains(value) {
            return Err(Error::transport(format!("timed out looking up {}", value)));
        }
        self.inner.list_by_field(field, value).await
    }

    async fn create(&self, record: ManagedRecord) -> Result<ManagedRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_create.lock().unwrap().contains(&record.address) {
            return Err(Error::store_rejected(&record.name, 400, "failure: rejected"));
        }
        self.inner.create(record).await
    }

    async fn delete(&self, record: &ManagedRecord) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_delete.lock().unwrap().contains(&record.id) {
            return Err(Error::store_rejected(&record.id, 500, "failure: busy"));
        }
        self.inner.delete(record).await
    }

    fn store_name(&self) -> &'static str {
        "scripted"
    }
}

/// Reconcile settings used by most tests
pub fn config() -> ReconcileConfig {
    ReconcileConfig::new(DOMAIN, TAG)
}

/// `<name>.example.com`
pub fn fqdn(name: &str) -> String {
    format!("{}.{}", name, DOMAIN)
}

/// A record owned by the test tag
pub fn owned(name: &str, address: &str) -> ManagedRecord {
    ManagedRecord::address(fqdn(name), address, TAG)
}

/// (name, address, comment) triples of a zone, sorted
pub async fn bindings(store: &MemoryZoneStore) -> Vec<(String, String, String)> {
    let mut out: Vec<_> = store
        .snapshot()
        .await
        .into_iter()
        .map(|r| (r.name, r.address, r.comment))
        .collect();
    out.sort();
    out
}

/// Build a desired state from (name, addresses) pairs
pub fn desired(services: &[(&str, &[&str])]) -> DesiredState {
    services
        .iter()
        .fold(DesiredState::new(), |state, (name, addrs)| {
            state.with_service(*name, addrs.iter().copied())
        })
}
