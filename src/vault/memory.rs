use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{OwnerRef, SecretRecord, SecretStore, StoreError};

/// Process-local secret store keyed by (namespace, name).
///
/// Backs the CLI (via YAML snapshots) and the test suites. Reads and writes are
/// counted so callers can assert that idempotent paths really skip the store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<(String, String), SecretRecord>,
    next_version: AtomicU64,
    gets: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the write counters.
    pub fn insert(&self, mut record: SecretRecord) {
        record.version = self.bump();
        self.records
            .insert((record.namespace.clone(), record.name.clone()), record);
    }

    /// All records, sorted by namespace then name.
    pub fn records(&self) -> Vec<SecretRecord> {
        let mut all: Vec<SecretRecord> = self.records.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        all
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::Relaxed)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::Relaxed)
    }

    fn bump(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn key(name: &str, namespace: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

#[async_trait]
impl SecretStore for InMemoryStore {
    async fn get(&self, name: &str, namespace: &str) -> Result<SecretRecord, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.records
            .get(&key(name, namespace))
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }

    async fn create(
        &self,
        name: &str,
        namespace: &str,
        owner: Option<&OwnerRef>,
    ) -> Result<SecretRecord, StoreError> {
        use dashmap::mapref::entry::Entry;

        match self.records.entry(key(name, namespace)) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
            Entry::Vacant(slot) => {
                let mut record = SecretRecord::new(name, namespace);
                record.owner = owner.cloned();
                record.version = self.bump();
                slot.insert(record.clone());
                self.creates.fetch_add(1, Ordering::Relaxed);
                Ok(record)
            }
        }
    }

    async fn update(&self, record: &SecretRecord) -> Result<SecretRecord, StoreError> {
        let mut entry = self
            .records
            .get_mut(&key(&record.name, &record.namespace))
            .ok_or_else(|| StoreError::NotFound {
                name: record.name.clone(),
                namespace: record.namespace.clone(),
            })?;

        if entry.version != record.version {
            return Err(StoreError::Conflict {
                name: record.name.clone(),
                namespace: record.namespace.clone(),
            });
        }

        let mut stored = record.clone();
        stored.version = self.bump();
        *entry = stored.clone();
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(stored)
    }
}
