pub mod memory;
pub mod snapshot;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ownership tag attached to a secret so the store can tie its lifetime
/// to the resource that produced it. The engine only decides whether to
/// attach one; the store interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
    pub uid: String,
}

/// A namespaced key/value secret with its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretRecord {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, Vec<u8>>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner: Option<OwnerRef>,
    /// Bumped by the store on every write.
    pub version: u64,
}

impl SecretRecord {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    /// Value at `key` as text. Missing keys read as empty.
    pub fn value(&self, key: &str) -> String {
        self.data
            .get(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default()
    }

    /// Attach `owner` unless the record already has one. Returns true if changed.
    pub fn adopt(&mut self, owner: &OwnerRef) -> bool {
        if self.owner.is_some() {
            return false;
        }
        self.owner = Some(owner.clone());
        true
    }

    /// Everything a write would change, i.e. the record minus its version.
    fn content_eq(&self, other: &SecretRecord) -> bool {
        self.data == other.data
            && self.labels == other.labels
            && self.annotations == other.annotations
            && self.owner == other.owner
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("secret {namespace}/{name} not found")]
    NotFound { name: String, namespace: String },

    #[error("secret {namespace}/{name} already exists")]
    AlreadyExists { name: String, namespace: String },

    #[error("secret {namespace}/{name} was modified concurrently")]
    Conflict { name: String, namespace: String },

    #[error("secret store error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Abstraction over the backing object store for secrets.
///
/// Implementations must return `StoreError::NotFound` for missing records so
/// callers can distinguish absence from failure.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str, namespace: &str) -> Result<SecretRecord, StoreError>;

    /// Create an empty record, optionally owned. Fails with `AlreadyExists`.
    async fn create(
        &self,
        name: &str,
        namespace: &str,
        owner: Option<&OwnerRef>,
    ) -> Result<SecretRecord, StoreError>;

    /// Replace a record. The `version` must match the stored one.
    async fn update(&self, record: &SecretRecord) -> Result<SecretRecord, StoreError>;
}

// ── Adapter ──────────────────────────────────────────────────

/// Fetch a secret, creating it (owned by `owner`, if given) when absent.
/// Returns the record exactly as the store holds it.
pub async fn get_or_create(
    store: &dyn SecretStore,
    name: &str,
    namespace: &str,
    owner: Option<&OwnerRef>,
) -> Result<SecretRecord, StoreError> {
    match store.get(name, namespace).await {
        Ok(record) => Ok(record),
        Err(e) if e.is_not_found() => {
            tracing::info!(secret = %name, namespace = %namespace, "creating secret");
            match store.create(name, namespace, owner).await {
                Ok(record) => Ok(record),
                // lost a race with another writer; read theirs
                Err(StoreError::AlreadyExists { .. }) => store.get(name, namespace).await,
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

/// Write `record` only if it differs from `persisted`. Returns the record
/// the store now holds, or `persisted` unchanged when nothing was written.
pub async fn persist_if_changed(
    store: &dyn SecretStore,
    persisted: &SecretRecord,
    record: &SecretRecord,
) -> Result<SecretRecord, StoreError> {
    if persisted.content_eq(record) {
        tracing::debug!(
            secret = %record.name,
            namespace = %record.namespace,
            "secret unchanged, skipping update"
        );
        return Ok(persisted.clone());
    }
    let updated = store.update(record).await?;
    tracing::info!(
        secret = %record.name,
        namespace = %record.namespace,
        version = updated.version,
        "secret updated"
    );
    Ok(updated)
}
