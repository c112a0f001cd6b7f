//! YAML snapshot of an [`InMemoryStore`].
//!
//! Shaped like a list of Kubernetes Secret manifests: `data` values are
//! base64, everything else is plain text.
//!
//! ```yaml
//! - name: api-credentials
//!   namespace: default
//!   data:
//!     token: c2VjcmV0
//!   labels:
//!     team: payments
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::memory::InMemoryStore;
use super::{OwnerRef, SecretRecord};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretManifest {
    name: String,
    namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<OwnerRef>,
}

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

pub fn from_yaml(yaml: &str) -> anyhow::Result<InMemoryStore> {
    let manifests: Vec<SecretManifest> = if yaml.trim().is_empty() {
        Vec::new()
    } else {
        serde_yaml::from_str(yaml).context("invalid secret snapshot")?
    };

    let store = InMemoryStore::new();
    for m in manifests {
        let mut record = SecretRecord::new(&m.name, &m.namespace);
        for (key, encoded) in m.data {
            let bytes = B64.decode(encoded.trim()).with_context(|| {
                format!(
                    "secret {}/{} key '{}' is not valid base64",
                    m.namespace, m.name, key
                )
            })?;
            record.data.insert(key, bytes);
        }
        record.labels = m.labels;
        record.annotations = m.annotations;
        record.owner = m.owner;
        store.insert(record);
    }
    Ok(store)
}

pub fn to_yaml(store: &InMemoryStore) -> anyhow::Result<String> {
    let manifests: Vec<SecretManifest> = store
        .records()
        .into_iter()
        .map(|r| SecretManifest {
            data: r
                .data
                .iter()
                .map(|(k, v)| (k.clone(), B64.encode(v)))
                .collect(),
            name: r.name,
            namespace: r.namespace,
            labels: r.labels,
            annotations: r.annotations,
            owner: r.owner,
        })
        .collect();
    Ok(serde_yaml::to_string(&manifests)?)
}

/// Load a snapshot file. A missing file is an empty store.
pub fn load(path: &Path) -> anyhow::Result<InMemoryStore> {
    match std::fs::read_to_string(path) {
        Ok(yaml) => from_yaml(&yaml),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "secret snapshot not found, starting empty");
            Ok(InMemoryStore::new())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

pub fn save(path: &Path, store: &InMemoryStore) -> anyhow::Result<()> {
    let yaml = to_yaml(store)?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::SecretStore;

    #[tokio::test]
    async fn test_from_yaml_decodes_base64() {
        let yaml = r#"
- name: creds
  namespace: default
  data:
    token: c2VjcmV0
  labels:
    team: payments
"#;
        let store = from_yaml(yaml).unwrap();
        let record = store.get("creds", "default").await.unwrap();
        assert_eq!(record.value("token"), "secret");
        assert_eq!(record.labels["team"], "payments");
    }

    #[test]
    fn test_from_yaml_rejects_bad_base64() {
        let yaml = "- name: creds\n  namespace: default\n  data:\n    token: '***'\n";
        let err = from_yaml(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("not valid base64"));
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(from_yaml("").unwrap().records().is_empty());
    }

    #[test]
    fn test_to_yaml_encodes_data() {
        let store = InMemoryStore::new();
        let mut record = SecretRecord::new("creds", "default");
        record.data.insert("token".into(), b"secret".to_vec());
        store.insert(record);
        let yaml = to_yaml(&store).unwrap();
        assert!(yaml.contains("token: c2VjcmV0"));
        assert!(!yaml.contains("labels"));
    }
}
