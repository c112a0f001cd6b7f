use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What to do with a secret key when its response field is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingFieldStrategy {
    /// Leave the key as it is.
    #[default]
    Preserve,
    /// Write an empty value.
    SetEmpty,
    /// Remove the key.
    Delete,
}

/// One response field → one secret key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInjection {
    pub secret_key: String,
    #[serde(rename = "responseJQ")]
    pub response_jq: String,
    #[serde(default)]
    pub missing_field_strategy: MissingFieldStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretTarget {
    pub name: String,
    pub namespace: String,
}

/// Desired secret metadata. Values may be literal or queries against the
/// response; a `None` map is not managed at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretInjectionConfig {
    pub secret_ref: SecretTarget,
    #[serde(default)]
    pub key_mappings: Vec<KeyInjection>,
    /// Single-mapping shorthand, used together with `response_path`.
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub response_path: Option<String>,
    #[serde(default)]
    pub set_owner_reference: bool,
    #[serde(default)]
    pub metadata: Option<SecretMetadata>,
}

impl SecretInjectionConfig {
    /// `key_mappings` plus the shorthand mapping, if both of its halves are set.
    pub fn mappings(&self) -> Vec<KeyInjection> {
        let mut all = self.key_mappings.clone();
        if let (Some(key), Some(path)) = (&self.secret_key, &self.response_path) {
            all.push(KeyInjection {
                secret_key: key.clone(),
                response_jq: path.clone(),
                missing_field_strategy: MissingFieldStrategy::Preserve,
            });
        }
        all
    }
}
