//! Label and annotation sync for injected secrets.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::models::SecretMetadata;
use crate::placeholder::parse_query_placeholder;
use crate::query::QueryEngine;
use crate::vault::SecretRecord;

/// Kubernetes label-value syntax.
static LABEL_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?$").unwrap());

const MAX_LABEL_VALUE_LEN: usize = 63;

pub fn is_valid_label_value(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_LABEL_VALUE_LEN && LABEL_VALUE_RE.is_match(value)
}

pub struct MetadataSync<'a> {
    pub engine: &'a QueryEngine,
    pub sink: &'a dyn DiagnosticSink,
}

impl MetadataSync<'_> {
    /// Bring `record`'s labels and annotations in line with `desired`.
    /// Returns true if anything changed.
    pub fn apply(&self, record: &mut SecretRecord, desired: &SecretMetadata, context: &Value) -> bool {
        let secret = format!("{}/{}", record.namespace, record.name);
        let mut changed = false;
        if let Some(labels) = &desired.labels {
            changed |= self.sync_map(&secret, &mut record.labels, labels, context);
        }
        if let Some(annotations) = &desired.annotations {
            changed |= self.sync_map(&secret, &mut record.annotations, annotations, context);
        }
        changed
    }

    fn sync_map(
        &self,
        secret: &str,
        existing: &mut BTreeMap<String, String>,
        desired: &BTreeMap<String, String>,
        context: &Value,
    ) -> bool {
        let mut changed = false;

        for (key, raw) in desired {
            let Some(value) = self.resolve(secret, key, raw, context) else {
                continue;
            };
            if !is_valid_label_value(&value) {
                self.sink.emit(Diagnostic {
                    kind: DiagnosticKind::InvalidMetadataValue,
                    secret: secret.to_string(),
                    key: key.clone(),
                    query: None,
                    reason: format!("value '{}' is not a valid label value, skipping", value),
                });
                continue;
            }
            if existing.get(key) != Some(&value) {
                existing.insert(key.clone(), value);
                changed = true;
            }
        }

        let before = existing.len();
        existing.retain(|k, _| desired.contains_key(k));
        changed | (existing.len() != before)
    }

    /// A desired value is either a `{{jq <expr>}}` placeholder, a bare query,
    /// or a literal. A query yielding nothing falls back to the literal; a
    /// failing one is reported and the key is left alone (`None`).
    fn resolve(&self, secret: &str, key: &str, raw: &str, context: &Value) -> Option<String> {
        let query = match parse_query_placeholder(raw) {
            Some(expr) => expr,
            None if self.engine.looks_like_query(raw) => raw,
            None => return Some(raw.to_string()),
        };

        match self.engine.extract(query, context) {
            Ok(Some(value)) => Some(value),
            Ok(None) => Some(raw.to_string()),
            Err(e) => {
                self.sink.emit(Diagnostic {
                    kind: DiagnosticKind::MetadataQueryFailed,
                    secret: secret.to_string(),
                    key: key.to_string(),
                    query: Some(query.to_string()),
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}
