use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Multi-valued headers, ordered by name.
pub type Headers = BTreeMap<String, Vec<String>>;

/// What came back from the upstream call.
///
/// After redaction this is the form persisted as status: any value written
/// into a secret has been replaced by its `{{name:namespace:key}}` placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status_code: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: Headers,
}

/// The request as recorded for display, with placeholders left in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: Headers,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}
