//! Response → secret extraction, and redaction of what was extracted.
//!
//! For every key mapping the value is pulled from the *original* response
//! (so earlier redactions cannot hide it from later queries), written to
//! the secret, and then replaced by its placeholder in the response the
//! caller will persist. A failing mapping is reported and skipped.

use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::models::{HttpResponse, KeyInjection, MissingFieldStrategy, SecretInjectionConfig};
use crate::placeholder::{parse_secret_placeholder, secret_placeholder, secret_placeholder_spans};
use crate::query::QueryEngine;
use crate::vault::{get_or_create, persist_if_changed, OwnerRef, SecretRecord, SecretStore};

use super::context::response_context;
use super::metadata::MetadataSync;

pub struct SecretInjector<'a> {
    pub store: &'a dyn SecretStore,
    pub engine: &'a QueryEngine,
    pub sink: &'a dyn DiagnosticSink,
}

impl SecretInjector<'_> {
    /// Apply one injection config. `response` is redacted in place;
    /// `original` is only read.
    pub async fn apply(
        &self,
        response: &mut HttpResponse,
        original: &HttpResponse,
        config: &SecretInjectionConfig,
        owner: Option<&OwnerRef>,
    ) {
        let target = &config.secret_ref;
        let owner = owner.filter(|_| config.set_owner_reference);
        let secret_id = format!("{}/{}", target.namespace, target.name);

        let mut persisted =
            match get_or_create(self.store, &target.name, &target.namespace, owner).await {
                Ok(record) => record,
                Err(e) => {
                    self.report(DiagnosticKind::SecretWriteFailed, &secret_id, "", None, e.to_string());
                    return;
                }
            };
        let mut record = persisted.clone();
        // owner or metadata changes not yet written
        let mut dirty = owner.is_some_and(|o| record.adopt(o));

        let context = response_context(original);

        for mapping in config.mappings() {
            let value = match self.engine.extract(&mapping.response_jq, &context) {
                Ok(value) => value,
                Err(e) => {
                    self.report(
                        DiagnosticKind::ExtractionFailed,
                        &secret_id,
                        &mapping.secret_key,
                        Some(&mapping.response_jq),
                        e.to_string(),
                    );
                    None
                }
            };

            let written = apply_value(&mut record, &mapping, value.as_deref());

            match persist_if_changed(self.store, &persisted, &record).await {
                Ok(stored) => {
                    persisted = stored;
                    record = persisted.clone();
                    dirty = false;
                    // only redact what the store now holds
                    if let Some(value) = written {
                        let placeholder =
                            secret_placeholder(&record.name, &record.namespace, &mapping.secret_key);
                        redact_response(response, &value, &placeholder);
                    }
                }
                Err(e) => {
                    self.report(
                        DiagnosticKind::SecretWriteFailed,
                        &secret_id,
                        &mapping.secret_key,
                        Some(&mapping.response_jq),
                        e.to_string(),
                    );
                    record = persisted.clone();
                    dirty = owner.is_some_and(|o| record.adopt(o));
                }
            }
        }

        if let Some(desired) = &config.metadata {
            let sync = MetadataSync {
                engine: self.engine,
                sink: self.sink,
            };
            dirty |= sync.apply(&mut record, desired, &context);
        }

        if !dirty {
            return;
        }
        if let Err(e) = persist_if_changed(self.store, &persisted, &record).await {
            self.report(DiagnosticKind::SecretWriteFailed, &secret_id, "", None, e.to_string());
        }
    }

    fn report(
        &self,
        kind: DiagnosticKind,
        secret: &str,
        key: &str,
        query: Option<&str>,
        reason: String,
    ) {
        self.sink.emit(Diagnostic {
            kind,
            secret: secret.to_string(),
            key: key.to_string(),
            query: query.map(str::to_string),
            reason,
        });
    }
}

/// Write one extracted value (or its absence) into `record`. Returns the
/// value to redact once the record is stored: the written value, if non-empty.
fn apply_value(
    record: &mut SecretRecord,
    mapping: &KeyInjection,
    value: Option<&str>,
) -> Option<String> {
    let key = &mapping.secret_key;
    let Some(value) = value else {
        match mapping.missing_field_strategy {
            MissingFieldStrategy::Preserve => {}
            MissingFieldStrategy::SetEmpty => {
                record.data.insert(key.clone(), Vec::new());
            }
            MissingFieldStrategy::Delete => {
                record.data.remove(key);
            }
        }
        return None;
    };

    // already a placeholder: the response was redacted before, the secret holds the value
    if parse_secret_placeholder(value).is_some() {
        tracing::debug!(key = %key, "response value is already a secret reference");
        return None;
    }

    record.data.insert(key.clone(), value.as_bytes().to_vec());
    (!value.is_empty()).then(|| value.to_string())
}

/// Replace `value` with `placeholder` in the body's JSON string values and
/// as a substring of every header value. Text inside placeholders already
/// present in a header is left alone.
pub fn redact_response(response: &mut HttpResponse, value: &str, placeholder: &str) {
    response.body = replace_string_literals(&response.body, value, placeholder);
    for values in response.headers.values_mut() {
        for v in values.iter_mut() {
            if v.contains(value) {
                *v = replace_outside_placeholders(v, value, placeholder);
            }
        }
    }
}

fn replace_outside_placeholders(text: &str, value: &str, placeholder: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in secret_placeholder_spans(text) {
        out.push_str(&text[last..span.start].replace(value, placeholder));
        out.push_str(&text[span.clone()]);
        last = span.end;
    }
    out.push_str(&text[last..].replace(value, placeholder));
    out
}

/// Rewrite every double-quoted string literal in `text` whose decoded
/// content equals `value`. Object keys and unquoted tokens are left alone.
fn replace_string_literals(text: &str, value: &str, placeholder: &str) -> String {
    let bytes = text.as_bytes();
    let replacement = Value::String(placeholder.to_string()).to_string();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = None;
        let mut j = i + 1;
        while j < bytes.len() {
            match bytes[j] {
                b'\\' => j += 2,
                b'"' => {
                    end = Some(j);
                    break;
                }
                _ => j += 1,
            }
        }
        let Some(end) = end else { break };

        let literal = &text[start..=end];
        let is_key = text[end + 1..].trim_start().starts_with(':');
        if !is_key && serde_json::from_str::<String>(literal).is_ok_and(|s| s == value) {
            out.push_str(&text[copied..start]);
            out.push_str(&replacement);
            copied = end + 1;
        }
        i = end + 1;
    }

    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_exact_string_values_only() {
        let body = r#"{"token":"abc","msg":"token abc issued","n":123,"s":"123"}"#;
        assert_eq!(
            replace_string_literals(body, "abc", "{{s:ns:k}}"),
            r#"{"token":"{{s:ns:k}}","msg":"token abc issued","n":123,"s":"123"}"#
        );
        assert_eq!(
            replace_string_literals(body, "123", "{{s:ns:n}}"),
            r#"{"token":"abc","msg":"token abc issued","n":123,"s":"{{s:ns:n}}"}"#
        );
    }

    #[test]
    fn test_replace_leaves_keys_and_literals() {
        let body = r#"{"true": true, "x": "true"}"#;
        assert_eq!(
            replace_string_literals(body, "true", "{{s:ns:k}}"),
            r#"{"true": true, "x": "{{s:ns:k}}"}"#
        );
    }

    #[test]
    fn test_replace_handles_escapes() {
        let body = r#"{"a":"say \"hi\"","b":"x\\"}"#;
        assert_eq!(
            replace_string_literals(body, "say \"hi\"", "{{s:ns:k}}"),
            r#"{"a":"{{s:ns:k}}","b":"x\\"}"#
        );
        assert_eq!(
            replace_string_literals(body, "x\\", "{{s:ns:k}}"),
            r#"{"a":"say \"hi\"","b":"{{s:ns:k}}"}"#
        );
    }

    #[test]
    fn test_replace_unterminated_is_untouched() {
        let body = r#"{"a":"abc"#;
        assert_eq!(replace_string_literals(body, "abc", "P"), body);
    }

    #[test]
    fn test_replace_non_ascii() {
        let body = r#"{"name":"zoë","token":"ключ"}"#;
        assert_eq!(
            replace_string_literals(body, "ключ", "{{s:ns:k}}"),
            r#"{"name":"zoë","token":"{{s:ns:k}}"}"#
        );
    }

    #[test]
    fn test_redact_headers_substring() {
        let mut response = HttpResponse {
            status_code: 200,
            body: String::new(),
            headers: crate::models::Headers::from([(
                "Set-Cookie".to_string(),
                vec!["session=abc; Path=/".to_string()],
            )]),
        };
        redact_response(&mut response, "abc", "{{s:ns:k}}");
        assert_eq!(response.headers["Set-Cookie"], vec!["session={{s:ns:k}}; Path=/"]);
    }

    #[test]
    fn test_header_redaction_skips_existing_placeholders() {
        let mut response = HttpResponse {
            status_code: 200,
            body: String::new(),
            headers: crate::models::Headers::from([(
                "X-Auth".to_string(),
                vec!["token={{s:ns:token}}; ns=ns".to_string()],
            )]),
        };
        redact_response(&mut response, "ns", "{{s:ns:space}}");
        redact_response(&mut response, "token", "{{s:ns:name}}");
        assert_eq!(
            response.headers["X-Auth"],
            vec!["{{s:ns:name}}={{s:ns:token}}; {{s:ns:space}}={{s:ns:space}}"]
        );
    }

    #[test]
    fn test_apply_value_strategies() {
        let mut record = SecretRecord::new("s", "ns");
        record.data.insert("k".into(), b"old".to_vec());
        let mut mapping = KeyInjection {
            secret_key: "k".into(),
            response_jq: ".body.k".into(),
            missing_field_strategy: MissingFieldStrategy::Preserve,
        };

        assert_eq!(apply_value(&mut record, &mapping, None), None);
        assert_eq!(record.value("k"), "old");

        mapping.missing_field_strategy = MissingFieldStrategy::SetEmpty;
        assert_eq!(apply_value(&mut record, &mapping, None), None);
        assert_eq!(record.data["k"], Vec::<u8>::new());

        mapping.missing_field_strategy = MissingFieldStrategy::Delete;
        assert_eq!(apply_value(&mut record, &mapping, None), None);
        assert!(!record.data.contains_key("k"));
    }

    #[test]
    fn test_apply_value_skips_placeholders() {
        let mut record = SecretRecord::new("s", "ns");
        record.data.insert("k".into(), b"real".to_vec());
        let mapping = KeyInjection {
            secret_key: "k".into(),
            response_jq: ".body.k".into(),
            missing_field_strategy: MissingFieldStrategy::Preserve,
        };
        assert_eq!(apply_value(&mut record, &mapping, Some("{{s:ns:k}}")), None);
        assert_eq!(record.value("k"), "real");
    }

    #[test]
    fn test_apply_empty_value_is_not_redacted() {
        let mut record = SecretRecord::new("s", "ns");
        let mapping = KeyInjection {
            secret_key: "k".into(),
            response_jq: ".body.k".into(),
            missing_field_strategy: MissingFieldStrategy::Preserve,
        };
        assert_eq!(apply_value(&mut record, &mapping, Some("")), None);
        assert_eq!(record.data["k"], Vec::<u8>::new());
        assert_eq!(
            apply_value(&mut record, &mapping, Some("v")),
            Some("v".to_string())
        );
    }
}
