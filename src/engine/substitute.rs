//! Placeholder substitution.
//!
//! Secret placeholders resolve against the secret store; query placeholders
//! resolve against a response. The two paths treat bad syntax differently:
//! a malformed secret placeholder stops substitution and hands back the
//! input untouched, a malformed query placeholder is an error.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::errors::EngineError;
use crate::models::{Headers, HttpResponse};
use crate::placeholder::{
    dedupe, find_query_placeholders, find_secret_placeholders, parse_query_placeholder,
    parse_secret_placeholder,
};
use crate::query::{QueryEngine, QueryError};
use crate::vault::SecretStore;

use super::context::strict_response_context;

// ── Secret placeholders ──────────────────────────────────────

/// Resolve every `{{name:namespace:key}}` in `text`.
///
/// Each distinct placeholder is fetched once and all its occurrences are
/// replaced. The first placeholder that does not parse ends substitution
/// and the original `text` is returned as-is, including any placeholders
/// that were already resolved. A fetch failure is an error.
pub async fn patch_secrets_into_string(
    store: &dyn SecretStore,
    text: &str,
) -> Result<String, EngineError> {
    let placeholders = dedupe(find_secret_placeholders(text));
    if placeholders.is_empty() {
        return Ok(text.to_string());
    }

    let mut resolved = text.to_string();
    for placeholder in placeholders {
        let Some(reference) = parse_secret_placeholder(placeholder) else {
            tracing::debug!(placeholder, "unparseable secret placeholder, leaving text as-is");
            return Ok(text.to_string());
        };

        let record = store
            .get(reference.name, reference.namespace)
            .await
            .map_err(|source| EngineError::SecretFetch {
                name: reference.name.to_string(),
                namespace: reference.namespace.to_string(),
                source,
            })?;

        resolved = resolved.replace(placeholder, &record.value(reference.key));
    }

    Ok(resolved)
}

/// Resolve secret placeholders in every header value.
pub async fn patch_secrets_into_headers(
    store: &dyn SecretStore,
    headers: &Headers,
) -> Result<Headers, EngineError> {
    let mut out = Headers::new();
    for (name, values) in headers {
        let mut patched = Vec::with_capacity(values.len());
        for value in values {
            patched.push(patch_secrets_into_string(store, value).await?);
        }
        out.insert(name.clone(), patched);
    }
    Ok(out)
}

/// Resolve secret placeholders in every string leaf of a structured value.
/// The input is left untouched; a substituted copy is returned.
pub fn patch_secrets_into_value<'a>(
    store: &'a dyn SecretStore,
    value: &'a Value,
) -> BoxFuture<'a, Result<Value, EngineError>> {
    async move {
        match value {
            Value::String(s) => Ok(Value::String(patch_secrets_into_string(store, s).await?)),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(patch_secrets_into_value(store, item).await?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), patch_secrets_into_value(store, v).await?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }
    .boxed()
}

// ── Query placeholders ───────────────────────────────────────

/// Resolve every `{{jq <expr>}}` in `text` against `response`.
///
/// Malformed placeholders, a non-JSON response body and queries that fail
/// or yield nothing are all errors.
pub fn patch_queries_into_string(
    engine: &QueryEngine,
    text: &str,
    response: &HttpResponse,
) -> Result<String, EngineError> {
    let placeholders = dedupe(find_query_placeholders(text));
    if placeholders.is_empty() {
        return Ok(text.to_string());
    }

    let context = strict_response_context(response);
    let mut resolved = text.to_string();
    for placeholder in placeholders {
        let query = parse_query_placeholder(placeholder)
            .ok_or_else(|| EngineError::MalformedQueryPlaceholder(placeholder.to_string()))?;

        let ctx = context.as_ref().map_err(|reason| EngineError::InvalidJson {
            query: query.to_string(),
            reason: reason.clone(),
        })?;

        let value = engine
            .extract(query, ctx)
            .map_err(EngineError::QueryPlaceholder)?
            .ok_or_else(|| {
                EngineError::QueryPlaceholder(QueryError::NoResult {
                    query: query.to_string(),
                })
            })?;

        resolved = resolved.replace(placeholder, &value);
    }

    Ok(resolved)
}

/// Resolve query placeholders in every header value.
pub fn patch_queries_into_headers(
    engine: &QueryEngine,
    headers: &Headers,
    response: &HttpResponse,
) -> Result<Headers, EngineError> {
    headers
        .iter()
        .map(|(name, values)| {
            let patched = values
                .iter()
                .map(|v| patch_queries_into_string(engine, v, response))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((name.clone(), patched))
        })
        .collect()
}
