//! One reconciliation pass over a `DesiredRequest`.
//!
//! Secrets are substituted into body and headers, `{{jq}}` placeholders are
//! resolved against the prior response, the call is sent, values are
//! extracted into secrets and redacted out of the response, and the
//! expected-response predicate is evaluated on what the caller will persist.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::diagnostics::DiagnosticSink;
use crate::engine::{
    is_expected, patch_queries_into_headers, patch_queries_into_string,
    patch_secrets_into_headers, patch_secrets_into_string, patch_secrets_into_value,
    SecretInjector,
};
use crate::errors::EngineError;
use crate::models::{DesiredRequest, HttpResponse, RequestSnapshot};
use crate::query::QueryEngine;
use crate::transport::{BodyData, HeaderData, HttpClient};
use crate::vault::{OwnerRef, SecretStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    /// What was sent, placeholders intact.
    pub request: RequestSnapshot,
    /// What came back, with extracted values replaced by placeholders.
    pub response: HttpResponse,
    pub expected: bool,
}

pub struct RequestExecutor {
    store: Arc<dyn SecretStore>,
    client: Arc<dyn HttpClient>,
    engine: QueryEngine,
    sink: Arc<dyn DiagnosticSink>,
}

impl RequestExecutor {
    pub fn new(
        store: Arc<dyn SecretStore>,
        client: Arc<dyn HttpClient>,
        engine: QueryEngine,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            store,
            client,
            engine,
            sink,
        }
    }

    /// Resolve body and headers. `prior` feeds `{{jq}}` placeholders; without
    /// one they are sent as written.
    pub async fn prepare(
        &self,
        request: &DesiredRequest,
        prior: Option<&HttpResponse>,
    ) -> Result<(BodyData, HeaderData), EngineError> {
        let store = self.store.as_ref();

        let (encrypted, mut decrypted) = match &request.body {
            None => (String::new(), String::new()),
            Some(Value::String(text)) => (text.clone(), patch_secrets_into_string(store, text).await?),
            Some(structured) => {
                let resolved = patch_secrets_into_value(store, structured).await?;
                (to_json(structured)?, to_json(&resolved)?)
            }
        };

        let mut headers = patch_secrets_into_headers(store, &request.headers).await?;

        if let Some(prior) = prior {
            decrypted = patch_queries_into_string(&self.engine, &decrypted, prior)?;
            headers = patch_queries_into_headers(&self.engine, &headers, prior)?;
        }

        Ok((
            BodyData {
                encrypted,
                decrypted,
            },
            HeaderData {
                encrypted: request.headers.clone(),
                decrypted: headers,
            },
        ))
    }

    pub async fn execute(
        &self,
        request: &DesiredRequest,
        prior: Option<&HttpResponse>,
        owner: Option<&OwnerRef>,
    ) -> Result<ExecutionOutcome, EngineError> {
        if request.method.trim().is_empty() {
            return Err(EngineError::InvalidRequest("method is required".into()));
        }
        if request.url.trim().is_empty() {
            return Err(EngineError::InvalidRequest("url is required".into()));
        }

        let (body, headers) = self.prepare(request, prior).await?;
        let details = self
            .client
            .send(
                &request.method,
                &request.url,
                body,
                headers,
                request.insecure_skip_tls_verify,
            )
            .await?;

        let original = details.response.clone();
        let mut response = details.response;

        let injector = SecretInjector {
            store: self.store.as_ref(),
            engine: &self.engine,
            sink: self.sink.as_ref(),
        };
        for config in &request.secret_injection_configs {
            injector.apply(&mut response, &original, config, owner).await;
        }

        let expected = is_expected(
            &self.engine,
            request.expected_response.as_deref().unwrap_or_default(),
            Some(&response),
        )?;

        tracing::info!(
            method = %request.method,
            url = %request.url,
            status = response.status_code,
            expected,
            "request executed"
        );

        Ok(ExecutionOutcome {
            request: details.request,
            response,
            expected,
        })
    }
}

fn to_json(value: &Value) -> Result<String, EngineError> {
    serde_json::to_string(value).map_err(|e| EngineError::InvalidRequest(e.to_string()))
}
