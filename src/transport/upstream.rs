/// HTTP client for the calls described by a `DesiredRequest`.
/// Uses reqwest-middleware for retries.
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;

use super::{BodyData, HeaderData, HttpClient, HttpDetails, TransportError};
use crate::config::Config;
use crate::models::{Headers, HttpResponse, RequestSnapshot};

pub struct UpstreamClient {
    client: ClientWithMiddleware,
    /// Same setup with certificate verification off, for `insecureSkipTLSVerify`.
    insecure: ClientWithMiddleware,
}

impl UpstreamClient {
    pub fn new(cfg: &Config) -> Result<Self, TransportError> {
        Ok(Self {
            client: build(cfg, false)?,
            insecure: build(cfg, true)?,
        })
    }
}

fn build(cfg: &Config, accept_invalid_certs: bool) -> Result<ClientWithMiddleware, TransportError> {
    let reqwest_client = reqwest::Client::builder()
        .use_rustls_tls()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .build()
        .map_err(|e| TransportError::Client(e.to_string()))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(cfg.max_retries);

    Ok(ClientBuilder::new(reqwest_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

fn header_map(headers: &Headers) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, values) in headers {
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        for value in values {
            // the value may hold a resolved secret, keep it out of the error
            let value = HeaderValue::from_str(value).map_err(|_| TransportError::InvalidHeader {
                name: name.clone(),
                reason: "value contains invalid characters".into(),
            })?;
            map.append(header.clone(), value);
        }
    }
    Ok(map)
}

fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    headers
}

#[async_trait]
impl HttpClient for UpstreamClient {
    async fn send(
        &self,
        method: &str,
        url: &str,
        body: BodyData,
        headers: HeaderData,
        skip_tls_verify: bool,
    ) -> Result<HttpDetails, TransportError> {
        let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| TransportError::InvalidMethod(method.to_string()))?;
        let client = if skip_tls_verify { &self.insecure } else { &self.client };

        let request = RequestSnapshot {
            method: method.to_string(),
            url: url.to_string(),
            body: body.encrypted,
            headers: headers.encrypted,
            sent_at: chrono::Utc::now(),
        };

        let resp = client
            .request(method, url)
            .headers(header_map(&headers.decrypted)?)
            .body(body.decrypted)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, "upstream request failed: {}", e);
                TransportError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let status_code = resp.status().as_u16();
        let response_headers = collect_headers(resp.headers());
        let body = resp.text().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(url = %url, status = status_code, "upstream responded");

        Ok(HttpDetails {
            response: HttpResponse {
                status_code,
                body,
                headers: response_headers,
            },
            request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_keeps_multiple_values() {
        let headers = Headers::from([(
            "X-Tag".to_string(),
            vec!["a".to_string(), "b".to_string()],
        )]);
        let map = header_map(&headers).unwrap();
        let values: Vec<_> = map.get_all("x-tag").iter().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(collect_headers(&map)["x-tag"], vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_header_value_is_not_echoed() {
        let headers = Headers::from([(
            "Authorization".to_string(),
            vec!["Bearer s3cr3t\n".to_string()],
        )]);
        let err = header_map(&headers).unwrap_err();
        assert!(!err.to_string().contains("s3cr3t"));
    }

    #[test]
    fn test_client_builds_from_config() {
        assert!(UpstreamClient::new(&Config::default()).is_ok());
    }
}
