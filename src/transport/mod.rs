//! HTTP execution seam.
//!
//! The executor hands over both forms of what it sends: the placeholder
//! form ("encrypted") for the recorded snapshot and the resolved form
//! ("decrypted") that actually goes on the wire.

pub mod upstream;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Headers, HttpResponse, RequestSnapshot};

pub use upstream::UpstreamClient;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyData {
    pub encrypted: String,
    pub decrypted: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderData {
    pub encrypted: Headers,
    pub decrypted: Headers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpDetails {
    pub response: HttpResponse,
    pub request: RequestSnapshot,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(
        &self,
        method: &str,
        url: &str,
        body: BodyData,
        headers: HeaderData,
        skip_tls_verify: bool,
    ) -> Result<HttpDetails, TransportError>;
}
