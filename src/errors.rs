use thiserror::Error;

use crate::query::QueryError;
use crate::transport::TransportError;
use crate::vault::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to get secret {namespace}/{name}: {source}")]
    SecretFetch {
        name: String,
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("malformed query placeholder '{0}'")]
    MalformedQueryPlaceholder(String),

    #[error("failed to resolve query '{query}': invalid json: {reason}")]
    InvalidJson { query: String, reason: String },

    #[error("failed to resolve query placeholder: {0}")]
    QueryPlaceholder(#[source] QueryError),

    #[error("invalid expected response query: {0}")]
    Expectation(#[source] QueryError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
