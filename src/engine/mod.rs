//! Placeholder substitution, response extraction/redaction, metadata sync
//! and the expected-response predicate.

pub mod context;
pub mod expect;
pub mod metadata;
pub mod redact;
pub mod substitute;

pub use context::response_context;
pub use expect::is_expected;
pub use metadata::{is_valid_label_value, MetadataSync};
pub use redact::{redact_response, SecretInjector};
pub use substitute::{
    patch_queries_into_headers, patch_queries_into_string, patch_secrets_into_headers,
    patch_secrets_into_string, patch_secrets_into_value,
};
