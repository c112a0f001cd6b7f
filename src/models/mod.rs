pub mod injection;
pub mod request;
pub mod response;

pub use injection::{KeyInjection, MissingFieldStrategy, SecretInjectionConfig, SecretMetadata, SecretTarget};
pub use request::DesiredRequest;
pub use response::{Headers, HttpResponse, RequestSnapshot};
