use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::injection::SecretInjectionConfig;
use super::response::Headers;

/// Declarative description of one HTTP call and what to do with its result.
///
/// Loaded from YAML by the CLI:
///
/// ```yaml
/// method: POST
/// url: https://auth.example.com/token
/// headers:
///   Authorization: ["Basic {{login:default:basic}}"]
/// body:
///   grant_type: client_credentials
/// expectedResponse: .statusCode == 200
/// secretInjectionConfigs:
///   - secretRef: { name: api-token, namespace: default }
///     keyMappings:
///       - secretKey: token
///         responseJQ: .body.access_token
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    /// Either a raw string or a structured JSON value serialized before sending.
    #[serde(default)]
    pub body: Option<Value>,
    /// Boolean query deciding whether the response is the expected one.
    #[serde(default)]
    pub expected_response: Option<String>,
    #[serde(default, alias = "insecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,
    #[serde(default)]
    pub secret_injection_configs: Vec<SecretInjectionConfig>,
}
