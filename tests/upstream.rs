//! `UpstreamClient` against a local mock server.

use std::sync::Arc;

use httpcall::config::Config;
use httpcall::diagnostics::MemorySink;
use httpcall::executor::RequestExecutor;
use httpcall::models::{DesiredRequest, Headers};
use httpcall::query::QueryEngine;
use httpcall::transport::{BodyData, HeaderData, HttpClient, TransportError, UpstreamClient};
use httpcall::vault::memory::InMemoryStore;
use httpcall::vault::{SecretRecord, SecretStore};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn headers(pairs: &[(&str, &str)]) -> Headers {
    let mut out = Headers::new();
    for (k, v) in pairs {
        out.entry(k.to_string()).or_default().push(v.to_string());
    }
    out
}

#[tokio::test]
async fn test_sends_decrypted_and_records_encrypted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("authorization", "Bearer s3cr3t"))
        .and(body_string("secret=s3cr3t"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-trace", "t-1")
                .set_body_string(r#"{"ok":true}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = UpstreamClient::new(&Config::default()).unwrap();
    let details = client
        .send(
            "post",
            &format!("{}/token", mock_server.uri()),
            BodyData {
                encrypted: "secret={{auth:default:token}}".into(),
                decrypted: "secret=s3cr3t".into(),
            },
            HeaderData {
                encrypted: headers(&[("Authorization", "Bearer {{auth:default:token}}")]),
                decrypted: headers(&[("Authorization", "Bearer s3cr3t")]),
            },
            false,
        )
        .await
        .unwrap();

    assert_eq!(details.response.status_code, 201);
    assert_eq!(details.response.body, r#"{"ok":true}"#);
    assert_eq!(details.response.headers["x-trace"], vec!["t-1"]);
    assert_eq!(details.request.method, "POST");
    assert_eq!(details.request.body, "secret={{auth:default:token}}");
    assert_eq!(
        details.request.headers["Authorization"],
        vec!["Bearer {{auth:default:token}}"]
    );
}

#[tokio::test]
async fn test_invalid_method_rejected() {
    let client = UpstreamClient::new(&Config::default()).unwrap();
    let err = client
        .send(
            "NOT A METHOD",
            "http://127.0.0.1:1/",
            BodyData::default(),
            HeaderData::default(),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::InvalidMethod(_)));
}

#[tokio::test]
async fn test_executor_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("x-api-key", "k-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"session":"sess-9"}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let mut creds = SecretRecord::new("creds", "default");
    creds.data.insert("api-key".into(), b"k-123".to_vec());
    store.insert(creds);

    let executor = RequestExecutor::new(
        store.clone(),
        Arc::new(UpstreamClient::new(&Config::default()).unwrap()),
        QueryEngine::default(),
        Arc::new(MemorySink::new()),
    );
    let request: DesiredRequest = serde_yaml::from_str(&format!(
        r#"
method: POST
url: {}/login
headers:
  X-Api-Key: ["{{{{creds:default:api-key}}}}"]
expectedResponse: .statusCode == 200
secretInjectionConfigs:
  - secretRef: {{ name: session, namespace: default }}
    secretKey: value
    responsePath: .body.session
"#,
        mock_server.uri()
    ))
    .unwrap();

    let outcome = executor.execute(&request, None, None).await.unwrap();

    assert!(outcome.expected);
    assert_eq!(outcome.response.body, r#"{"session":"{{session:default:value}}"}"#);
    assert_eq!(
        store.get("session", "default").await.unwrap().value("value"),
        "sess-9"
    );
}
