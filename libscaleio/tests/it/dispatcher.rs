//! Login, version negotiation, and the re-authenticate-once dispatcher.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose};
use libscaleio::types::{SystemInfo, WithHeaders};
use libscaleio::{Client, ConnectionConfig, HttpResponse, ScaleioError};
use reqwest::Method;
use serde_json::{Value, json};

use crate::common::*;

#[tokio::test]
async fn authenticate_logs_in_and_negotiates_version() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    let login = &requests[0];
    assert_eq!(login.method, Method::GET);
    assert_eq!(login.url, "https://gw.test/api/login");
    let expected = general_purpose::STANDARD.encode(format!("{USERNAME}:{PASSWORD}"));
    assert_eq!(header(login, "authorization"), Some(format!("Basic {expected}").as_str()));

    let version = &requests[1];
    assert_eq!(version.url, "https://gw.test/api/version");
    assert_eq!(header(version, "authorization"), Some(token_auth("tok-1").as_str()));

    assert_eq!(client.current_token().unwrap().as_str(), "tok-1");
    assert_eq!(client.session().version(), "3.6");
    let headers = client.session().current_headers();
    assert_eq!(headers.accept, "application/json;version=3.6");
    assert_eq!(headers.content_type, "application/json;version=3.6");
}

#[tokio::test]
async fn configured_version_skips_negotiation() {
    let transport = ScriptedTransport::new();
    let client = Client::with_transport(
        options().with_version("3.5"),
        Arc::new(transport.clone()),
    )
    .unwrap();
    client.authenticate_with(credentials()).await.unwrap();

    assert_eq!(transport.version_requests(), 0);
    assert_eq!(client.session().version(), "3.5");
}

#[tokio::test]
async fn requests_carry_token_and_version_headers() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::ok(r#"[{"id":"sys1","name":"cluster"}]"#));

    let systems: Vec<SystemInfo> = client.get("/api/types/System/instances").await.unwrap();
    assert_eq!(systems[0].id, "sys1");

    let request = transport.last_api_request();
    assert_eq!(request.url, "https://gw.test/api/types/System/instances");
    assert_eq!(header(&request, "authorization"), Some(token_auth("tok-1").as_str()));
    assert_eq!(header(&request, "accept"), Some("application/json;version=3.6"));
    assert_eq!(header(&request, "content-type"), Some("application/json;version=3.6"));
    assert!(request.body.is_none());
}

#[tokio::test]
async fn expired_token_reauthenticates_and_retries_once() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport
        .push(Reply::unauthorized())
        .push(Reply::ok(r#"{"id":"sdc1"}"#));

    let value: Value = client.get("/api/instances/Sdc::sdc1").await.unwrap();
    assert_eq!(value["id"], "sdc1");

    assert_eq!(transport.logins(), 2);
    // The stored version is reused; no second negotiation.
    assert_eq!(transport.version_requests(), 1);
    let api = transport.api_requests();
    assert_eq!(api.len(), 2);
    assert_eq!(header(&api[0], "authorization"), Some(token_auth("tok-1").as_str()));
    assert_eq!(header(&api[1], "authorization"), Some(token_auth("tok-2").as_str()));
    assert_eq!(client.current_token().unwrap().as_str(), "tok-2");
}

#[tokio::test]
async fn retry_replays_the_same_body() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::unauthorized()).push(Reply::ok(""));

    client
        .post::<_, ()>("/api/instances/Sdc::a/action/setSdcName", &json!({"sdcName": "n"}))
        .await
        .unwrap();

    let api = transport.api_requests();
    assert_eq!(api.len(), 2);
    assert_eq!(api[0].body, api[1].body);
    assert_eq!(body_json(&api[1]), json!({"sdcName": "n"}));
}

#[tokio::test]
async fn second_unauthorized_is_an_authentication_error() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport
        .push(Reply::unauthorized())
        .push(Reply::unauthorized())
        .push(Reply::ok("{}"));

    let err = client.get::<Value>("/api/types/System/instances").await.unwrap_err();
    assert!(matches!(err, ScaleioError::Authentication(_)), "{err:?}");
    assert_eq!(transport.api_requests().len(), 2);
    assert_eq!(transport.logins(), 2);
}

#[tokio::test]
async fn failed_reauthentication_is_an_authentication_error() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::unauthorized());
    transport.push_login(Reply::status(403, r#"{"message":"locked","httpStatusCode":403}"#));

    let err = client.get::<Value>("/api/types/System/instances").await.unwrap_err();
    assert!(matches!(err, ScaleioError::Authentication(_)), "{err:?}");
    assert_eq!(transport.api_requests().len(), 1);
    assert!(client.current_token().is_none());
}

#[tokio::test]
async fn reauthentication_transport_failure_reads_as_authentication() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::unauthorized());
    transport.push_login(Reply::Fail(ScaleioError::Transport("connection reset".into())));

    let err = client.get::<Value>("/api/types/System/instances").await.unwrap_err();
    assert!(
        matches!(err, ScaleioError::Authentication(ref m) if m.contains("connection reset")),
        "{err:?}"
    );
}

#[tokio::test]
async fn error_status_decodes_api_error() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::status(
        500,
        r#"{"message":"Internal error","httpStatusCode":500,"errorCode":6}"#,
    ));

    let err = client.get::<Value>("/api/instances/Volume::v1").await.unwrap_err();
    let api = match err {
        ScaleioError::Api(api) => api,
        other => panic!("expected api error, got {other:?}"),
    };
    assert_eq!(api.http_status_code, 500);
    assert_eq!(api.error_code, 6);
    assert_eq!(api.message, "Internal error");
    assert_eq!(transport.logins(), 1);
}

#[tokio::test]
async fn unparseable_error_body_keeps_status() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::status(404, "<html>not found</html>"));

    let err = client.get::<Value>("/api/instances/Volume::v1").await.unwrap_err();
    assert_eq!(err.http_status(), Some(404));
}

#[tokio::test]
async fn malformed_success_body() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::ok("this is not json"));

    let err = client
        .get::<Vec<SystemInfo>>("/api/types/System/instances")
        .await
        .unwrap_err();
    assert!(matches!(err, ScaleioError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn empty_success_body_decodes_as_unit() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::ok("")).push(Reply::ok("  \n"));

    client
        .post::<_, ()>("/api/instances/Volume::v1/action/addMappedSdc", &json!({}))
        .await
        .unwrap();
    let none: Option<SystemInfo> = client.get("/api/instances/System::x").await.unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn transport_failure_is_not_retried() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::Fail(ScaleioError::Transport("connection refused".into())));

    let err = client.get::<Value>("/api/types/System/instances").await.unwrap_err();
    assert!(matches!(err, ScaleioError::Transport(_)), "{err:?}");
    assert_eq!(transport.api_requests().len(), 1);
    assert_eq!(transport.logins(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_gateway_times_out() {
    let transport = ScriptedTransport::new();
    let client = Client::with_transport(
        options().with_timeout(Duration::from_secs(5)),
        Arc::new(transport.clone()),
    )
    .unwrap();
    client.authenticate_with(credentials()).await.unwrap();
    transport.push(Reply::Delay(
        Duration::from_secs(120),
        HttpResponse::new(200, "{}"),
    ));

    let err = client.get::<Value>("/api/types/System/instances").await.unwrap_err();
    assert!(
        matches!(err, ScaleioError::Transport(ref m) if m.contains("timed out")),
        "{err:?}"
    );
}

#[tokio::test]
async fn unauthenticated_client_without_credentials() {
    let transport = ScriptedTransport::new();
    let client = Client::with_transport(options(), Arc::new(transport.clone())).unwrap();

    let err = client.get::<Value>("/api/types/System/instances").await.unwrap_err();
    assert!(matches!(err, ScaleioError::Authentication(_)), "{err:?}");
    assert!(transport.requests().is_empty());

    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, ScaleioError::Authentication(_)), "{err:?}");
}

#[tokio::test]
async fn configured_credentials_log_in_on_first_request() {
    let transport = ScriptedTransport::new();
    let client = Client::with_transport(options(), Arc::new(transport.clone())).unwrap();
    client.configure(credentials()).unwrap();
    transport.push(Reply::ok("[]"));

    let systems: Vec<SystemInfo> = client.get("/api/types/System/instances").await.unwrap();
    assert!(systems.is_empty());
    assert_eq!(transport.logins(), 1);
    assert_eq!(client.session().version(), "3.6");
}

#[tokio::test]
async fn rejected_login_leaves_no_token() {
    let transport = ScriptedTransport::new();
    let client = Client::with_transport(options(), Arc::new(transport.clone())).unwrap();
    client.set_token("stale");
    transport.push_login(Reply::unauthorized());

    let err = client.authenticate_with(credentials()).await.unwrap_err();
    assert!(matches!(err, ScaleioError::Authentication(_)), "{err:?}");
    assert!(client.current_token().is_none());
}

#[tokio::test]
async fn empty_login_token_is_rejected() {
    let transport = ScriptedTransport::new();
    let client = Client::with_transport(options(), Arc::new(transport.clone())).unwrap();
    transport.push_login(Reply::ok("\"\""));

    let err = client.authenticate_with(credentials()).await.unwrap_err();
    assert!(matches!(err, ScaleioError::Authentication(_)), "{err:?}");
    assert!(client.current_token().is_none());
}

#[tokio::test]
async fn version_failure_fails_login() {
    let transport = ScriptedTransport::new();
    let client = Client::with_transport(options(), Arc::new(transport.clone())).unwrap();
    transport.push_version(Reply::status(500, "{}"));

    let err = client.authenticate_with(credentials()).await.unwrap_err();
    assert!(
        matches!(err, ScaleioError::Authentication(ref m) if m.contains("version")),
        "{err:?}"
    );
    assert!(client.current_token().is_none());
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_login() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport
        .push(Reply::unauthorized())
        .push(Reply::unauthorized())
        .push(Reply::ok("[]"))
        .push(Reply::ok("[]"));

    let a = client.clone();
    let b = client.clone();
    let (ra, rb) = tokio::join!(
        a.get::<Vec<SystemInfo>>("/api/types/System/instances"),
        b.get::<Vec<SystemInfo>>("/api/types/System/instances"),
    );
    ra.unwrap();
    rb.unwrap();

    assert_eq!(transport.logins(), 2);
    assert_eq!(transport.api_requests().len(), 4);
}

#[tokio::test]
async fn execute_string_strips_quotes() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::ok("\"4d3c2b1a\"\n"));

    let id = client
        .execute_string::<Value>(Method::GET, "/api/instances/Sdc::a/id", None)
        .await
        .unwrap();
    assert_eq!(id, "4d3c2b1a");
}

#[tokio::test]
async fn get_version_reduces_to_major_minor() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push_version(Reply::ok("\"4.5.1000.103\""));

    assert_eq!(client.get_version().await.unwrap(), "4.5");
    // Querying does not store.
    assert_eq!(client.session().version(), "3.6");

    transport.push_version(Reply::ok("\"4.5.1000.103\""));
    client.update_version().await.unwrap();
    assert_eq!(client.session().current_headers().accept, "application/json;version=4.5");
}

#[tokio::test]
async fn body_headers_are_merged() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;
    transport.push(Reply::ok("{}"));

    let body = WithHeaders::new(json!({"name": "pd1"}))
        .header("x-request-id", "abc123")
        .unwrap();
    let _: Value = client
        .post("/api/types/ProtectionDomain/instances", &body)
        .await
        .unwrap();

    let request = transport.last_api_request();
    assert_eq!(header(&request, "x-request-id"), Some("abc123"));
    assert_eq!(header(&request, "accept"), Some("application/json;version=3.6"));
    assert_eq!(body_json(&request), json!({"name": "pd1"}));
}

#[tokio::test]
async fn reconfigure_moves_endpoint() {
    let transport = ScriptedTransport::new();
    let client = authenticated(&transport).await;

    let err = client
        .configure(ConnectionConfig::new("", "", USERNAME, PASSWORD))
        .unwrap_err();
    assert!(matches!(err, ScaleioError::InvalidArgument(_)));

    client
        .configure(ConnectionConfig::new("https://other.test", "", USERNAME, PASSWORD))
        .unwrap();
    assert_eq!(client.session().version(), "3.6");
    transport.push(Reply::ok("{}"));
    let _ = client.get::<Value>("/api/version/detail").await;
    assert_eq!(
        transport.requests().last().unwrap().url,
        "https://other.test/api/version/detail"
    );
}
