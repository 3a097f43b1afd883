//! Unit tests for client module.

use super::*;
use crate::error::{ErrorKind, ParameterIssue};
use crate::testing::{MockTransport, client_with, deployment_body};
use serde_json::json;

// ============================================================================
// ClientConfig Tests
// ============================================================================

#[test]
fn test_client_config_default() {
    let config = ClientConfig::default();

    assert_eq!(config.base_url, "https://pylon.bot/api");
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert!(config.token.is_empty());
    assert_eq!(config.deployment_id, None);
}

#[test]
fn test_client_config_builders() {
    let config = ClientConfig::new("secret")
        .with_deployment_id("5")
        .with_base_url("http://127.0.0.1:9000/api/");

    assert_eq!(config.token, "secret");
    assert_eq!(config.deployment_id.as_deref(), Some("5"));
    assert_eq!(config.base_url, "http://127.0.0.1:9000/api/");
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_client_rejects_empty_token() {
    let transport = MockTransport::reply(200, "{}");
    let err = PylonClient::with_transport(ClientConfig::default(), transport).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingRequiredParameter);
    assert!(err.to_string().contains("token"));
}

#[test]
fn test_client_rejects_invalid_base_url() {
    let transport = MockTransport::reply(200, "{}");
    let config = ClientConfig::new("secret").with_base_url("not a url");
    let err = PylonClient::with_transport(config, transport).unwrap_err();

    assert!(matches!(
        err,
        Error::MissingRequiredParameter {
            issue: ParameterIssue::Incompatible,
            ..
        }
    ));
}

#[test]
fn test_client_trims_trailing_slash() {
    let transport = MockTransport::reply(200, "{}");
    let config = ClientConfig::new("secret").with_base_url("http://127.0.0.1:9000/api/");
    let client = PylonClient::with_transport(config, transport).unwrap();

    assert_eq!(client.base_url(), "http://127.0.0.1:9000/api");
}

#[test]
fn test_client_ignores_empty_default_deployment() {
    let transport = MockTransport::reply(200, "{}");
    let config = ClientConfig::new("secret").with_deployment_id("");
    let client = PylonClient::with_transport(config, transport).unwrap();

    assert_eq!(client.deployment_id(), None);
}

// ============================================================================
// Dispatcher Tests
// ============================================================================

#[tokio::test]
async fn test_request_returns_decoded_body() {
    let transport = MockTransport::reply(200, r#"{"id":"1","displayName":"a"}"#);
    let client = client_with(&transport);

    let value: Value = client
        .request(&RequestContext::new(), HttpMethod::Get, "/user", None)
        .await
        .unwrap();

    assert_eq!(value, json!({"id": "1", "displayName": "a"}));
}

#[tokio::test]
async fn test_request_sends_authorization_header() {
    let transport = MockTransport::reply(200, "{}");
    let client = client_with(&transport);

    let _: Value = client
        .request(&RequestContext::new(), HttpMethod::Get, "/user", None)
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert_eq!(requests[0].url, "https://pylon.bot/api/user");
    assert_eq!(requests[0].header("Authorization"), Some("secret"));
    assert_eq!(requests[0].header("Content-Type"), None);
}

#[tokio::test]
async fn test_request_with_body_sets_content_type() {
    let transport = MockTransport::reply(200, "{}");
    let client = client_with(&transport);

    let _: Value = client
        .request(
            &RequestContext::deployment("5"),
            HttpMethod::Post,
            "/deployments/5",
            Some(r#"{"contents":""}"#.to_string()),
        )
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    assert_eq!(requests[0].body.as_deref(), Some(r#"{"contents":""}"#));
}

#[tokio::test]
async fn test_request_rejects_relative_path() {
    let transport = MockTransport::reply(200, "{}");
    let client = client_with(&transport);

    let err = client
        .request::<Value>(&RequestContext::new(), HttpMethod::Get, "user", None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingRequiredParameter);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_request_empty_success_body_is_null() {
    let transport = MockTransport::reply(204, "");
    let client = client_with(&transport);

    let value: Option<Value> = client
        .request(&RequestContext::new(), HttpMethod::Delete, "/x", None)
        .await
        .unwrap();

    assert_eq!(value, None);
}

#[tokio::test]
async fn test_request_non_json_success_body_is_text() {
    let transport = MockTransport::reply(200, "ok");
    let client = client_with(&transport);

    let text: String = client
        .request(&RequestContext::new(), HttpMethod::Get, "/x", None)
        .await
        .unwrap();

    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_request_non_json_success_body_into_struct() {
    let transport = MockTransport::reply(200, "<html>");
    let client = client_with(&transport);

    let err = client.get_user().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
    assert_eq!(err.response().unwrap().text, "<html>");
}

#[tokio::test]
async fn test_request_shape_mismatch() {
    let transport = MockTransport::reply(200, "[1,2]");
    let client = client_with(&transport);

    let err = client.get_user().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
}

// ============================================================================
// Classification Tests
// ============================================================================

async fn classify(status: u16, body: &str, ctx: RequestContext) -> Error {
    let transport = MockTransport::reply(status, body);
    let client = client_with(&transport);
    client
        .request::<Value>(&ctx, HttpMethod::Get, "/anything", None)
        .await
        .unwrap_err()
}

#[tokio::test]
async fn test_classify_deployment_not_found() {
    let transport = MockTransport::reply(404, "could not find deployment");
    let client = client_with(&transport);

    let err = client
        .publish_deployment(
            &PublishRequest {
                contents: String::new(),
                project: ScriptProject { files: vec![] },
            },
            Some("5"),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeploymentNotFound);
    assert!(err.to_string().contains('5'));
    assert_eq!(transport.requests()[0].method, HttpMethod::Post);
    assert_eq!(transport.requests()[0].url, "https://pylon.bot/api/deployments/5");
}

#[tokio::test]
async fn test_classify_deployment_not_found_without_context() {
    let err = classify(404, "could not find deployment", RequestContext::new()).await;

    assert_eq!(err.kind(), ErrorKind::NullishContext);
    assert!(err.to_string().contains("deployment_id"));
}

#[tokio::test]
async fn test_classify_guild_not_found() {
    let transport = MockTransport::reply(404, "could not find guild");
    let client = client_with(&transport);

    let err = client.get_guild_info("42").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GuildNotFound);
    assert_eq!(err.to_string(), "Guild ID 42 could not be found");
}

#[tokio::test]
async fn test_classify_guild_not_found_with_empty_context() {
    let err = classify(404, "could not find guild", RequestContext::guild("")).await;

    assert!(matches!(
        err,
        Error::NullishContext {
            field: "guild_id",
            ..
        }
    ));
}

#[tokio::test]
async fn test_classify_warning_sign_page() {
    let err = classify(404, "\u{26A0}\u{FE0F} Page not found", RequestContext::new()).await;
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

#[tokio::test]
async fn test_classify_plain_404_is_unidentifiable() {
    let err = classify(404, "nope", RequestContext::deployment("5")).await;
    assert_eq!(err.kind(), ErrorKind::Unidentifiable);
}

#[tokio::test]
async fn test_classify_missing_json_body() {
    let err = classify(400, r#"{"msg":"missing json body"}"#, RequestContext::new()).await;

    assert_eq!(err.kind(), ErrorKind::MissingOrInvalidRequestBody);
    assert!(err.to_string().contains("missing json body"));
}

#[tokio::test]
async fn test_classify_other_400_is_unidentifiable() {
    let err = classify(400, r#"{"msg":"bad"}"#, RequestContext::new()).await;
    assert_eq!(err.kind(), ErrorKind::Unidentifiable);
}

#[tokio::test]
async fn test_classify_status_codes() {
    let cases = [
        (401, ErrorKind::Unauthorized),
        (403, ErrorKind::Forbidden),
        (405, ErrorKind::MethodNotAllowed),
        (500, ErrorKind::InternalServerError),
        (502, ErrorKind::Unidentifiable),
    ];

    for (status, kind) in cases {
        let err = classify(status, "", RequestContext::new()).await;
        assert_eq!(err.kind(), kind, "status {}", status);
        assert_eq!(err.response().unwrap().status, status);
    }
}

#[tokio::test]
async fn test_classify_not_authorized_body() {
    let err = classify(403, r#"{"message":"not authorized"}"#, RequestContext::new()).await;
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_classify_unknown_status_keeps_evidence() {
    let err = classify(418, "teapot", RequestContext::new()).await;

    assert_eq!(err.kind(), ErrorKind::Unidentifiable);
    let response = err.response().unwrap();
    assert_eq!(response.status, 418);
    assert_eq!(response.text, "teapot");
    assert!(err.to_string().contains("teapot"));
}

// ============================================================================
// Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_get_deployment_uses_default_id() {
    let transport = MockTransport::reply(200, &deployment_body(0));
    let client = client_with(&transport);

    let deployment = client.get_deployment(None).await.unwrap();

    assert_eq!(deployment.workbench_url, "wss://workbench.pylon.bot/ws/0");
    assert_eq!(transport.requests()[0].url, "https://pylon.bot/api/deployments/5");
}

#[tokio::test]
async fn test_get_deployment_explicit_id_overrides_default() {
    let transport = MockTransport::reply(200, &deployment_body(0));
    let client = client_with(&transport);

    client.get_deployment(Some("77")).await.unwrap();
    assert_eq!(transport.requests()[0].url, "https://pylon.bot/api/deployments/77");
}

#[tokio::test]
async fn test_get_deployment_without_any_id() {
    let transport = MockTransport::reply(200, &deployment_body(0));
    let client = PylonClient::with_transport(ClientConfig::new("secret"), transport.clone()).unwrap();

    let err = client.get_deployment(None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingRequiredParameter);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_get_deployment_id_from_guild() {
    let transport = MockTransport::reply(
        200,
        &json!({
            "id": "9",
            "name": "Guild",
            "icon": null,
            "deployments": [{
                "id": "5",
                "bot_id": "1",
                "type": 0,
                "app_id": null,
                "name": "main",
                "status": 1,
                "revision": 3,
                "config": "{}",
                "disabled": false
            }]
        })
        .to_string(),
    );
    let client = client_with(&transport);

    assert_eq!(client.get_deployment_id_from_guild("9").await.unwrap(), "5");
    assert_eq!(transport.requests()[0].url, "https://pylon.bot/api/guilds/9");
}

#[tokio::test]
async fn test_get_deployment_id_from_guild_without_deployments() {
    let transport = MockTransport::reply(
        200,
        r#"{"id":"9","name":"Guild","icon":null,"deployments":[]}"#,
    );
    let client = client_with(&transport);

    let err = client.get_deployment_id_from_guild("9").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
}

#[tokio::test]
async fn test_get_namespaces() {
    let transport = MockTransport::reply(200, r#"[{"namespace":"default","count":2}]"#);
    let client = client_with(&transport);

    let namespaces = client.get_namespaces(None).await.unwrap();

    assert_eq!(namespaces[0].namespace, "default");
    assert_eq!(namespaces[0].count, 2);
    assert_eq!(
        transport.requests()[0].url,
        "https://pylon.bot/api/deployments/5/kv/namespaces"
    );
}

#[tokio::test]
async fn test_get_namespace_items_decodes_values() {
    let transport = MockTransport::reply(
        200,
        r#"[{"key":"counter","value":{"string":"3"}},{"key":"user","value":{"string":"{\"name\":\"a\"}"}}]"#,
    );
    let client = client_with(&transport);

    let items = client
        .get_namespace_items::<Value>("default", None)
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].key, "counter");
    assert_eq!(items[0].value, json!(3));
    assert_eq!(items[1].value, json!({"name": "a"}));
    assert_eq!(
        transport.requests()[0].url,
        "https://pylon.bot/api/deployments/5/kv/namespaces/default/items"
    );
}

#[tokio::test]
async fn test_get_namespace_items_missing_string() {
    let transport = MockTransport::reply(
        200,
        r#"[{"key":"a","value":{"string":"1"}},{"key":"b","value":{"bytes":"AAE="}}]"#,
    );
    let client = client_with(&transport);

    let err = client
        .get_namespace_items::<Value>("default", None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
    assert!(err.to_string().contains("response[1].value.string is undefined"));
}

#[test]
fn test_connect_socket_requires_deployment() {
    let transport = MockTransport::reply(200, "{}");
    let client = PylonClient::with_transport(ClientConfig::new("secret"), transport).unwrap();

    let err = client.connect_socket(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredParameter);
}

#[test]
fn test_connect_socket_uses_default_deployment() {
    let transport = MockTransport::reply(200, "{}");
    let client = client_with(&transport);

    let stream = client.connect_socket(None).unwrap();
    assert_eq!(stream.deployment_id(), "5");
}
