//! Azure OpenAI backend against a local wiremock server.

use edgequake_invoice::service::azure::AzureOpenAiService;
use edgequake_invoice::{
    extract_from_page, AzureConfig, EncodedPage, ErrorKind, ExtractionConfig, InvoiceError,
    StructuredOutputMode,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPLETIONS_PATH: &str = "/openai/deployments/gpt-4o/chat/completions";

fn page() -> EncodedPage {
    EncodedPage {
        base64: "iVBORw0KGgo=".into(),
        mime_type: "image/png".into(),
        width: 1700,
        height: 2200,
    }
}

fn service(endpoint: &str, mode: StructuredOutputMode) -> AzureOpenAiService {
    AzureOpenAiService::new(
        AzureConfig::new(endpoint, "test-key")
            .with_output_mode(mode)
            .with_timeout_secs(5),
    )
    .unwrap()
}

fn tool_call_reply(arguments: &Value) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "Invoice", "arguments": arguments.to_string() }
                }]
            },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 1200, "completion_tokens": 80, "total_tokens": 1280 }
    })
}

#[tokio::test]
async fn function_calling_request_and_reply() {
    let server = MockServer::start().await;
    let arguments = json!({
        "care_provider": { "name": "Acme Home Care", "phone": "555-0100", "address": null },
        "date": "2024-01-15",
        "location": "Springfield",
        "services": [],
        "total_amount": "100.00"
    });

    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(query_param("api-version", "2023-12-01-preview"))
        .and(header("api-key", "test-key"))
        .and(body_partial_json(json!({
            "temperature": 0.0,
            "tool_choice": { "type": "function", "function": { "name": "Invoice" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_reply(&arguments)))
        .expect(1)
        .mount(&server)
        .await;

    let svc = service(&server.uri(), StructuredOutputMode::FunctionCalling);
    let invoice = extract_from_page(&page(), &ExtractionConfig::default(), &svc)
        .await
        .unwrap();

    assert_eq!(invoice.location.as_deref(), Some("Springfield"));
    assert_eq!(invoice.services, Some(vec![]));
    let cp = invoice.care_provider.unwrap();
    assert_eq!(cp.name.as_deref(), Some("Acme Home Care"));
    assert_eq!(cp.address, None);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["messages"][1]["content"][1]["image_url"]["url"],
        "data:image/png;base64,iVBORw0KGgo="
    );
    assert_eq!(body["messages"][0]["role"], "system");
}

#[tokio::test]
async fn json_schema_mode_reads_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(body_partial_json(json!({
            "response_format": { "type": "json_schema" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "{\"total_amount\": 42.5}" },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let svc = service(&server.uri(), StructuredOutputMode::JsonSchema);
    let invoice = extract_from_page(&page(), &ExtractionConfig::default(), &svc)
        .await
        .unwrap();
    assert_eq!(invoice.total_amount.as_deref(), Some("42.5"));
}

#[tokio::test]
async fn unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "401", "message": "Access denied due to invalid subscription key." }
        })))
        .mount(&server)
        .await;

    let svc = service(&server.uri(), StructuredOutputMode::FunctionCalling);
    let err = extract_from_page(&page(), &ExtractionConfig::default(), &svc)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::AuthError { .. }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn server_error_is_rejected_once_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let svc = service(&server.uri(), StructuredOutputMode::FunctionCalling);
    let err = extract_from_page(&page(), &ExtractionConfig::default(), &svc)
        .await
        .unwrap_err();
    match err {
        InvoiceError::ServiceRejected { status, ref body } => {
            assert_eq!(status, 500);
            assert!(body.contains("upstream exploded"));
        }
        other => panic!("expected ServiceRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn garbage_arguments_are_schema_violation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "Invoice", "arguments": "{not json" }
                    }]
                },
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let svc = service(&server.uri(), StructuredOutputMode::FunctionCalling);
    let err = extract_from_page(&page(), &ExtractionConfig::default(), &svc)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn connection_refused_is_service_unavailable() {
    let svc = service("http://127.0.0.1:1", StructuredOutputMode::FunctionCalling);
    let err = extract_from_page(&page(), &ExtractionConfig::default(), &svc)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(err.exit_code(), 2);
}
