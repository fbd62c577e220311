//! End-to-end dispatch through `DispatchClient`.

mod common;

use ai_dispatch::types::Endpoint;
use ai_dispatch::{CallOptions, DispatchClient, Error, ResponseStatus};
use common::{instant_retry, request, MockServerFixture};
use mockito::Matcher;
use serde_json::json;

const UUID_V4: &str = "^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$";

#[tokio::test]
async fn text_turn_round_trip() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/v1/responses")
        .match_header("authorization", "Bearer sk-test")
        .match_header("idempotency-key", Matcher::Regex(UUID_V4.into()))
        .match_header("x-client-request-id", "trace-1")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "input": "Write a haiku",
            "instructions": "Be brief",
            "temperature": 0.2
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "resp_42",
                "status": "completed",
                "model": "gpt-4o-mini",
                "output": [{
                    "type": "message",
                    "content": [
                        {"type": "output_text", "text": "Autumn moon, "},
                        {"type": "output_text", "text": "quiet pond"}
                    ]
                }],
                "usage": {"input_tokens": 5, "output_tokens": 6}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let req = request(json!({
        "message": "Write a haiku",
        "instructions": "Be brief",
        "temperature": 0.2
    }));
    let env = fixture
        .client(1)
        .send_with_options(&req, &CallOptions::new().with_correlation_id("trace-1"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(env.id(), "resp_42");
    assert_eq!(env.kind(), Endpoint::UnifiedResponse);
    assert_eq!(env.status(), &ResponseStatus::Completed);
    assert_eq!(env.text(), Some("Autumn moon, quiet pond"));
    assert_eq!(env.metadata()["input_kind"], "text");
    assert_eq!(env.metadata()["usage"]["output_tokens"], 6);
}

#[tokio::test]
async fn structured_input_is_tagged_as_image_input() {
    let mut fixture = MockServerFixture::new().await;
    fixture
        .mock_json_response(
            "/responses",
            200,
            r#"{"id": "resp_7", "status": "completed", "output_text": "A red bicycle."}"#,
        )
        .await;

    let req = request(json!({
        "input": [{"role": "user", "content": [
            {"type": "input_text", "text": "What is in this image?"},
            {"type": "input_image", "image_url": "https://img.example/bike.jpg"}
        ]}]
    }));
    let env = fixture.client(1).send(&req).await.unwrap();
    assert_eq!(env.text(), Some("A red bicycle."));
    assert_eq!(env.metadata()["input_kind"], "image_input");
}

#[tokio::test]
async fn incomplete_status_is_reported() {
    let mut fixture = MockServerFixture::new().await;
    fixture
        .mock_json_response(
            "/responses",
            200,
            r#"{"id": "resp_8", "status": "incomplete", "output_text": "Once upon",
                "incomplete_details": {"reason": "max_output_tokens"}}"#,
        )
        .await;

    let env = fixture
        .client(1)
        .send(&request(json!({"message": "tell me a story", "max_tokens": 3})))
        .await
        .unwrap();
    assert_eq!(env.status(), &ResponseStatus::Incomplete);
    assert_eq!(
        env.metadata()["incomplete_details"]["reason"],
        "max_output_tokens"
    );
}

#[tokio::test]
async fn local_failures_never_reach_the_network() {
    let mut fixture = MockServerFixture::new().await;
    let any = fixture
        .server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let client = fixture.client(3);

    let err = client.send(&request(json!({}))).await.unwrap_err();
    assert!(err.is_classification());

    let err = client
        .send(&request(json!({"audio": {"action": "speech", "text": "hi", "speed": 9}})))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "{err:?}");

    let err = client
        .send(&request(json!({"image": {"prompt": "a cat", "size": "huge"}})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest { .. }), "{err:?}");

    let err = client
        .send(&request(json!({"audio": {"action": "transcribe", "file": "/no/such/file.mp3"}})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FileValidation { .. }), "{err:?}");

    any.assert_async().await;
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let mut fixture = MockServerFixture::new().await;
    fixture
        .mock_json_response("/responses", 200, "{not json")
        .await;

    let err = fixture
        .client(1)
        .send(&request(json!({"message": "hi"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }), "{err:?}");
}

#[tokio::test]
async fn builder_headers_and_retry_apply() {
    let mut fixture = MockServerFixture::new().await;
    let failing = fixture
        .server
        .mock("POST", "/v1/responses")
        .match_header("x-tenant", "acme")
        .with_status(502)
        .expect(1)
        .create_async()
        .await;
    let ok = fixture
        .server
        .mock("POST", "/v1/responses")
        .match_header("x-tenant", "acme")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "resp_2", "output_text": "ok"}"#)
        .create_async()
        .await;

    let client = DispatchClient::builder()
        .base_url(fixture.base_url.clone())
        .api_key("sk-test")
        .retry_policy(instant_retry(2))
        .default_header("x-tenant", "acme")
        .build()
        .unwrap();
    let env = client
        .send(&request(json!({"message": "hi"})))
        .await
        .unwrap();

    failing.assert_async().await;
    ok.assert_async().await;
    assert_eq!(env.text(), Some("ok"));
}

#[tokio::test]
async fn client_delete_and_models() {
    let mut fixture = MockServerFixture::new().await;
    fixture
        .server
        .mock("DELETE", "/v1/responses/resp_1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "resp_1", "deleted": true}"#)
        .create_async()
        .await;
    fixture
        .server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"id": "tts-1"}]}"#)
        .create_async()
        .await;

    let client = fixture.client(1);
    assert!(client.delete("/responses/resp_1").await.unwrap());
    assert_eq!(client.list_models().await.unwrap(), vec!["tts-1"]);
}
