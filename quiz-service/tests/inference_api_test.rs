//! Hosted inference backend against a local stand-in for the API.

mod common;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::{spawn_stub, test_config, GENERIC_DETAIL};
use quiz_service::services::providers::inference_api::{
    InferenceApiProvider, InferenceApiSettings,
};
use quiz_service::services::providers::{GenerationParams, ProviderError, TextProvider};
use quiz_service::startup::Application;
use secrecy::Secret;
use serde_json::{json, Value};
use std::net::SocketAddr;

const MODEL_PATH: &str = "/models/test-org/test-model";

fn provider_for(addr: SocketAddr) -> InferenceApiProvider {
    InferenceApiProvider::new(InferenceApiSettings {
        api_url: format!("http://{}/models", addr),
        hub_endpoint: format!("http://{}", addr),
        model_id: "test-org/test-model".to_string(),
        token: Secret::new("hf_test_token".to_string()),
    })
    .expect("Failed to build provider")
}

/// Stub whose generation endpoint always answers with `status`.
async fn api_answering(status: StatusCode) -> SocketAddr {
    let router = Router::new().route(
        MODEL_PATH,
        post(move || async move { (status, Json(json!({ "error": "stubbed failure" }))) }),
    );
    spawn_stub(router).await
}

async fn generate_against(status: StatusCode) -> ProviderError {
    let addr = api_answering(status).await;
    provider_for(addr)
        .generate("prompt", &GenerationParams::default())
        .await
        .expect_err("non-2xx must fail")
}

#[tokio::test]
async fn too_many_requests_is_rate_limited() {
    let err = generate_against(StatusCode::TOO_MANY_REQUESTS).await;
    assert!(matches!(err, ProviderError::RateLimited));
}

#[tokio::test]
async fn unauthorized_and_forbidden_are_credential_errors() {
    let err = generate_against(StatusCode::UNAUTHORIZED).await;
    assert!(matches!(err, ProviderError::Unauthorized(_)));

    let err = generate_against(StatusCode::FORBIDDEN).await;
    assert!(matches!(err, ProviderError::Unauthorized(_)));
}

#[tokio::test]
async fn service_unavailable_is_unavailable() {
    let err = generate_against(StatusCode::SERVICE_UNAVAILABLE).await;
    assert!(matches!(err, ProviderError::Unavailable(_)));
}

#[tokio::test]
async fn other_failures_are_api_errors() {
    let err = generate_against(StatusCode::INTERNAL_SERVER_ERROR).await;
    assert!(matches!(err, ProviderError::ApiError(msg) if msg.contains("500")));

    let err = generate_against(StatusCode::BAD_REQUEST).await;
    assert!(matches!(err, ProviderError::ApiError(_)));
}

#[tokio::test]
async fn successful_generation_returns_text_and_sends_parameters() {
    let router = Router::new().route(
        MODEL_PATH,
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["inputs"], "prompt");
            assert_eq!(body["parameters"]["max_new_tokens"], 1000);
            assert_eq!(body["parameters"]["return_full_text"], false);
            Json(json!([{
                "generated_text": "{\"questions\": []}",
                "details": { "finish_reason": "length", "generated_tokens": 1000 }
            }]))
        }),
    );
    let addr = spawn_stub(router).await;

    let response = provider_for(addr)
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap();

    assert_eq!(response.text, r#"{"questions": []}"#);
    assert_eq!(response.generated_tokens, 1000);
}

#[tokio::test]
async fn error_body_with_success_status_is_an_api_error() {
    let router = Router::new().route(
        MODEL_PATH,
        post(|| async { Json(json!({ "error": "Model is currently loading" })) }),
    );
    let addr = spawn_stub(router).await;

    let err = provider_for(addr)
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ApiError(msg) if msg == "Model is currently loading"));
}

#[tokio::test]
async fn error_body_with_success_status_is_a_generic_500() {
    let registry = Router::new()
        .route(
            "/api/whoami-v2",
            get(|| async { Json(json!({ "name": "quiz-bot" })) }),
        )
        .route(
            MODEL_PATH,
            post(|| async { Json(json!({ "error": "Model is currently loading" })) }),
        );
    let addr = spawn_stub(registry).await;
    let endpoint = format!("http://{}", addr);

    let config = test_config(&[
        ("QUIZ_PROVIDER", "inference-api"),
        ("QUIZ_MODEL_ID", "test-org/test-model"),
        ("QUIZ_HUB_ENDPOINT", &endpoint),
        ("QUIZ_INFERENCE_API_URL", &format!("{}/models", endpoint)),
    ]);
    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();
    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/generate", port))
        .json(&json!({ "prompt": "Water boils at 100C at sea level." }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "detail": GENERIC_DETAIL }));
}
