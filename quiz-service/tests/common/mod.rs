//! Test helpers shared by the quiz-service integration tests.
//!
//! Nothing here needs a GPU, network access or model weights: generation is
//! scripted with `MockTextProvider` and the model registry is a local stub.

#![allow(dead_code)]

use axum::Router;
use quiz_service::config::QuizConfig;
use quiz_service::services::providers::mock::MockTextProvider;
use quiz_service::services::providers::TextProvider;
use quiz_service::startup::{build_router, AppState, Application};
use service_core::config::Config;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Model output from the reference scenario: one question wrapped in prose.
pub const BOILING_POINT_OUTPUT: &str = r#"Here is the quiz: {"questions": [{"question":"Boiling point of water?","options":["90C","100C","110C","120C"],"correctAnswerIndex":1,"explanation":"Standard atmospheric pressure."}]} Hope this helps!"#;

pub const GENERIC_DETAIL: &str = "Question generation failed.";

/// Configuration bound to an ephemeral loopback port, with optional overrides.
pub fn test_config(overrides: &[(&str, &str)]) -> QuizConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("HF_TOKEN".to_string(), "hf_test_token".to_string());
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    let common = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    };

    QuizConfig::from_lookup(common, move |key| vars.get(key).cloned())
        .expect("Failed to build test config")
}

/// In-process router around a scripted provider, for `oneshot` tests.
pub fn router_with(provider: MockTextProvider) -> Router {
    router_with_config(provider, test_config(&[]))
}

pub fn router_with_config(provider: MockTextProvider, config: QuizConfig) -> Router {
    let provider: Arc<dyn TextProvider> = Arc::new(provider);
    build_router(AppState::new(config, provider))
}

/// Run the full application on a random port and return the port number.
pub async fn spawn_app(provider: Arc<dyn TextProvider>) -> u16 {
    let app = Application::build_with_provider(test_config(&[]), provider)
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    port
}

/// Serve `router` on a random loopback port; used to impersonate the hub.
pub async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub listener");
    let addr = listener.local_addr().expect("Stub has no local address");

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}
