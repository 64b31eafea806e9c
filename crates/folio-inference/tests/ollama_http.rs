//! HTTP behavior of the Ollama backend against a mock server.

use std::time::Duration;

use folio_core::{Error, GenerationBackend};
use folio_inference::OllamaBackend;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> OllamaBackend {
    OllamaBackend::with_config(server.uri(), "mistral:latest", 5).unwrap()
}

#[tokio::test]
async fn test_available_when_tags_respond() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    assert!(backend_for(&server).is_available().await);
}

#[tokio::test]
async fn test_unavailable_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(!backend_for(&server).is_available().await);
}

#[tokio::test]
async fn test_unavailable_when_unreachable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let backend = OllamaBackend::with_config(uri, "mistral:latest", 5).unwrap();
    assert!(!backend.is_available().await);
}

#[tokio::test]
async fn test_list_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "mistral:latest", "size": 1},
                {"name": "llama3:8b", "size": 2}
            ]
        })))
        .mount(&server)
        .await;

    let models = backend_for(&server).list_models().await.unwrap();
    assert_eq!(models, vec!["mistral:latest", "llama3:8b"]);
}

#[tokio::test]
async fn test_generate_uses_default_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({
            "model": "mistral:latest",
            "prompt": "Summarize this",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "mistral:latest",
            "response": "A short summary.",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = backend_for(&server)
        .generate(None, "Summarize this")
        .await
        .unwrap();
    assert_eq!(text, "A short summary.");
}

#[tokio::test]
async fn test_generate_with_explicit_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({"model": "llama3:8b", "prompt": "p", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let text = backend_for(&server)
        .generate(Some("llama3:8b"), "p")
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_generate_non_success_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'x' not found"))
        .mount(&server)
        .await;

    let err = backend_for(&server).generate(Some("x"), "p").await.unwrap_err();
    match err {
        Error::Network(msg) => {
            assert!(msg.contains("404"), "{}", msg);
            assert!(msg.contains("model 'x' not found"), "{}", msg);
        }
        other => panic!("expected Network, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generate_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let backend = OllamaBackend::with_config(server.uri(), "mistral:latest", 1).unwrap();
    let err = backend.generate(None, "p").await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "got {:?}", err);
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_generate_unreachable_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let backend = OllamaBackend::with_config(uri, "mistral:latest", 5).unwrap();
    let err = backend.generate(None, "p").await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "got {:?}", err);
}
