//! HTTP-level tests for the embedding providers against a mock server.

use std::time::Duration;

use pretty_assertions::assert_eq;
use resumebot_embeddings::{
    EmbeddingError, EmbeddingProvider, OllamaEndpoint, OllamaProvider, OpenAIProvider,
    RetryPolicy,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(2)
        .with_base_delay(Duration::from_millis(1))
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_ollama_batch_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({
            "model": "nomic-embed-text",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "nomic-embed-text",
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri()).unwrap();
    let vectors = provider
        .embed_batch(&texts(&["first", "second"]))
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn test_ollama_legacy_endpoint_sends_one_request_per_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.25, 0.5, 0.75]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri())
        .unwrap()
        .with_endpoint(OllamaEndpoint::Legacy);
    let vectors = provider
        .embed_batch(&texts(&["a", "b", "c"]))
        .await
        .unwrap();

    assert_eq!(vectors.len(), 3);
    assert!(vectors.iter().all(|v| v == &vec![0.25, 0.5, 0.75]));
}

#[tokio::test]
async fn test_ollama_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri()).unwrap();
    let err = provider
        .embed_batch(&texts(&["one", "two"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EmbeddingError::DimensionMismatch {
            expected: 2,
            actual: 1
        }
    ));
}

#[tokio::test]
async fn test_ollama_unexpected_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "model \"missing\" not found"
        })))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri()).unwrap();
    let err = provider.embed("question").await.unwrap_err();

    assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_ollama_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.6, 0.8]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri())
        .unwrap()
        .with_retry(fast_retry());
    let vector = provider.embed("question").await.unwrap();

    assert_eq!(vector, vec![0.6, 0.8]);
}

#[tokio::test]
async fn test_ollama_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri())
        .unwrap()
        .with_retry(fast_retry());
    let err = provider.embed("question").await.unwrap_err();

    match err {
        EmbeddingError::ApiRequest { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad request");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_openai_reorders_by_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "text-embedding-3-small",
            "data": [
                { "embedding": [0.0, 1.0], "index": 1 },
                { "embedding": [1.0, 0.0], "index": 0 }
            ],
            "usage": { "prompt_tokens": 4, "total_tokens": 4 }
        })))
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new()
        .unwrap()
        .with_api_key("test-key")
        .with_base_url(server.uri());
    let vectors = provider
        .embed_batch(&texts(&["first", "second"]))
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn test_openai_without_key_is_not_configured() {
    let provider = OpenAIProvider::new()
        .unwrap()
        .with_api_key("  ")
        .with_base_url("http://127.0.0.1:9");
    let err = provider.embed("question").await.unwrap_err();

    assert!(matches!(err, EmbeddingError::ProviderNotConfigured(_)));
}
