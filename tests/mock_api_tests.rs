//! Mock API tests for the OpenAI-compatible boundary oracle
//!
//! These tests run the HTTP client against a local wiremock server.

use serde_json::json;
use std::time::Duration;
use subsplit::segment::{Batch, BoundaryOracle, OpenAiOracle};
use subsplit::transcript::Token;
use subsplit::SplitError;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_batch(start: usize, words: &[&str]) -> Batch {
    Batch {
        index: 0,
        start,
        end: start + words.len(),
        tokens: words
            .iter()
            .enumerate()
            .map(|(i, w)| Token {
                index: start + i,
                text: w.to_string(),
                start: Duration::from_millis((start + i) as u64 * 400),
                end: Duration::from_millis((start + i) as u64 * 400 + 350),
            })
            .collect(),
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn oracle_for(server: &MockServer) -> OpenAiOracle {
    OpenAiOracle::new(format!("{}/v1", server.uri()), "test-key", "test-model")
        .with_timeout(Duration::from_secs(5))
}

// ============================================================================
// Boundary Classification Tests
// ============================================================================

mod classify_tests {
    use super::*;

    #[tokio::test]
    async fn test_classify_boundaries_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("test-model"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "It was late.<br>We went home<br>and slept.",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let batch = create_test_batch(
            20,
            &["it", "was", "late.", "we", "went", "home", "and", "slept."],
        );
        let decision = oracle_for(&server)
            .classify_boundaries(&batch)
            .await
            .unwrap();

        assert_eq!(decision.batch_index, 0);
        assert_eq!(decision.cuts, vec![23, 26]);
    }

    #[tokio::test]
    async fn test_rate_limit_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let batch = create_test_batch(0, &["a", "b", "c"]);
        let result = oracle_for(&server).classify_boundaries(&batch).await;

        match result {
            Err(SplitError::OracleUnavailable(msg)) => assert!(msg.contains("rate limited")),
            other => panic!("expected OracleUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_message_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": { "message": "model overloaded", "type": "server_error" }
            })))
            .mount(&server)
            .await;

        let batch = create_test_batch(0, &["a", "b"]);
        let err = oracle_for(&server)
            .classify_boundaries(&batch)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("model overloaded"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
            .mount(&server)
            .await;

        let batch = create_test_batch(0, &["a", "b"]);
        let result = oracle_for(&server).classify_boundaries(&batch).await;

        assert!(matches!(result, Err(SplitError::OracleResponseInvalid(_))));
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let batch = create_test_batch(0, &["a", "b"]);
        let result = oracle_for(&server).classify_boundaries(&batch).await;

        assert!(matches!(result, Err(SplitError::OracleResponseInvalid(_))));
    }

    #[tokio::test]
    async fn test_rewritten_text_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("Here is your text:<br>hello world")),
            )
            .mount(&server)
            .await;

        let batch = create_test_batch(0, &["hello", "world"]);
        let result = oracle_for(&server).classify_boundaries(&batch).await;

        assert!(matches!(result, Err(SplitError::OracleResponseInvalid(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("a b"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let batch = create_test_batch(0, &["a", "b"]);
        let oracle = oracle_for(&server).with_timeout(Duration::from_millis(200));
        let result = oracle.classify_boundaries(&batch).await;

        assert!(matches!(result, Err(SplitError::OracleUnavailable(_))));
    }
}

// ============================================================================
// Connectivity Probe Tests
// ============================================================================

mod ping_tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("Hello!"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hi!")))
            .expect(1)
            .mount(&server)
            .await;

        assert!(oracle_for(&server).ping().await);
    }

    #[tokio::test]
    async fn test_ping_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        assert!(!oracle_for(&server).ping().await);
    }

    #[tokio::test]
    async fn test_ping_unreachable() {
        let oracle = OpenAiOracle::new("http://127.0.0.1:9/v1", "test-key", "test-model");
        assert!(!oracle.ping().await);
    }
}
