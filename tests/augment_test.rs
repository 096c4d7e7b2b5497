//! HTTP augmenter tests against a mock chat-completions server

use std::sync::Arc;
use std::time::Duration;

use flowc::augment::{
    AugmentKey, AugmentRequest, Augmenter, HttpAugmenter, RetryConfig, RetryPolicy, NO_CHANGE,
};
use flowc::ast::BodyItem;
use flowc::{Compiler, FlowcConfig, FlowcError};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
}

fn augmenter(server: &MockServer, retries: u32) -> HttpAugmenter {
    augmenter_with_timeout(server, retries, Duration::from_secs(5))
}

fn augmenter_with_timeout(server: &MockServer, retries: u32, timeout: Duration) -> HttpAugmenter {
    HttpAugmenter::new(server.uri(), "test-model", timeout)
        .unwrap()
        .with_api_key("sk-test")
        .with_retry(RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(retries)
                .with_initial_delay(Duration::from_millis(1)),
        ))
}

fn request() -> AugmentRequest {
    AugmentRequest {
        key: AugmentKey::Task("check".to_string()),
        text: "check the order".to_string(),
        lang: "en".to_string(),
        variables: vec!["limit".to_string()],
    }
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test]
async fn test_posts_prompt_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("check the order"))
        .and(body_string_contains("test-model"))
        .respond_with(reply("```\n@tool lookup\n```"))
        .expect(1)
        .mount(&server)
        .await;

    let content = augmenter(&server, 0).rewrite(&request()).await.unwrap();
    assert_eq!(content.as_deref(), Some("```\n@tool lookup\n```"));
}

#[tokio::test]
async fn test_no_change_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply(&format!("  {NO_CHANGE}\n")))
        .mount(&server)
        .await;

    let content = augmenter(&server, 0).rewrite(&request()).await.unwrap();
    assert_eq!(content, None);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(3)
        .mount(&server)
        .await;

    let err = augmenter(&server, 2).rewrite(&request()).await.unwrap_err();
    match err {
        FlowcError::AugmentationHttp { status, reason } => {
            assert_eq!(status, 503);
            assert_eq!(reason, "overloaded");
        }
        other => panic!("expected AugmentationHttp, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = augmenter(&server, 3).rewrite(&request()).await.unwrap_err();
    assert_eq!(err.code(), "FLOWC-104");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_response_without_choices_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = augmenter(&server, 0).rewrite(&request()).await.unwrap_err();
    assert!(matches!(err, FlowcError::AugmentationMalformed { .. }));
}

// ============================================================================
// Pipeline
// ============================================================================

#[tokio::test]
async fn test_compiler_merges_service_fragment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("check the order"))
        .respond_with(reply(
            "Here you go:\n```\n@tool lookup Fetch the order\n@if {{limit}} > 10\n    @next review\n@next END\n```",
        ))
        .mount(&server)
        .await;

    let source = "@var limit = 50\n@task check\n    check the order\n@task review\n    @agent Reviewer(level=senior)\n    @next END\n";
    let compilation = Compiler::new(FlowcConfig::default())
        .with_augmenter(Arc::new(augmenter(&server, 0)))
        .compile_source("order.flow", source)
        .await
        .unwrap();

    // {{limit}} > 10 folds to true, so check jumps straight to review
    let check = compilation.program.task("check").unwrap();
    assert!(check
        .body
        .iter()
        .all(|item| !matches!(item, BodyItem::Conditional(_))));
    assert_eq!(check.jumps()[0].target, "review");
    assert_eq!(compilation.program.declarations.len(), 2);
    assert!(compilation.warnings.is_empty());
}

#[tokio::test]
async fn test_slow_service_degrades_to_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply("```\n@next END\n```").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = FlowcConfig::default();
    config.augment.timeout_secs = 1;
    let compilation = Compiler::new(config)
        .with_augmenter(Arc::new(augmenter_with_timeout(&server, 0, Duration::from_secs(1))))
        .compile_source("slow.flow", "@task a\n    check the order\n")
        .await
        .unwrap();

    assert_eq!(compilation.warnings.len(), 1);
    assert_eq!(compilation.warnings[0].kind.name(), "augmentation_degraded");
    assert_eq!(compilation.warnings[0].task.as_deref(), Some("a"));
}

#[tokio::test]
async fn test_timed_out_attempt_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply("```\n@next END\n```").set_delay(Duration::from_secs(3)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(reply("```\n@tool lookup\n@next END\n```"))
        .mount(&server)
        .await;

    let mut config = FlowcConfig::default();
    config.augment.timeout_secs = 1;
    let compilation = Compiler::new(config)
        .with_augmenter(Arc::new(augmenter_with_timeout(&server, 1, Duration::from_secs(1))))
        .compile_source("retry.flow", "@task a\n    check the order\n")
        .await
        .unwrap();

    assert!(compilation.warnings.is_empty());
    assert_eq!(compilation.program.declarations[0].name, "lookup");
}

#[tokio::test]
async fn test_mandatory_augmentation_fails_compile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = FlowcConfig::default();
    config.augment.mandatory = true;
    let err = Compiler::new(config)
        .with_augmenter(Arc::new(augmenter(&server, 0)))
        .compile_source("m.flow", "@task a\n    check the order\n")
        .await
        .unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(err.code(), "FLOWC-104");
}
