//! Tests for tool registry

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CountingTool, EchoTool, SleepyTool};
use gaia_agent::tools::{ArithmeticTool, BinaryOp, SqrtTool};
use gaia_agent::{
    default_registry, RegistryError, ToolCallRequest, ToolOutcome, ToolPayload, ToolRegistry,
};
use gaia_config::Config;
use gaia_provider::{ChatParams, ChatResponse, Provider, ProviderError, TranscriptionRequest};
use serde_json::json;

/// Provider that is never reached in these tests
struct OfflineProvider;

#[async_trait]
impl Provider for OfflineProvider {
    async fn chat(&self, _params: ChatParams) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::NoApiKey)
    }

    async fn transcribe(&self, _request: TranscriptionRequest) -> Result<String, ProviderError> {
        Err(ProviderError::NoApiKey)
    }

    fn default_model(&self) -> String {
        "offline".to_string()
    }

    fn is_configured(&self) -> bool {
        false
    }
}

fn call(name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new("call_1", name, args)
}

#[test]
fn test_builder_rejects_duplicate_names() {
    let mut builder = ToolRegistry::builder();
    builder.register(ArithmeticTool::new(BinaryOp::Add)).unwrap();
    let err = builder
        .register(ArithmeticTool::new(BinaryOp::Add))
        .unwrap_err();

    assert!(matches!(err, RegistryError::DuplicateTool(ref name) if name == "add"));
    assert_eq!(err.to_string(), "duplicate tool name: add");
}

#[test]
fn test_registry_lookup() {
    let mut builder = ToolRegistry::builder();
    builder.register(SqrtTool).unwrap();
    builder.register(EchoTool).unwrap();
    let registry = builder.build();

    assert_eq!(registry.len(), 2);
    assert!(registry.has("sqrt"));
    assert!(!registry.has("cbrt"));
    assert_eq!(
        registry.get("echo").map(|t| t.descriptor().name),
        Some("echo".to_string())
    );
    assert!(registry.get("nonexistent").is_none());
}

#[test]
fn test_descriptors_sorted_by_name() {
    let mut builder = ToolRegistry::builder();
    builder.register(SqrtTool).unwrap();
    builder.register(ArithmeticTool::new(BinaryOp::Multiply)).unwrap();
    builder.register(ArithmeticTool::new(BinaryOp::Add)).unwrap();
    let registry = builder.build();

    let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["add", "multiply", "sqrt"]);
    assert_eq!(registry.names(), names);
}

#[tokio::test]
async fn test_invoke_success() {
    let mut builder = ToolRegistry::builder();
    builder.register(ArithmeticTool::new(BinaryOp::Multiply)).unwrap();
    let registry = builder.build();

    let outcome = registry
        .invoke(&call("multiply", json!({"a": 17, "b": 4})))
        .await;
    assert_eq!(
        outcome,
        ToolOutcome::Success(ToolPayload::Structured(json!({"result": 68})))
    );
}

#[tokio::test]
async fn test_invoke_unknown_tool() {
    let registry = ToolRegistry::builder().build();
    let outcome = registry.invoke(&call("nonexistent", json!({}))).await;

    match outcome {
        ToolOutcome::Failure(msg) => assert!(msg.starts_with("unknown tool 'nonexistent'")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_argument_skips_tool() {
    let tool = CountingTool::default();
    let mut builder = ToolRegistry::builder();
    builder.register(EchoTool).unwrap();
    builder.register(tool.clone()).unwrap();
    let registry = builder.build();

    let outcome = registry.invoke(&call("echo", json!({"txt": "typo"}))).await;
    match outcome {
        ToolOutcome::Failure(msg) => {
            assert_eq!(msg, "missing required argument(s) for 'echo': text")
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(tool.count(), 0);
}

#[tokio::test]
async fn test_tool_error_becomes_failure() {
    let mut builder = ToolRegistry::builder();
    builder.register(ArithmeticTool::new(BinaryOp::Divide)).unwrap();
    let registry = builder.build();

    let outcome = registry.invoke(&call("divide", json!({"a": 1, "b": 0}))).await;
    assert_eq!(
        outcome,
        ToolOutcome::Failure("math error: division by zero".to_string())
    );
}

#[tokio::test]
async fn test_invoke_times_out() {
    let mut builder = ToolRegistry::builder().with_timeout(Duration::from_millis(50));
    builder.register(SleepyTool(Duration::from_secs(60))).unwrap();
    let registry = builder.build();
    assert_eq!(registry.timeout(), Duration::from_millis(50));

    let outcome = registry.invoke(&call("sleepy", json!({}))).await;
    assert_eq!(
        outcome,
        ToolOutcome::Failure("tool 'sleepy' timed out after 50ms".to_string())
    );
}

#[test]
fn test_default_registry_has_full_tool_set() {
    let registry = default_registry(&Config::default(), Arc::new(OfflineProvider), None).unwrap();

    let expected = [
        "add",
        "analyze_image",
        "arxiv_search",
        "commutativity_counterexample_elements",
        "commutativity_counterexample_pairs",
        "divide",
        "execute_source_file",
        "find_identity_element",
        "find_inverses",
        "interact_tabular",
        "is_commutative",
        "modulus",
        "multiply",
        "power",
        "scrape_webpage",
        "sqrt",
        "subtract",
        "tavily_search",
        "transcribe_audio",
        "wiki_search",
    ];
    assert_eq!(registry.names(), expected);
    assert_eq!(registry.timeout(), Duration::from_secs(60));

    for descriptor in registry.descriptors() {
        assert!(!descriptor.description.is_empty(), "{}", descriptor.name);
        assert_eq!(descriptor.to_json_schema()["type"], "object");
    }
}

#[tokio::test]
async fn test_default_registry_tavily_without_key() {
    let registry = default_registry(&Config::default(), Arc::new(OfflineProvider), None).unwrap();

    let outcome = registry
        .invoke(&call("tavily_search", json!({"query": "GAIA benchmark"})))
        .await;
    assert_eq!(
        outcome,
        ToolOutcome::Failure("TAVILY_API_KEY is not configured".to_string())
    );
}
