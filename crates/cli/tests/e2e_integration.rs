//! End-to-end tests: HTTP front end → agent loop → built-in tools, with a
//! scripted reasoning backend standing in for the network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use stepwise_config::AppConfig;
use stepwise_core::error::ProviderError;
use stepwise_core::message::{Message, MessageToolCall, Role};
use stepwise_core::provider::{Provider, ProviderRequest, ProviderResponse};
use stepwise_gateway::{build_router, build_state};
use tower::ServiceExt;

struct ScriptedProvider {
    replies: Mutex<Vec<Message>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(mut replies: Vec<Message>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let message = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::Network("script exhausted".into()))?;
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "scripted".into(),
        })
    }
}

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

fn app_with(provider: Arc<ScriptedProvider>) -> axum::Router {
    build_router(build_state(&AppConfig::default(), provider))
}

async fn post_run(app: axum::Router, query: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/v1/run")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "query": query }).to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn weather_question_uses_reality_awareness_then_terminates() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Message::assistant_with_tool_calls(
            "Checking the weather.",
            vec![tool_call("c1", "reality_awareness", serde_json::json!({"city": "Paris"}))],
        ),
        Message::assistant_with_tool_calls(
            "It is mild in Paris today.",
            vec![tool_call("c2", "terminate", serde_json::json!({"status": "success"}))],
        ),
    ]));

    let (status, body) = post_run(app_with(provider.clone()), "Weather in Paris?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "It is mild in Paris today.");

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 5);
    assert_eq!(requests[0].messages[0].role, Role::System);
    let observation = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(observation.text().contains("Weather in Paris"));
}

#[tokio::test]
async fn meeting_place_recommendation_is_observed() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Message::assistant_with_tool_calls(
            "",
            vec![tool_call(
                "m1",
                "meeting_place",
                serde_json::json!({
                    "locations": ["Central Station", "Old Town"],
                    "user_requirements": "quiet with parking"
                }),
            )],
        ),
        Message::assistant("Meet at the top recommendation."),
    ]));

    let (status, body) = post_run(app_with(provider.clone()), "Where should we meet?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "Meet at the top recommendation.");
    let requests = provider.requests.lock().unwrap();
    let observation = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(observation.text().starts_with("Found 5 cafe near the meeting point"));
    assert!(observation.text().contains("- Old Town:"));
}

#[tokio::test]
async fn search_results_are_observed() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Message::assistant_with_tool_calls(
            "",
            vec![tool_call("s1", "web_search", serde_json::json!({"query": "rust book", "num_results": 1}))],
        ),
        Message::assistant("The Rust book is at doc.rust-lang.org."),
    ]));

    let (status, body) = post_run(app_with(provider.clone()), "Where is the Rust book?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "The Rust book is at doc.rust-lang.org.");
    let requests = provider.requests.lock().unwrap();
    let observation = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(observation.text().contains("https://doc.rust-lang.org/book/"));
}

#[tokio::test]
async fn backend_failure_is_reported_in_result() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));

    let (status, body) = post_run(app_with(provider), "anything").await;

    assert_eq!(status, StatusCode::OK);
    let result = body["result"].as_str().unwrap();
    assert!(result.starts_with("Error running stepwise agent:"));
    assert!(result.contains("script exhausted"));
}
