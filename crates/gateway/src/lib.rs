//! HTTP front end for Stepwise.
//!
//! Exposes a health check, a JSON run endpoint, a meeting-place finder,
//! and a minimal HTML page that runs a query from the URL. Every request shares one agent, so a
//! request arriving mid-run gets the agent's already-running answer.
//! Unless `[gateway] retain_history` is set, each request starts from a
//! fresh conversation.
//!
//! Built on Axum.

pub mod frontend;

use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, header},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use stepwise_agent::Agent;
use stepwise_agent::loop_runner::ALREADY_RUNNING;
use stepwise_config::AppConfig;
use stepwise_core::error::ToolError;
use stepwise_core::provider::Provider;
use stepwise_tools::meeting_place::{DEFAULT_KEYWORDS, Recommendation};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<Agent>,
}

pub type SharedState = Arc<GatewayState>;

/// Errors that stop the server from starting or serving.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Reasoning backend unavailable: {0}")]
    Provider(#[from] stepwise_core::error::ProviderError),

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(frontend::index_handler))
        .route("/health", get(health_handler))
        .route("/v1/run", post(run_handler))
        .route("/api/find_cafe", post(find_cafe_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the shared agent the gateway serves.
pub fn build_state(config: &AppConfig, provider: Arc<dyn Provider>) -> SharedState {
    let mut config = config.clone();
    config.agent.retain_history = config.gateway.retain_history;

    let tools = Arc::new(stepwise_agent::build_registry(&config));
    let agent = Arc::new(stepwise_agent::build_agent(&config, provider, tools));
    Arc::new(GatewayState { agent })
}

/// Start the gateway HTTP server and serve until the process exits.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = stepwise_providers::build_from_config(&config).default_provider()?;
    let app = build_router(build_state(&config, provider));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

    info!(addr = %addr, model = %config.default_model, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct RunRequest {
    query: String,
    #[serde(default)]
    system_prompt: Option<String>,
}

#[derive(Serialize)]
struct RunResponse {
    result: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn run_handler(
    State(state): State<SharedState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, (StatusCode, Json<ErrorResponse>)> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "query must not be empty".into(),
            }),
        ));
    }

    info!(query_len = query.len(), "Run requested");
    let result = state
        .agent
        .run(query, request.system_prompt.as_deref())
        .await;

    if result == ALREADY_RUNNING {
        return Err((StatusCode::CONFLICT, Json(ErrorResponse { error: result })));
    }

    Ok(Json(RunResponse { result }))
}

#[derive(Deserialize)]
struct FindCafeRequest {
    locations: Vec<String>,
    #[serde(default)]
    keywords: Option<String>,
    #[serde(default)]
    user_requirements: String,
}

/// Recommend meeting places directly, without an agent run.
async fn find_cafe_handler(
    Json(request): Json<FindCafeRequest>,
) -> Result<Json<Recommendation>, (StatusCode, Json<ErrorResponse>)> {
    let keywords = request.keywords.as_deref().unwrap_or(DEFAULT_KEYWORDS);
    info!(participants = request.locations.len(), keywords = %keywords, "Meeting place requested");

    Recommendation::find(&request.locations, keywords, &request.user_requirements)
        .map(Json)
        .map_err(|e| {
            let status = match e {
                ToolError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(ErrorResponse { error: e.to_string() }))
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use stepwise_core::error::ProviderError;
    use stepwise_core::message::Message;
    use stepwise_core::provider::{ProviderRequest, ProviderResponse};

    /// Answers every request with the same text and keeps the requests.
    pub struct FixedProvider {
        answer: &'static str,
        pub requests: Mutex<Vec<ProviderRequest>>,
    }

    impl FixedProvider {
        pub fn new(answer: &'static str) -> Self {
            Self {
                answer,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: Message::assistant(self.answer),
                usage: None,
                model: "fixed".into(),
            })
        }
    }

    pub fn state_with(provider: Arc<FixedProvider>) -> SharedState {
        build_state(&AppConfig::default(), provider)
    }

    pub fn state_answering(text: &'static str) -> SharedState {
        state_with(Arc::new(FixedProvider::new(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::state_answering;
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(state_answering("unused"));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn run_endpoint_returns_result() {
        let app = build_router(state_answering("4"));

        let req = Request::builder()
            .method("POST")
            .uri("/v1/run")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query":"2+2"}"#))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"], "4");
    }

    #[tokio::test]
    async fn run_endpoint_rejects_blank_query() {
        let app = build_router(state_answering("unused"));

        let req = Request::builder()
            .method("POST")
            .uri("/v1/run")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query":"   "}"#))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cors_headers_present() {
        let app = build_router(state_answering("unused"));

        let req = Request::builder()
            .uri("/health")
            .header("origin", "http://example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }

    async fn post_run(app: Router, query: &str) -> StatusCode {
        let req = Request::builder()
            .method("POST")
            .uri("/v1/run")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "query": query }).to_string()))
            .unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn requests_do_not_share_history() {
        let provider = Arc::new(test_support::FixedProvider::new("done"));
        let state = test_support::state_with(provider.clone());
        let app = build_router(state.clone());

        assert_eq!(post_run(app.clone(), "first client secret").await, StatusCode::OK);
        assert_eq!(post_run(app, "second client question").await, StatusCode::OK);

        let requests = provider.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert!(
            requests[1]
                .messages
                .iter()
                .all(|m| m.text() != "first client secret" && m.text() != "done")
        );
        assert_eq!(state.agent.messages().await.len(), 2);
    }

    #[tokio::test]
    async fn find_cafe_ranks_places() {
        let app = build_router(state_answering("unused"));

        let req = Request::builder()
            .method("POST")
            .uri("/api/find_cafe")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"locations":["Central Station","Old Town"],"user_requirements":"quiet"}"#,
            ))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["keywords"], "cafe");
        assert_eq!(json["participants"].as_array().unwrap().len(), 2);
        assert_eq!(json["places"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn find_cafe_rejects_empty_locations() {
        let app = build_router(state_answering("unused"));

        let req = Request::builder()
            .method("POST")
            .uri("/api/find_cafe")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"locations":[]}"#))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
