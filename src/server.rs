//! HTTP server for the browser client.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/search?q=` | Web-search proxy; attaches the subscription token |
//! | `POST` | `/api/context` | Memory and RAG blocks for `{ "query", "turns"?, "session"? }` |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/*` | Static client files, when `[server].static_dir` is set |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Missing query" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500),
//! `upstream_error` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use teapot_core::models::ConversationTurn;

use crate::chat::{ChatEngine, ContextBlocks};

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<ChatEngine>,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(engine: Arc<ChatEngine>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(engine.config().search.timeout_secs))
            .build()?;
        Ok(Self { engine, http })
    }
}

/// Build the router, including the static file service when configured.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.engine.config().server.static_dir.clone();

    let app = Router::new()
        .route("/api/search", get(handle_search))
        .route("/api/context", post(handle_context))
        .route("/health", get(handle_health))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(cors)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(engine: Arc<ChatEngine>) -> anyhow::Result<()> {
    let bind_addr = engine.config().server.bind.clone();
    if let Some(dir) = &engine.config().server.static_dir {
        tracing::info!(dir = %dir.display(), "serving static client");
    }

    let app = router(AppState::new(engine)?);

    println!("teapot server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

/// Forward `q` to the upstream search API and relay its JSON body.
async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(bad_request("Missing query"));
    }

    let search = &state.engine.config().search;
    let token = std::env::var(&search.api_key_env)
        .map_err(|_| internal(format!("{} is not set", search.api_key_env)))?;

    let response = state
        .http
        .get(&search.endpoint)
        .query(&[("q", query.as_str())])
        .header("Accept", "application/json")
        .header("X-Subscription-Token", token)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "search upstream unreachable");
            upstream_error("Search request failed")
        })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(%status, "search upstream returned an error");
        return Err(upstream_error(format!("Search upstream returned {}", status)));
    }

    let body = response
        .json::<serde_json::Value>()
        .await
        .map_err(|_| upstream_error("Search upstream returned invalid JSON"))?;
    Ok(Json(body))
}

// ============ POST /api/context ============

/// Memory comes from `turns` when given, else from the stored `session`,
/// else from the server's active session.
#[derive(Deserialize)]
struct ContextRequest {
    query: String,
    #[serde(default)]
    turns: Option<Vec<ConversationTurn>>,
    #[serde(default)]
    session: Option<String>,
}

async fn handle_context(
    State(state): State<AppState>,
    Json(req): Json<ContextRequest>,
) -> Result<Json<ContextBlocks>, AppError> {
    let engine = &state.engine;
    let blocks = match (req.turns, req.session) {
        (Some(turns), _) => engine.context_with_turns(&req.query, &turns).await,
        (None, Some(id)) => {
            let turns = engine
                .session_turns(&id)
                .await
                .ok_or_else(|| not_found(format!("session not found: {}", id)))?;
            engine.context_with_turns(&req.query, &turns).await
        }
        (None, None) => engine.context(&req.query).await,
    };
    Ok(Json(blocks))
}
