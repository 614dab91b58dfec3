//! Minimal demonstration of the HTTP surface sketched in spec §6:
//! `/workspaces/{workspace_b64}/<path>`, status codes following the
//! `EngineError::kind()` → HTTP mapping of spec §7.
//!
//! This binary is not part of the library surface — the crate's
//! Non-goals explicitly keep request framing out of the core — it only
//! exists to give the URL template in spec §6 one concrete, runnable
//! answer. Grounded on `swyrknt-koru-delta`'s `src/http.rs` (state
//! extractor + per-route `Result<Json<_>, StatusCode>` handlers); the
//! workspace-id-in-path decoding is new, since the teacher has no
//! multi-tenant routing of its own.
//!
//! Run with `cargo run --features http-demo --bin http_surface`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use serde_json::{json, Value};

use novaport_engine::tools::{self, ToolName};
use novaport_engine::{EngineConfig, EngineError, WorkspaceRegistry};

#[derive(Clone)]
struct AppState {
    registry: Arc<WorkspaceRegistry>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber_init();

    let registry = Arc::new(WorkspaceRegistry::with_default_embedding(EngineConfig::default()));
    let app = router(AppState { registry });

    let addr = "127.0.0.1:8642";
    tracing::info!(%addr, "starting novaport-engine http demo");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind demo listener");
    axum::serve(listener, app).await.expect("demo server exited");
}

/// Falls back to env-filter-less `tracing_subscriber` defaults; this
/// binary is a demo, not the library, so it's fine to own its own
/// subscriber setup.
fn tracing_subscriber_init() {
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder().with_max_level(tracing::Level::INFO).finish(),
    );
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/workspaces/{workspace_b64}/product_context", get(get_product_context).put(update_product_context))
        .route("/workspaces/{workspace_b64}/active_context", get(get_active_context).put(update_active_context))
        .route("/workspaces/{workspace_b64}/decisions", get(get_decisions).post(log_decision))
        .route("/workspaces/{workspace_b64}/decisions/{decision_id}", axum::routing::delete(delete_decision))
        .route("/workspaces/{workspace_b64}/search", post(semantic_search))
        .with_state(state)
}

/// Decodes the URL-safe-base64 workspace id segment (spec §6
/// "Workspace ID on the wire"); a malformed encoding is a `transport`
/// error, mapped to 400 same as any other client-side framing mistake.
fn decode_workspace_id(workspace_b64: &str) -> Result<String, StatusCode> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(workspace_b64)
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    String::from_utf8(bytes).map_err(|_| StatusCode::BAD_REQUEST)
}

/// Maps `EngineError::kind()` to the HTTP status codes spec §7 names
/// (400/404/409/500); `transport` also maps to 400, since the only
/// transport error this surface produces is the workspace-id decode
/// above, which is caught earlier.
fn status_of(err: &EngineError) -> StatusCode {
    use novaport_engine::error::ErrorKind;
    match err.kind() {
        ErrorKind::Validation | ErrorKind::Transport => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn call(
    state: &AppState,
    workspace_id: String,
    tool: ToolName,
    mut args: Value,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(obj) = args.as_object_mut() {
        obj.insert("workspace_id".to_string(), json!(workspace_id));
    }
    tools::dispatch(&state.registry, tool, args).map(Json).map_err(|err| {
        let status = status_of(&err);
        (status, Json(json!({"error": err.kind().as_str(), "message": err.to_string()})))
    })
}

async fn get_product_context(
    State(state): State<AppState>,
    Path(workspace_b64): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = decode_workspace_id(&workspace_b64).map_err(|s| (s, Json(json!({"error": "transport"}))))?;
    call(&state, workspace_id, ToolName::GetProductContext, json!({}))
}

async fn update_product_context(
    State(state): State<AppState>,
    Path(workspace_b64): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = decode_workspace_id(&workspace_b64).map_err(|s| (s, Json(json!({"error": "transport"}))))?;
    call(&state, workspace_id, ToolName::UpdateProductContext, body)
}

async fn get_active_context(
    State(state): State<AppState>,
    Path(workspace_b64): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = decode_workspace_id(&workspace_b64).map_err(|s| (s, Json(json!({"error": "transport"}))))?;
    call(&state, workspace_id, ToolName::GetActiveContext, json!({}))
}

async fn update_active_context(
    State(state): State<AppState>,
    Path(workspace_b64): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = decode_workspace_id(&workspace_b64).map_err(|s| (s, Json(json!({"error": "transport"}))))?;
    call(&state, workspace_id, ToolName::UpdateActiveContext, body)
}

async fn get_decisions(
    State(state): State<AppState>,
    Path(workspace_b64): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = decode_workspace_id(&workspace_b64).map_err(|s| (s, Json(json!({"error": "transport"}))))?;
    call(&state, workspace_id, ToolName::GetDecisions, json!({}))
}

async fn log_decision(
    State(state): State<AppState>,
    Path(workspace_b64): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = decode_workspace_id(&workspace_b64).map_err(|s| (s, Json(json!({"error": "transport"}))))?;
    call(&state, workspace_id, ToolName::LogDecision, body)
}

async fn delete_decision(
    State(state): State<AppState>,
    Path((workspace_b64, decision_id)): Path<(String, u64)>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let workspace_id = decode_workspace_id(&workspace_b64).map_err(|s| (s, Json(json!({"error": "transport"}))))?;
    call(&state, workspace_id, ToolName::DeleteDecisionById, json!({"decision_id": decision_id}))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn semantic_search(
    State(state): State<AppState>,
    Path(workspace_b64): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = decode_workspace_id(&workspace_b64).map_err(|s| (s, Json(json!({"error": "transport"}))))?;
    call(&state, workspace_id, ToolName::SemanticSearchConport, body)
}
