//! HTTP route handlers for OpenViking API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ov_core::uri::SCHEME;
use ov_parser::tree_builder::TreeBuilderConfig;
use ov_session::session::{Part, Role};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

fn to_uri(path: &str) -> String {
    format!("{SCHEME}{path}")
}

// ==================== Health / Status ====================

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/status", get(status))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
        "sessions": state.session_manager.count(),
        "queue_size": state.queue.size().await,
    }))
}

// ==================== Context / Memory routes ====================
//
// Mirrors `ov-cli`'s subcommand set (§6): list/read a directory, fetch
// its abstract/overview, add a resource or skill (staged through the
// same `TreeBuilder` + `SemanticProcessor` pipeline), remove, move, link,
// and search (`find` for a single typed query, `search` for the full
// intent-analyzed path).

pub fn context_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/resources", post(add_resource))
        .route("/api/v1/skills", post(add_skill))
        .route("/api/v1/find", get(find))
        .route("/api/v1/search", get(search))
        .route(
            "/api/v1/contexts/{*uri_path}",
            get(get_context).delete(delete_context),
        )
        .route("/api/v1/move", post(move_context))
        .route("/api/v1/link", post(link_context))
}

#[derive(Deserialize)]
pub struct AddBody {
    pub title: Option<String>,
    pub content: String,
}

async fn add(state: &AppState, scope_base: &str, body: AddBody) -> Result<(StatusCode, Json<Value>)> {
    if body.content.is_empty() {
        return Err(ApiError::bad_request("content is required"));
    }
    let title = body.title.unwrap_or_else(|| "untitled".to_string());
    let builder = state.tree_builder();
    let staged = builder
        .stage(&title, &body.content, &TreeBuilderConfig::default())
        .await?;
    let msgs = builder
        .promote(&staged, scope_base, state.queue.as_ref(), state.seq.as_ref())
        .await?;
    let processed = state.processor.drain().await?;
    Ok((StatusCode::CREATED, Json(json!({ "queued": msgs.len(), "processed": processed }))))
}

async fn add_resource(State(state): State<AppState>, Json(body): Json<AddBody>) -> Result<(StatusCode, Json<Value>)> {
    add(&state, "viking://resources", body).await
}

async fn add_skill(State(state): State<AppState>, Json(body): Json<AddBody>) -> Result<(StatusCode, Json<Value>)> {
    add(&state, "viking://agent/skills", body).await
}

#[derive(Deserialize)]
pub struct FindQuery {
    q: String,
    #[serde(rename = "type")]
    context_type: Option<String>,
    limit: Option<usize>,
}

async fn find(State(state): State<AppState>, Query(q): Query<FindQuery>) -> Result<Json<Value>> {
    if q.q.is_empty() {
        return Err(ApiError::bad_request("query parameter \"q\" is required"));
    }
    let context_type = q.context_type.unwrap_or_else(|| "resource".to_string());
    let matches = state.retrieval.find(&q.q, &context_type, q.limit).await?;
    Ok(Json(json!({ "matches": matches, "query": q.q })))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: String,
    session_summary: Option<String>,
    limit: Option<usize>,
}

async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> Result<Json<Value>> {
    if q.q.is_empty() {
        return Err(ApiError::bad_request("query parameter \"q\" is required"));
    }
    let summary = q.session_summary.unwrap_or_default();
    let matches = state.retrieval.search(&summary, &[], &q.q, q.limit).await?;
    Ok(Json(json!({ "matches": matches, "query": q.q })))
}

#[derive(Serialize)]
struct ContextView {
    uri: String,
    is_dir: bool,
    entries: Vec<ov_storage::DirEntry>,
    #[serde(rename = "abstract")]
    abstract_text: String,
    overview: String,
}

async fn get_context(State(state): State<AppState>, Path(uri_path): Path<String>) -> Result<Json<Value>> {
    let uri = to_uri(&uri_path);
    if !state.vfs.exists(&uri).await {
        return Err(ApiError::not_found(format!("context not found: {uri}")));
    }
    let is_dir = state.vfs.is_dir(&uri).await;
    let entries = if is_dir { state.vfs.ls(&uri).await? } else { Vec::new() };
    let abstract_text = state.vfs.abstract_text(&uri).await.unwrap_or_default();
    let overview = state.vfs.overview(&uri).await.unwrap_or_default();
    Ok(Json(json!({ "context": ContextView { uri, is_dir, entries, abstract_text, overview } })))
}

async fn delete_context(State(state): State<AppState>, Path(uri_path): Path<String>) -> Result<StatusCode> {
    let uri = to_uri(&uri_path);
    if !state.vfs.exists(&uri).await {
        return Err(ApiError::not_found(format!("context not found: {uri}")));
    }
    state.vfs.rm(&uri, true).await?;
    state.index.delete_prefix(&uri).await.map_err(ov_core::error::OvError::Other)?;
    state.queue.purge_prefix(&uri).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct MoveBody {
    pub from_uri: String,
    pub to_uri: String,
}

async fn move_context(State(state): State<AppState>, Json(body): Json<MoveBody>) -> Result<Json<Value>> {
    state.vfs.mv(&body.from_uri, &body.to_uri).await?;
    Ok(Json(json!({ "from": body.from_uri, "to": body.to_uri })))
}

#[derive(Deserialize)]
pub struct LinkBody {
    pub from_uri: String,
    pub to_uri: String,
    #[serde(default)]
    pub reason: String,
}

async fn link_context(State(state): State<AppState>, Json(body): Json<LinkBody>) -> Result<(StatusCode, Json<Value>)> {
    state
        .vfs
        .link(&body.from_uri, std::slice::from_ref(&body.to_uri), &body.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "linked": body.from_uri, "to": body.to_uri }))))
}

// ==================== Session Routes ====================

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/v1/sessions/{id}",
            get(get_session).delete(close_session),
        )
        .route("/api/v1/sessions/{id}/messages", post(add_message))
        .route("/api/v1/sessions/{id}/commit", post(commit_session))
}

#[derive(Deserialize)]
pub struct CreateSessionBody {
    pub user_id: String,
    pub id: Option<String>,
}

async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<Value>)> {
    if body.user_id.is_empty() {
        return Err(ApiError::bad_request("user_id is required"));
    }
    let session = if let Some(id) = body.id {
        if state.session_manager.get(&id).is_some() {
            return Err(ApiError::conflict(format!("session already exists: {id}")));
        }
        state.session_manager.create_with_id(id, &body.user_id)
    } else {
        state.session_manager.create(&body.user_id)
    };
    Ok((StatusCode::CREATED, Json(json!({ "session": session }))))
}

#[derive(Deserialize)]
pub struct SessionListQuery {
    user_id: Option<String>,
    active_only: Option<bool>,
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(q): Query<SessionListQuery>,
) -> Json<Value> {
    let sessions = if q.active_only.unwrap_or(false) {
        state.session_manager.list_active()
    } else if let Some(ref uid) = q.user_id {
        state.session_manager.list_by_user(uid)
    } else {
        state.session_manager.list_active()
    };
    Json(json!({
        "sessions": sessions,
        "count": sessions.len(),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let session = state.session_manager.get(&id)
        .ok_or_else(|| ApiError::not_found(format!("session not found: {id}")))?;
    Ok(Json(json!({ "session": session })))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.session_manager.close(&id) {
        return Err(ApiError::not_found(format!("session not found: {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AddMessageBody {
    pub role: String,
    pub content: String,
}

async fn add_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddMessageBody>,
) -> Result<(StatusCode, Json<Value>)> {
    let mut session = state.session_manager.get(&id)
        .ok_or_else(|| ApiError::not_found(format!("session not found: {id}")))?;
    let role = match body.role.as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "system" => Role::System,
        "tool" => Role::Tool,
        _ => return Err(ApiError::bad_request(format!("invalid role: {}", body.role))),
    };
    let msg = session.add_message(role, vec![Part::text(&body.content)]).clone();
    state.session_manager.update(&session);
    Ok((StatusCode::CREATED, Json(json!({ "message": msg }))))
}

async fn commit_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let mut session = state.session_manager.get(&id)
        .ok_or_else(|| ApiError::not_found(format!("session not found: {id}")))?;
    let messages = session.commit();
    state.session_manager.update(&session);
    Ok(Json(json!({
        "committed_messages": messages.len(),
        "session": session,
    })))
}
