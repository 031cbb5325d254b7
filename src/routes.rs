//! HTTP surface of the task board.
//!
//! Every handler is a thin adapter over an `*_impl` command: it extracts
//! parameters, calls the command and maps [`InfraError`] onto a status code
//! with a JSON body of the form `{"error": "...", "kind": "..."}`.
//!
//! | Method | Path | Command |
//! |--------|------|---------|
//! | GET | `/health` | liveness |
//! | GET | `/api/auth/google` | session introspection |
//! | GET | `/api/auth/google/authorize` | consent URL |
//! | GET | `/api/auth/google/callback` | code exchange (provider redirect) |
//! | POST | `/api/auth/google/callback` | code exchange (JSON body) |
//! | POST | `/api/auth/google/signout` | sign out |
//! | GET | `/api/calendar/events` | event listing |
//! | POST | `/api/calendar/sync` | calendar sync |
//! | GET | `/api/calendar/tasks` | calendar board |
//! | POST | `/api/calendar/tasks/{id}/move` | calendar board move |
//! | GET, POST, DELETE | `/api/tasks` | manual board |
//! | POST | `/api/tasks/{id}/move` | manual board move |
//! | PUT | `/api/tasks/{id}/quadrant` | matrix placement |
//! | DELETE | `/api/tasks/{id}` | delete |
//! | POST | `/api/tasks/clear-done`, `/api/tasks/reset` | bulk edits |
//! | GET, PUT | `/api/settings` | settings |
//! | POST | `/api/settings/mode/toggle` | mode toggle |

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};

use crate::application::commands::{
    AppState, add_task_impl, authorize_url_impl, clear_all_tasks_impl, clear_done_tasks_impl,
    complete_sign_in_impl, delete_task_impl, get_session_impl, get_settings_impl,
    list_calendar_events_impl, list_calendar_tasks_impl, list_tasks_impl,
    move_calendar_task_impl, move_task_impl, reset_tasks_impl, set_task_quadrant_impl,
    sign_out_impl, sync_calendar_impl, toggle_mode_impl, update_settings_impl,
};
use crate::domain::models::AppSettings;
use crate::infrastructure::error::InfraError;

pub type SharedState = Arc<AppState>;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/api/auth/google", get(get_session))
        .route("/api/auth/google/authorize", get(get_authorize_url))
        .route(
            "/api/auth/google/callback",
            get(get_oauth_callback).post(post_oauth_callback),
        )
        .route("/api/auth/google/signout", post(post_sign_out))
        .route("/api/calendar/events", get(get_calendar_events))
        .route("/api/calendar/sync", post(post_calendar_sync))
        .route("/api/calendar/tasks", get(get_calendar_tasks))
        .route("/api/calendar/tasks/{id}/move", post(post_move_calendar_task))
        .route(
            "/api/tasks",
            get(get_tasks).post(post_task).delete(delete_all_tasks),
        )
        .route("/api/tasks/clear-done", post(post_clear_done))
        .route("/api/tasks/reset", post(post_reset_tasks))
        .route("/api/tasks/{id}", delete(delete_task))
        .route("/api/tasks/{id}/move", post(post_move_task))
        .route("/api/tasks/{id}/quadrant", put(put_task_quadrant))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/settings/mode/toggle", post(post_toggle_mode))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    kind: String,
}

/// Error wrapper that renders as a JSON response.
pub struct ApiError(InfraError);

impl From<InfraError> for ApiError {
    fn from(error: InfraError) -> Self {
        Self(error)
    }
}

pub fn status_for(error: &InfraError) -> StatusCode {
    match error {
        InfraError::AuthExpired(_) | InfraError::RefreshFailed => StatusCode::UNAUTHORIZED,
        InfraError::InvalidConfig(_) | InfraError::OAuth(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    syncing: bool,
}

async fn get_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        syncing: state.is_syncing(),
    })
}

async fn get_session(State(state): State<SharedState>) -> Response {
    match get_session_impl(&state).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => ApiError(state.command_error("get_session", error)).into_response(),
    }
}

async fn get_authorize_url(State(state): State<SharedState>) -> Response {
    match authorize_url_impl(&state) {
        Ok(response) => Json(response).into_response(),
        Err(error) => ApiError(state.command_error("authorize_url", error)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct OAuthCallback {
    code: String,
    #[serde(default)]
    state: Option<String>,
}

async fn get_oauth_callback(
    State(state): State<SharedState>,
    Query(callback): Query<OAuthCallback>,
) -> Response {
    match complete_sign_in_impl(&state, callback.code, callback.state).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => ApiError(state.command_error("complete_sign_in", error)).into_response(),
    }
}

async fn post_oauth_callback(
    State(state): State<SharedState>,
    Json(callback): Json<OAuthCallback>,
) -> Response {
    match complete_sign_in_impl(&state, callback.code, callback.state).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => ApiError(state.command_error("complete_sign_in", error)).into_response(),
    }
}

async fn post_sign_out(State(state): State<SharedState>) -> Response {
    match sign_out_impl(&state) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => ApiError(state.command_error("sign_out", error)).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct DaysQuery {
    #[serde(default)]
    days: Option<String>,
}

async fn get_calendar_events(
    State(state): State<SharedState>,
    Query(query): Query<DaysQuery>,
) -> Response {
    match list_calendar_events_impl(&state, query.days).await {
        Ok(events) => Json(events).into_response(),
        Err(error) => ApiError(state.command_error("list_calendar_events", error)).into_response(),
    }
}

async fn post_calendar_sync(
    State(state): State<SharedState>,
    Query(query): Query<DaysQuery>,
) -> Response {
    match sync_calendar_impl(&state, query.days).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => ApiError(state.command_error("sync_calendar", error)).into_response(),
    }
}

async fn get_calendar_tasks(State(state): State<SharedState>) -> Response {
    Json(list_calendar_tasks_impl(&state)).into_response()
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    status: String,
    #[serde(default)]
    index: usize,
}

async fn post_move_calendar_task(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Response {
    match move_calendar_task_impl(&state, task_id, request.status, request.index) {
        Ok(tasks) => Json(tasks).into_response(),
        Err(error) => ApiError(state.command_error("move_calendar_task", error)).into_response(),
    }
}

async fn get_tasks(State(state): State<SharedState>) -> Response {
    match list_tasks_impl(&state) {
        Ok(tasks) => Json(tasks).into_response(),
        Err(error) => ApiError(state.command_error("list_tasks", error)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct NewTaskRequest {
    text: String,
}

async fn post_task(
    State(state): State<SharedState>,
    Json(request): Json<NewTaskRequest>,
) -> Response {
    match add_task_impl(&state, request.text) {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(error) => ApiError(state.command_error("add_task", error)).into_response(),
    }
}

async fn delete_all_tasks(State(state): State<SharedState>) -> Response {
    match clear_all_tasks_impl(&state) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => ApiError(state.command_error("clear_all_tasks", error)).into_response(),
    }
}

#[derive(Debug, Serialize)]
struct RemovedResponse {
    removed: usize,
}

async fn post_clear_done(State(state): State<SharedState>) -> ApiResult<RemovedResponse> {
    let removed = clear_done_tasks_impl(&state)
        .map_err(|error| state.command_error("clear_done_tasks", error))?;
    Ok(Json(RemovedResponse { removed }))
}

async fn post_reset_tasks(State(state): State<SharedState>) -> Response {
    match reset_tasks_impl(&state) {
        Ok(tasks) => Json(tasks).into_response(),
        Err(error) => ApiError(state.command_error("reset_tasks", error)).into_response(),
    }
}

async fn delete_task(State(state): State<SharedState>, Path(task_id): Path<String>) -> Response {
    match delete_task_impl(&state, task_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(error) => ApiError(state.command_error("delete_task", error)).into_response(),
    }
}

async fn post_move_task(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Response {
    match move_task_impl(&state, task_id, request.status, request.index) {
        Ok(tasks) => Json(tasks).into_response(),
        Err(error) => ApiError(state.command_error("move_task", error)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct QuadrantRequest {
    quadrant: u8,
}

async fn put_task_quadrant(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
    Json(request): Json<QuadrantRequest>,
) -> Response {
    match set_task_quadrant_impl(&state, task_id, request.quadrant) {
        Ok(task) => Json(task).into_response(),
        Err(error) => ApiError(state.command_error("set_task_quadrant", error)).into_response(),
    }
}

async fn get_settings(State(state): State<SharedState>) -> Json<AppSettings> {
    Json(get_settings_impl(&state))
}

async fn put_settings(
    State(state): State<SharedState>,
    Json(settings): Json<AppSettings>,
) -> ApiResult<AppSettings> {
    let settings = update_settings_impl(&state, settings)
        .map_err(|error| state.command_error("update_settings", error))?;
    Ok(Json(settings))
}

async fn post_toggle_mode(State(state): State<SharedState>) -> ApiResult<AppSettings> {
    let settings =
        toggle_mode_impl(&state).map_err(|error| state.command_error("toggle_mode", error))?;
    Ok(Json(settings))
}
