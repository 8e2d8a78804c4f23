// src/server/routes.rs

//! HTTP handlers.
//!
//! | Method | Path                     | Mode                          |
//! |--------|--------------------------|-------------------------------|
//! | GET    | `/health`                | liveness                      |
//! | POST   | `/api/run`               | streaming (`text/event-stream`) |
//! | DELETE | `/api/run/{id}`          | cancel a live run             |
//! | POST   | `/api/components/add`    | collected result              |
//! | POST   | `/api/components/files`  | file install                  |

use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::classify::ActionResult;
use crate::exec::{ProcessRequest, RequestFlags};
use crate::install::{AddComponentInput, InstallError, InstallFilesInput};
use crate::types::RunId;

use super::error::{AppError, AppResult};
use super::state::AppState;

pub const RUN_ID_HEADER: &str = "x-run-id";

/// Body of `POST /api/run`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunPayload {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: String,
    /// Run through the platform shell.
    #[serde(default)]
    pub shell: bool,
    #[serde(default)]
    pub overwrite: bool,
    /// Classifier policy name; `default` when absent.
    #[serde(default)]
    pub policy: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Spawn the command and stream its events as SSE records. The response
/// ends right after the `exit` (or `cancelled`) record.
pub async fn run_stream(
    State(state): State<AppState>,
    Json(payload): Json<RunPayload>,
) -> AppResult<Response> {
    if payload.command.trim().is_empty() {
        return Err(AppError::BadRequest("command must not be empty".to_string()));
    }
    if payload.cwd.trim().is_empty() {
        return Err(AppError::BadRequest("cwd must not be empty".to_string()));
    }
    let policy = state
        .policies
        .resolve(payload.policy.as_deref())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "unknown classifier policy '{}'",
                payload.policy.as_deref().unwrap_or_default()
            ))
        })?;

    let request = ProcessRequest::new(payload.command, payload.args, payload.cwd).with_flags(
        RequestFlags {
            overwrite: payload.overwrite,
            shell: payload.shell,
        },
    );
    info!(cmd = %request.command_line(), cwd = %request.cwd().display(), "streaming run requested");

    let run = state.relay.stream(request, policy).await?;
    let id = run.id();

    let records = run.into_events().map(|event| Event::default().json_data(event));
    let mut response = match state.keep_alive {
        Some(interval) => Sse::new(records)
            .keep_alive(KeepAlive::new().interval(interval))
            .into_response(),
        None => Sse::new(records).into_response(),
    };
    response
        .headers_mut()
        .insert(HeaderName::from_static(RUN_ID_HEADER), HeaderValue::from(id.0));
    Ok(response)
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id: RunId = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid run id '{id}'")))?;
    if !state.relay.table().cancel(id) {
        return Err(AppError::NotFound(format!("no live run with id {id}")));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "id": id.0, "cancelled": true })),
    ))
}

/// Collected-result action: `{success: true}` or `{success: false, error}`.
/// Invalid input keeps the same shape with status 400.
pub async fn add_component(
    State(state): State<AppState>,
    Json(input): Json<AddComponentInput>,
) -> Response {
    match state.installer.add(input).await {
        Ok(outcome) => Json(ActionResult::from(outcome)).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, Json(ActionResult::failed(err.to_string())))
            .into_response(),
    }
}

pub async fn install_files(
    State(state): State<AppState>,
    Json(input): Json<InstallFilesInput>,
) -> Response {
    let files = input.into_files();
    match state.installer.write_files(&files) {
        Ok(_) => Json(ActionResult::ok()).into_response(),
        Err(err) if err.is_invalid_input() => {
            (StatusCode::BAD_REQUEST, Json(ActionResult::failed(err.to_string()))).into_response()
        }
        Err(err @ InstallError::Write(_)) => {
            warn!(error = %err, "file install failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ActionResult::failed(err.to_string())),
            )
                .into_response()
        }
        Err(err) => Json(ActionResult::failed(err.to_string())).into_response(),
    }
}
