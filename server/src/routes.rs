use std::sync::Arc;

use axum::Form;
use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Deserialize;
use serde::Serialize;
use tracing::error;

use paneboard_core::bridge::BridgeError;
use paneboard_core::bridge::InjectPayload;
use paneboard_core::config::PollTuning;
use paneboard_core::config::ReconnectSettings;
use paneboard_core::history::CommandEntry;
use paneboard_core::report::StoreError;
use paneboard_core::state::ChannelKind;

use super::AppState;

#[derive(Debug)]
pub(crate) enum ApiError {
    Inject(BridgeError),
    Report(StoreError),
    History(String),
    UnknownChannel(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Inject(BridgeError::KeyNotAllowed { key }) => (
                StatusCode::BAD_REQUEST,
                format!("key '{key}' is not allowed"),
            ),
            ApiError::Inject(BridgeError::PaneNotFound { target }) => (
                StatusCode::NOT_FOUND,
                format!("pane {target} no longer exists"),
            ),
            ApiError::Inject(err) => {
                error!(error = %err, "inject failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Report(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, "report not found".to_string())
            }
            ApiError::Report(err) => {
                error!(error = %err, "report read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::History(message) => {
                error!(error = %message, "history read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            ApiError::UnknownChannel(name) => {
                (StatusCode::NOT_FOUND, format!("unknown channel '{name}'"))
            }
        };
        let body = Json(StatusBody {
            status: "error",
            message: Some(message),
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
pub(crate) struct StatusBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

pub(crate) async fn healthz() -> Json<StatusBody> {
    Json(StatusBody {
        status: "ok",
        message: None,
    })
}

/// Current report content through the mtime-gated cache.
pub(crate) async fn dashboard(State(state): State<AppState>) -> Result<String, ApiError> {
    let report = Arc::clone(&state.report);
    state
        .runtime
        .run(move || report.get())
        .await
        .map_err(ApiError::Report)
}

#[derive(Deserialize)]
pub(crate) struct CommandForm {
    instruction: String,
}

#[derive(Serialize)]
pub(crate) struct CommandSent {
    status: &'static str,
    cmd_id: String,
}

/// Inject a plain-text instruction into the commander pane and log it to the
/// command queue.
pub(crate) async fn send_command(
    State(state): State<AppState>,
    Form(form): Form<CommandForm>,
) -> Result<Json<CommandSent>, ApiError> {
    let bridge = Arc::clone(&state.bridge);
    let target = state.commander.clone();
    let payload = InjectPayload::Text(form.instruction.clone());
    state
        .runtime
        .run_inject(&state.commander, move || bridge.inject(&target, &payload))
        .await
        .map_err(ApiError::Inject)?;

    let history = Arc::clone(&state.history);
    let instruction = form.instruction;
    let cmd_id = state
        .runtime
        .run(move || history.append(&instruction))
        .await
        .map_err(|err| ApiError::History(err.to_string()))?;

    Ok(Json(CommandSent {
        status: "sent",
        cmd_id,
    }))
}

#[derive(Deserialize)]
pub(crate) struct SpecialKeyRequest {
    key: String,
}

#[derive(Serialize)]
pub(crate) struct SpecialKeySent {
    status: &'static str,
    key: String,
}

/// Inject one allowlisted special key into the commander pane.
pub(crate) async fn send_special_key(
    State(state): State<AppState>,
    Json(request): Json<SpecialKeyRequest>,
) -> Result<Json<SpecialKeySent>, ApiError> {
    let payload = InjectPayload::special_key(&request.key).map_err(ApiError::Inject)?;
    let bridge = Arc::clone(&state.bridge);
    let target = state.commander.clone();
    state
        .runtime
        .run_inject(&state.commander, move || bridge.inject(&target, &payload))
        .await
        .map_err(ApiError::Inject)?;
    Ok(Json(SpecialKeySent {
        status: "sent",
        key: request.key,
    }))
}

/// Logged commands, newest first.
pub(crate) async fn history(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommandEntry>>, ApiError> {
    let history = Arc::clone(&state.history);
    state
        .runtime
        .run(move || history.read_newest_first())
        .await
        .map(Json)
        .map_err(|err| ApiError::History(err.to_string()))
}

pub(crate) async fn clear_monitor(State(state): State<AppState>) -> Json<StatusBody> {
    state.registry.clear(ChannelKind::Monitor).await;
    Json(StatusBody {
        status: "cleared",
        message: None,
    })
}

pub(crate) async fn revive_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<StatusBody>, ApiError> {
    let channel: ChannelKind = channel
        .parse()
        .map_err(|_| ApiError::UnknownChannel(channel))?;
    state.registry.revive(channel);
    Ok(Json(StatusBody {
        status: "revived",
        message: None,
    }))
}

#[derive(Serialize)]
pub(crate) struct WsConfig {
    reconnect: ReconnectSettings,
    channels: WsChannelConfig,
}

#[derive(Serialize)]
pub(crate) struct WsChannelConfig {
    console: PollTuning,
    monitor: PollTuning,
}

/// Reconnection contract and polling intervals, straight from settings.
pub(crate) async fn ws_config(State(state): State<AppState>) -> Json<WsConfig> {
    Json(WsConfig {
        reconnect: state.settings.reconnect.clone(),
        channels: WsChannelConfig {
            console: state.settings.channels.console,
            monitor: state.settings.channels.monitor,
        },
    })
}
