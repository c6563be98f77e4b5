use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use futures::stream::SplitSink;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::warn;

use paneboard_core::bridge::InjectPayload;
use paneboard_core::hub::SUBSCRIBER_BUFFER;
use paneboard_core::state::ChannelKind;
use paneboard_core::wire::ClientFrame;
use paneboard_core::wire::Frame;

use super::AppState;

pub(crate) async fn ws_endpoint(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Subscriber connection lifecycle: require a join frame, register with the
/// channel hub, pump hub frames and heartbeats out, forward console text
/// submissions to the commander pane, and leave exactly once on disconnect.
/// Reconnection is the client's job; rejoining is cheap and idempotent.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let channel = loop {
        match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(ClientFrame::Join { channel }) => break channel,
                    Err(err) => {
                        debug!(error = %err, "rejecting pre-join frame");
                        let body = json!({
                            "type": "error",
                            "reason": "expected a join frame",
                        });
                        let _ = ws_tx.send(Message::Text(body.to_string().into())).await;
                        return;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(_)) => return,
        }
    };

    let hub = Arc::clone(state.registry.hub(channel));
    let (frame_tx, mut frame_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
    let subscriber = hub.join(frame_tx).await;

    let mut heartbeat = tokio::time::interval(Duration::from_millis(
        state.settings.server.heartbeat_interval_ms,
    ));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                if send_frame(&mut ws_tx, &frame).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if send_frame(&mut ws_tx, &Frame::Heartbeat).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if channel == ChannelKind::Console {
                            forward_command(&state, text.as_str()).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => break,
                }
            }
        }
    }

    hub.leave(subscriber).await;
}

async fn send_frame(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    frame: &Frame,
) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(body) => ws_tx.send(Message::Text(body.into())).await,
        // Our own frames always serialize; nothing useful to send otherwise.
        Err(_) => Ok(()),
    }
}

/// Plain-text submission on the command channel: inject into the commander
/// pane under its serialization lock.
async fn forward_command(state: &AppState, text: &str) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let bridge = Arc::clone(&state.bridge);
    let target = state.commander.clone();
    let payload = InjectPayload::Text(trimmed.to_string());
    if let Err(err) = state
        .runtime
        .run_inject(&state.commander, move || bridge.inject(&target, &payload))
        .await
    {
        warn!(error = %err, "console command inject failed");
    }
}
