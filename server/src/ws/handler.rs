use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;

use crate::error::UpgradeError;
use crate::live::frames;
use crate::state::AppState;
use crate::ws::{actor, BroadcastMessage, FacadeId, Role};

fn log_failed_upgrade(route: &'static str) -> impl FnOnce(axum::Error) + Send + 'static {
    move |e| {
        let err = UpgradeError::from(e);
        tracing::warn!(route, error = %err, "WebSocket upgrade failed");
    }
}

/// GET /ws/facade/{id}
/// Display clients follow content updates for one facade.
pub async fn facade_ws(
    State(state): State<AppState>,
    Path(facade_id): Path<FacadeId>,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    ws.on_failed_upgrade(log_failed_upgrade("facade"))
        .on_upgrade(move |socket| actor::run_connection(socket, hub, Role::FacadeViewer(facade_id)))
}

/// GET /ws/monitor
/// Operators watching the playback feed of the whole network.
pub async fn monitor_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_failed_upgrade(log_failed_upgrade("monitor"))
        .on_upgrade(move |socket| actor::run_connection(socket, hub, Role::Monitor))
}

/// GET /ws/facade/{id}/live
/// Streams one frame per second of the facade's live view until the client
/// leaves. These sockets are private to the request and never enter the hub.
pub async fn live_frames_ws(
    State(state): State<AppState>,
    Path(facade_id): Path<FacadeId>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_failed_upgrade(log_failed_upgrade("live"))
        .on_upgrade(move |socket| stream_live_frames_to(socket, state, facade_id))
}

async fn stream_live_frames_to(socket: WebSocket, state: AppState, facade_id: FacadeId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut live = frames::stream_live_frames(
        state.hub.shutdown_token(),
        facade_id,
        state.frames.clone(),
    );
    let write_timeout = state.hub.write_timeout();

    tracing::info!(facade_id, "Live frame stream started");

    let mut server_closed = false;
    loop {
        tokio::select! {
            frame = live.next() => {
                let Some(frame) = frame else {
                    server_closed = true;
                    break;
                };
                let msg = match BroadcastMessage::from(frame).to_ws_message() {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::error!(facade_id, error = %e, "Failed to encode frame");
                        break;
                    }
                };
                match timeout(write_timeout, ws_sender.send(msg)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(facade_id, error = %e, "Live frame write failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(facade_id, "Live frame write deadline exceeded");
                        break;
                    }
                }
            }
            inbound = ws_receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(facade_id, error = %e, "Live viewer receive error");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    live.cancel();

    if server_closed {
        let frame = CloseFrame {
            code: actor::CLOSE_GOING_AWAY,
            reason: "Going away".into(),
        };
        let _ = timeout(write_timeout, ws_sender.send(Message::Close(Some(frame)))).await;
    }

    tracing::info!(facade_id, "Live frame stream stopped");
}
