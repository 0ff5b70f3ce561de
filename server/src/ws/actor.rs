use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::ws::{Connection, Hub, Role};

/// Close code sent when the server drops a client it could not write to
/// or when the hub shuts down.
pub(crate) const CLOSE_GOING_AWAY: u16 = 1001;

/// Run the actor-per-connection pattern for an accepted socket.
///
/// The connection is registered for its whole lifetime:
/// - Writer task: owns the sink, drains the outbound queue, bounds each write
/// - Reader loop: only watches for disconnects; inbound payloads are ignored
///
/// Whichever side notices the end first closes and unregisters the connection;
/// the other side follows.
pub async fn run_connection(socket: WebSocket, hub: Hub, role: Role) {
    let (ws_sender, ws_receiver) = socket.split();
    let (conn, rx) = hub.open_connection(role);

    tracing::info!(
        connection_id = %conn.id(),
        role = %role,
        "WebSocket actor started"
    );

    let writer_handle = tokio::spawn(writer_task(
        ws_sender,
        rx,
        hub.clone(),
        conn.clone(),
        hub.write_timeout(),
    ));

    read_until_closed(ws_receiver, &conn, role).await;

    // Closing wakes the writer, which sends the close frame and exits.
    hub.disconnect(&conn);
    let mut writer_handle = writer_handle;
    if timeout(hub.write_timeout(), &mut writer_handle).await.is_err() {
        tracing::debug!(connection_id = %conn.id(), "Writer did not finish in time");
        writer_handle.abort();
    }

    tracing::info!(
        connection_id = %conn.id(),
        role = %role,
        "WebSocket actor stopped"
    );
}

/// Reader loop: returns once the peer goes away, errors, or the connection
/// is closed from the hub side.
async fn read_until_closed(mut ws_receiver: SplitStream<WebSocket>, conn: &Connection, role: Role) {
    loop {
        tokio::select! {
            _ = conn.closed() => {
                tracing::debug!(connection_id = %conn.id(), "Connection closed by hub");
                break;
            }
            next = ws_receiver.next() => match next {
                Some(Ok(Message::Ping(data))) => {
                    conn.try_send(Message::Pong(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(
                        connection_id = %conn.id(),
                        role = %role,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
                Some(Ok(_)) => {
                    // Displays have nothing to tell the hub yet.
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        connection_id = %conn.id(),
                        role = %role,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
                None => {
                    tracing::info!(connection_id = %conn.id(), "WebSocket stream ended");
                    break;
                }
            }
        }
    }
}

/// Writer task: forwards queued frames to the sink. A failed or late write
/// takes the connection out of the hub.
async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
    hub: Hub,
    conn: Connection,
    write_timeout: Duration,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = conn.closed() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => return,
            },
        };

        match timeout(write_timeout, ws_sender.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(connection_id = %conn.id(), error = %e, "WebSocket send failed");
                hub.disconnect(&conn);
                return;
            }
            Err(_) => {
                tracing::warn!(connection_id = %conn.id(), "WebSocket write deadline exceeded");
                hub.disconnect(&conn);
                return;
            }
        }
    }

    let frame = CloseFrame {
        code: CLOSE_GOING_AWAY,
        reason: "Going away".into(),
    };
    let _ = timeout(write_timeout, ws_sender.send(Message::Close(Some(frame)))).await;
}
