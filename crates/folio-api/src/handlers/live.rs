//! The viewer push channel and the status report.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Json;
use folio_core::models::WatchSnapshot;
use folio_core::{RelayState, ViewerHandle};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub async fn live(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| viewer_socket(socket, state))
}

async fn viewer_socket(socket: WebSocket, state: Arc<AppState>) {
    let (ws_tx, ws_rx) = socket.split();
    let ViewerHandle { id, rx } = state.viewers.register();
    info!(%id, viewers = state.viewers.viewer_count(), "viewer connected");

    forward(ws_tx, ws_rx, rx, PING_INTERVAL).await;

    state.viewers.unregister(&id);
    debug!(%id, "viewer socket closed");
}

/// Forwards relay frames to one browser until either side goes away.
/// Dropping the registry's sender (operator disconnect) closes the socket.
async fn forward<Tx, Rx, E>(
    mut ws_tx: Tx,
    mut ws_rx: Rx,
    mut frames: mpsc::Receiver<Arc<str>>,
    ping_every: Duration,
) where
    Tx: Sink<Message> + Unpin,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
{
    let mut ping = interval(ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(json) => {
                    if ws_tx.send(Message::Text(json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            },

            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },

            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub viewers: usize,
    pub relay: RelayState,
    pub watch: WatchSnapshot,
    pub offline: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        viewers: state.viewers.viewer_count(),
        relay: state.relay.state(),
        watch: state.watch_list.snapshot(),
        offline: state.is_offline(),
    })
}
