//! WebSocket upgrade handlers for both carrier wire formats. Splits the
//! socket into a reader task (feeding `RawInbound` to the call supervisor)
//! and a writer task (draining `OutboundFrame`s back to the wire), then
//! spawns the supervisor itself.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use voice_agent_transport::{new_carrier, CarrierKind, OutboundQueue, RawInbound};

use crate::state::AppState;
use crate::supervisor::{CallContext, CallSupervisor};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    lead_id: Option<String>,
}

pub async fn telephony_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, agent_id, query, CarrierKind::Telephony))
}

pub async fn browser_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, agent_id, query, CarrierKind::Browser))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    agent_id: String,
    query: WsQuery,
    kind: CarrierKind,
) {
    let call_id = Uuid::new_v4().to_string();
    let (mut sink, mut stream) = socket.split();

    let (in_tx, in_rx) = mpsc::channel::<RawInbound>(128);
    let out_queue = OutboundQueue::new();

    let reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            let raw = match message {
                Message::Text(text) => RawInbound::Json(text),
                Message::Binary(bytes) => RawInbound::Binary(bytes),
                Message::Close(_) => break,
                _ => continue,
            };
            if in_tx.send(raw).await.is_err() {
                break;
            }
        }
    });

    let writer_queue = out_queue.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = writer_queue.recv().await {
            let message = if frame.is_text {
                Message::Text(String::from_utf8_lossy(&frame.bytes).into_owned())
            } else {
                Message::Binary(frame.bytes)
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let carrier = new_carrier(kind);
    let ctx = CallContext {
        call_id: call_id.clone(),
        lead_id: query.lead_id.unwrap_or_else(|| "unknown".to_string()),
        agent_id,
        carrier_kind: kind,
    };

    CallSupervisor::run(ctx, carrier, in_rx, out_queue, state).await;

    reader.abort();
    writer.abort();
    tracing::info!(call_id = %call_id, "call supervisor finished");
}
