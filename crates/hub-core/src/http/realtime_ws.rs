// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /rt_metrics/{system_id}`: the realtime subscription endpoint (§4.E).
//! One WebSocket per admin client; subscribing joins the system's feed on
//! `RealtimeWorker`, which lazily starts the 1 Hz puller on the first
//! subscriber and stops it once the last one disconnects.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use crate::ids::{ClientId, SystemId};
use crate::state::HubState;

pub async fn subscribe(
    State(state): State<Arc<HubState>>,
    Path(system_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_subscription(state, SystemId::from(system_id), socket))
}

async fn handle_subscription(state: Arc<HubState>, system_id: SystemId, socket: WebSocket) {
    let client = ClientId::from(crate::ids::new_id());
    let mut receiver = state.realtime.subscribe(system_id.clone(), client.clone()).await;
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            message = receiver.recv() => {
                let Ok(message) = message else { break };
                let Ok(text) = serde_json::to_string(&message) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.realtime.unsubscribe(&system_id, client).await;
}
