// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /agent/connect`: the persistent channel upgrade (§4.A, §4.D, §6).
//! Authenticates via `X-Token`/`X-Beszel` headers before upgrading, then
//! runs the nonce/signature handshake and a framed read loop, grounded on
//! the teacher's `ws_handler`/`handle_ws` bridging shape.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::HubError;
use crate::fingerprint::{self, TokenResolution};
use crate::ids::SystemId;
use crate::model::{System, MAX_TOKEN_BYTES};
use crate::state::HubState;
use crate::transport::{AgentIdentity, Frame, FrameKind, PersistentChannel};

const OUTBOUND_BUFFER: usize = 64;

/// Reads the real client address in the priority order named in §4.D:
/// `X-Forwarded-For`, then `CF-Connecting-IP`, then the TCP peer address.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_owned();
            }
        }
    }
    if let Some(cf) = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()) {
        if !cf.is_empty() {
            return cf.to_owned();
        }
    }
    peer.ip().to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn agent_connect(
    State(state): State<Arc<HubState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(version_str) = header_str(&headers, "x-beszel") else {
        return HubError::Unauthorized.to_http_response("missing X-Beszel header").into_response();
    };
    let Ok(agent_version) = semver::Version::parse(version_str) else {
        return HubError::AuthVersionTooOld.to_http_response("unparseable agent version").into_response();
    };
    if agent_version < crate::config::min_agent_version() {
        return HubError::AuthVersionTooOld.to_http_response("agent version too old").into_response();
    }

    let Some(token_str) = header_str(&headers, "x-token") else {
        return HubError::Unauthorized.to_http_response("missing X-Token header").into_response();
    };
    if token_str.len() > MAX_TOKEN_BYTES {
        return HubError::BadRequest.to_http_response("token too long").into_response();
    }
    let token = token_str.as_bytes().to_vec();
    let ip = client_ip(&headers, peer);

    ws.on_upgrade(move |socket| handle_connection(state, agent_version, token, ip, socket))
}

async fn handle_connection(
    state: Arc<HubState>,
    agent_version: semver::Version,
    token: Vec<u8>,
    client_ip: String,
    socket: WebSocket,
) {
    let (mut sink, mut stream) = socket.split();

    let resolution = match run_challenge(&mut sink, &mut stream, &state, &token, &client_ip).await {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!(err = ?e, "agent connect rejected");
            let _ = sink.close().await;
            return;
        }
    };

    let system_id = resolution.system_id;
    let entry = match state.registry.get(&system_id).await {
        Some(entry) => entry,
        None => {
            warn!(system_id = %system_id, "system vanished between registration and attach");
            let _ = sink.close().await;
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(OUTBOUND_BUFFER);
    let channel = Arc::new(PersistentChannel::new(
        outbound_tx,
        agent_version,
        state.config.fetch_timeout(),
        state.config.push_timeout(),
    ));
    state.registry.attach_channel(&system_id, channel.clone()).await;
    info!(system_id = %system_id, new_system = resolution.is_new, "agent connected");

    if resolution.is_new {
        crate::registry::spawn_updater(
            entry.clone(),
            system_id.clone(),
            state.store.clone(),
            state.alerts.clone(),
            state.hub_initiated_for(&system_id).await,
            state.config.tick_interval(),
            std::time::Duration::ZERO,
        );
    }

    let writer = async {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(Message::Binary(frame.encode())).await.is_err() {
                break;
            }
        }
    };

    let reader = async {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Binary(bytes) => {
                    if let Ok(frame) = Frame::decode(bytes) {
                        match frame.kind {
                            FrameKind::Response => channel.dispatch_response(frame),
                            FrameKind::Close => break,
                            _ => {}
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = entry.cancel.cancelled() => {}
        _ = writer => {}
        _ = reader => {}
    }

    state.registry.detach_channel(&system_id).await;
}

struct ConnectResolution {
    system_id: SystemId,
    is_new: bool,
}

/// Runs the nonce/signature challenge and, on success, resolves the
/// connecting agent to a system: an existing one on reconnect, or a
/// freshly self-registered one via a still-live universal token (§3 S1,
/// §4.D). Fingerprint mismatches (§3 S2) are rejected without mutating any
/// row.
async fn run_challenge(
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
    state: &Arc<HubState>,
    presented_token: &[u8],
    client_ip: &str,
) -> Result<ConnectResolution, HubError> {
    let resolution = fingerprint::resolve_token(
        state.store.as_ref(),
        &state.universal_tokens,
        state.config.universal_token_ttl(),
        presented_token,
    )
    .await?;

    let nonce = fingerprint::generate_nonce()?;
    let challenge = Frame::new(FrameKind::Ping, 0, Bytes::copy_from_slice(&nonce));
    sink.send(Message::Binary(challenge.encode())).await.map_err(|_| HubError::TransportError)?;

    let response = tokio::time::timeout(state.config.handshake_timeout(), stream.next())
        .await
        .map_err(|_| HubError::TransportError)?
        .ok_or(HubError::TransportError)?
        .map_err(|_| HubError::TransportError)?;

    let pong = match response {
        Message::Binary(bytes) => Frame::decode(bytes).map_err(|_| HubError::TransportError)?,
        _ => return Err(HubError::TransportError),
    };
    if pong.kind != FrameKind::Pong {
        return Err(HubError::TransportError);
    }
    let identity = AgentIdentity::decode(&pong.payload).map_err(|_| HubError::TransportError)?;
    if !fingerprint::verify_signature(&identity.public_key, &nonce, &identity.signature) {
        return Err(HubError::AuthFingerprintMismatch);
    }
    let candidate_fingerprint = fingerprint::fingerprint_of(&identity.public_key);

    match resolution {
        TokenResolution::KnownSystem(system_id) => {
            fingerprint::compare_and_set_fingerprint(
                state.store.as_ref(),
                &system_id,
                presented_token,
                &candidate_fingerprint,
            )
            .await?;
            Ok(ConnectResolution { system_id, is_new: false })
        }
        TokenResolution::UniversalToken(owner) => {
            let host = format!("{client_ip}:{}", identity.port);
            let system: System = fingerprint::self_register(
                state.store.as_ref(),
                owner,
                host,
                presented_token.to_vec(),
                &candidate_fingerprint,
            )
            .await?;
            let system_id = system.id.clone();
            state.registry.add_system(system, &state.shutdown).await;
            Ok(ConnectResolution { system_id, is_new: true })
        }
    }
}
