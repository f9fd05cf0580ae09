// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process scaffolding for the integration tests under `tests/`,
//! grounded on the teacher's `test_support::spawn_http_server`: bind a real
//! TCP listener instead of a subprocess, so WebSocket upgrades and
//! `ConnectInfo<SocketAddr>` behave exactly as they do in production.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use ring::signature::{Ed25519KeyPair, KeyPair};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::broker::MemoryBroker;
use crate::config::{HubConfig, LogFormat};
use crate::http::build_router;
use crate::state::HubState;
use crate::store::MemoryRecordStore;
use crate::transport::{AgentIdentity, Frame, FrameKind};

/// A `HubConfig` tuned for fast, deterministic tests: short ticks, no
/// admin token, no trusted header bypass.
pub fn test_config() -> HubConfig {
    HubConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        tick_ms: 100,
        handshake_timeout_ms: 2_000,
        fetch_timeout_ms: 2_000,
        push_timeout_ms: 2_000,
        realtime_tick_ms: 100,
        universal_token_ttl_secs: 3_600,
        auto_login: None,
        trusted_auth_header: None,
        state_dir: None,
        log_format: LogFormat::Pretty,
        admin_token: None,
    }
}

/// Fresh Ed25519 identity for a test hub. Infra setup failing here is
/// fatal to the test itself, not a case under test.
#[allow(clippy::expect_used)]
pub fn test_keypair() -> Ed25519KeyPair {
    crate::generate_hub_keypair().expect("generate test hub keypair")
}

/// Generates a fresh Ed25519 identity and returns its PKCS#8 bytes, so a
/// test can reconstruct the same identity twice (`Ed25519KeyPair` is not
/// `Clone`) to simulate an agent reconnecting as itself.
pub fn generate_agent_pkcs8() -> anyhow::Result<Vec<u8>> {
    let rng = ring::rand::SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|e| anyhow::anyhow!("pkcs8 generation failed: {e}"))?;
    Ok(pkcs8.as_ref().to_vec())
}

/// A ready-to-serve `HubState` backed by the in-memory store and broker.
pub fn test_state() -> Arc<HubState> {
    test_state_with_config(test_config())
}

pub fn test_state_with_config(config: HubConfig) -> Arc<HubState> {
    let store = Arc::new(MemoryRecordStore::new());
    let broker = Arc::new(MemoryBroker::new());
    HubState::new(config, store, broker, test_keypair())
}

/// Serves `state` on a loopback ephemeral port and returns its address
/// plus the task driving `axum::serve`. The caller owns the handle; drop
/// or abort it to tear the server down.
pub async fn spawn_http_server(state: Arc<HubState>) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await;
    });
    Ok((addr, handle))
}

/// Agent version below `min_binary_protocol_version` (§9), so a
/// [`FakeAgent`]'s request/response bodies are always JSON, not CBOR.
pub const FAKE_AGENT_VERSION: &str = "0.10.0";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A scripted stand-in for the real agent binary: dials `/agent/connect`,
/// answers the hub's nonce challenge with its own Ed25519 identity, and can
/// answer `FetchSnapshot` requests with a canned payload. Grounded on the
/// `Authorization`-header WebSocket client dial pattern used for connecting
/// to a remote node in the pack's `node_proxy.rs`.
pub struct FakeAgent {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    pub keypair: Ed25519KeyPair,
}

impl FakeAgent {
    /// Connects and completes the handshake, self-registering or
    /// reconnecting depending on what `token` resolves to hub-side.
    pub async fn connect(addr: SocketAddr, token: &str, port: &str) -> anyhow::Result<Self> {
        Self::connect_as(addr, token, port, test_keypair()).await
    }

    /// Same as [`Self::connect`], but proves the identity backed by
    /// `pkcs8` rather than a fresh one, so the caller can reconnect as the
    /// same agent by passing the same bytes twice.
    pub async fn connect_with_pkcs8(addr: SocketAddr, token: &str, port: &str, pkcs8: &[u8]) -> anyhow::Result<Self> {
        let keypair = Ed25519KeyPair::from_pkcs8(pkcs8).map_err(|e| anyhow::anyhow!("keypair parse failed: {e}"))?;
        Self::connect_as(addr, token, port, keypair).await
    }

    /// Same as [`Self::connect`], but with a caller-supplied keypair so a
    /// reconnect can prove the same identity as a prior connection.
    pub async fn connect_as(addr: SocketAddr, token: &str, port: &str, keypair: Ed25519KeyPair) -> anyhow::Result<Self> {
        let url = format!("ws://{addr}/agent/connect");
        let mut request = url.into_client_request()?;
        request.headers_mut().insert("x-beszel", FAKE_AGENT_VERSION.parse()?);
        request.headers_mut().insert("x-token", token.parse()?);

        let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
        let (mut sink, mut stream) = ws.split();

        let challenge = Self::recv_frame(&mut stream).await?;
        anyhow::ensure!(challenge.kind == FrameKind::Ping, "expected Ping challenge, got {:?}", challenge.kind);

        let signature = keypair.sign(&challenge.payload).as_ref().to_vec();
        let identity = AgentIdentity {
            public_key: keypair.public_key().as_ref().to_vec(),
            signature,
            hostname: "fake-agent".to_owned(),
            port: port.to_owned(),
        };
        let pong = Frame::new(FrameKind::Pong, 0, identity.encode()?);
        sink.send(Message::Binary(pong.encode())).await?;

        Ok(Self { sink, stream, keypair })
    }

    async fn recv_frame(stream: &mut SplitStream<WsStream>) -> anyhow::Result<Frame> {
        let message = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("ws stream ended before a frame arrived"))??;
        match message {
            Message::Binary(bytes) => Frame::decode(bytes).map_err(|e| anyhow::anyhow!("frame decode: {e}")),
            other => anyhow::bail!("expected a binary frame, got {other:?}"),
        }
    }

    /// Waits for the next `Request` frame and answers it with `snapshot` as
    /// a `FetchSnapshot` response, or a bare `Ack` for a `PushConfig`.
    pub async fn serve_one_request(&mut self, snapshot: serde_json::Value) -> anyhow::Result<()> {
        let frame = Self::recv_frame(&mut self.stream).await?;
        anyhow::ensure!(frame.kind == FrameKind::Request, "expected Request frame, got {:?}", frame.kind);

        let body: crate::transport::RequestBody = serde_json::from_slice(&frame.payload)?;
        let response = match body {
            crate::transport::RequestBody::FetchSnapshot => crate::transport::ResponseBody::Snapshot(snapshot),
            crate::transport::RequestBody::PushConfig(_) => crate::transport::ResponseBody::Ack,
        };
        let payload = Bytes::from(serde_json::to_vec(&response)?);
        let reply = Frame::new(FrameKind::Response, frame.id, payload);
        self.sink.send(Message::Binary(reply.encode())).await?;
        Ok(())
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.sink.close().await?;
        Ok(())
    }
}
