// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub-initiated channel (§4.A): used when no persistent channel is
//! attached. Dials the agent's listening address directly, performs the
//! handshake in the opposite direction from the persistent channel (the hub
//! proves its identity to the agent), issues one `FetchSnapshot`, and
//! closes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::min_binary_protocol_version;
use crate::error::TransportError;
use crate::model::AgentConfig;
use crate::transport::{Frame, FrameKind, Transport};

/// One-shot outbound dial. Unlike `PersistentChannel` this holds no
/// long-lived state: it opens a socket, does its one request, and drops the
/// connection, matching the "closing after one response" contract in §4.A.
/// The keypair is `Arc`-wrapped (it is not itself `Clone`) so one hub
/// identity can back a fresh `HubInitiatedChannel` per dial without an
/// extra key load.
pub struct HubInitiatedChannel {
    host: String,
    hub_keypair: Arc<ring::signature::Ed25519KeyPair>,
    connect_timeout: Duration,
    /// Last agent version observed on the persistent channel, if any. With
    /// none on record (a system that has never held a persistent channel)
    /// this falls back to JSON, the conservative choice (§4.A, §9).
    agent_version: Option<semver::Version>,
}

impl HubInitiatedChannel {
    pub fn new(
        host: String,
        hub_keypair: Arc<ring::signature::Ed25519KeyPair>,
        connect_timeout: Duration,
        agent_version: Option<semver::Version>,
    ) -> Self {
        Self { host, hub_keypair, connect_timeout, agent_version }
    }

    fn uses_binary_protocol(&self) -> bool {
        matches!(&self.agent_version, Some(v) if *v >= min_binary_protocol_version())
    }

    fn decode_snapshot(&self, payload: &[u8]) -> Result<Value, TransportError> {
        if self.uses_binary_protocol() {
            ciborium::from_reader(payload).map_err(|e| TransportError::Fatal(format!("cbor decode failed: {e}")))
        } else {
            serde_json::from_slice(payload).map_err(|e| TransportError::Fatal(e.to_string()))
        }
    }

    fn encode_config(&self, config: &AgentConfig) -> Result<bytes::Bytes, TransportError> {
        if self.uses_binary_protocol() {
            let mut buf = Vec::new();
            ciborium::into_writer(config, &mut buf)
                .map_err(|e| TransportError::Fatal(format!("cbor encode failed: {e}")))?;
            Ok(bytes::Bytes::from(buf))
        } else {
            serde_json::to_vec(config).map(bytes::Bytes::from).map_err(|e| TransportError::Fatal(e.to_string()))
        }
    }

    async fn dial(&self) -> Result<TcpStream, TransportError> {
        tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.host))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Transient(e.to_string()))
    }

    async fn write_frame(stream: &mut TcpStream, frame: &Frame) -> Result<(), TransportError> {
        let encoded = frame.encode();
        let len = encoded.len() as u32;
        stream
            .write_all(&len.to_le_bytes())
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;
        stream.write_all(&encoded).await.map_err(|e| TransportError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn read_frame(stream: &mut TcpStream) -> Result<Frame, TransportError> {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.map_err(|e| TransportError::Transient(e.to_string()))?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await.map_err(|e| TransportError::Transient(e.to_string()))?;
        Frame::decode(bytes::Bytes::from(payload))
    }

    async fn prove_identity(&self, stream: &mut TcpStream) -> Result<(), TransportError> {
        let challenge = Self::read_frame(stream).await?;
        let pong = crate::transport::run_agent_side_handshake(challenge, |nonce| {
            self.hub_keypair.sign(nonce).as_ref().to_vec()
        })?;
        Self::write_frame(stream, &pong).await
    }

    async fn one_shot(&self, body: &FrameKind, payload: bytes::Bytes) -> Result<Frame, TransportError> {
        let mut stream = self.dial().await?;
        self.prove_identity(&mut stream).await?;
        Self::write_frame(&mut stream, &Frame::new(*body, 1, payload)).await?;
        let response = Self::read_frame(&mut stream).await?;
        let _ = stream.shutdown().await;
        Ok(response)
    }
}

#[async_trait]
impl Transport for HubInitiatedChannel {
    async fn fetch_snapshot(&self) -> Result<Value, TransportError> {
        let frame = self.one_shot(&FrameKind::Request, bytes::Bytes::new()).await?;
        if frame.kind != FrameKind::Response {
            return Err(TransportError::Fatal("expected Response frame".to_owned()));
        }
        self.decode_snapshot(&frame.payload)
    }

    async fn push_config(&self, config: &AgentConfig) -> Result<(), TransportError> {
        let payload = self.encode_config(config)?;
        let frame = self.one_shot(&FrameKind::Push, payload).await?;
        if frame.kind != FrameKind::Response {
            return Err(TransportError::Fatal("expected Response frame".to_owned()));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let mut stream = self.dial().await?;
        self.prove_identity(&mut stream).await?;
        Ok(())
    }

    async fn close(&self) {}
}
