// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent-initiated persistent channel (§4.A). The actual WebSocket
//! upgrade and read loop live in `http::agent_ws`; this module is the
//! request/response correlation table and `Transport` implementation that
//! the updater calls into, grounded on the teacher's `PendingRequests`-style
//! correlation used by `ws_mux.rs`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::config::min_binary_protocol_version;
use crate::error::TransportError;
use crate::model::AgentConfig;
use crate::transport::{Frame, FrameKind, Transport};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum RequestBody {
    FetchSnapshot,
    PushConfig(AgentConfig),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum ResponseBody {
    Snapshot(Value),
    Ack,
    Error(String),
}

/// Correlated request/response channel over an already-upgraded,
/// already-authenticated WebSocket. `outbound` feeds the writer half owned
/// by `http::agent_ws`; `pending` is resolved by that same module's reader
/// loop as frames arrive.
pub struct PersistentChannel {
    outbound: mpsc::Sender<Frame>,
    pending: Mutex<HashMap<u32, oneshot::Sender<Frame>>>,
    next_id: AtomicU32,
    agent_version: semver::Version,
    fetch_timeout: Duration,
    push_timeout: Duration,
}

impl PersistentChannel {
    pub fn new(
        outbound: mpsc::Sender<Frame>,
        agent_version: semver::Version,
        fetch_timeout: Duration,
        push_timeout: Duration,
    ) -> Self {
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            agent_version,
            fetch_timeout,
            push_timeout,
        }
    }

    /// The agent version presented at upgrade time, cached by the registry
    /// so a later hub-initiated dial (which has no upgrade headers of its
    /// own) can still pick the right wire encoding (§4.A).
    pub fn agent_version(&self) -> semver::Version {
        self.agent_version.clone()
    }

    /// Called by the reader loop in `http::agent_ws` for every `Response`
    /// frame it receives; resolves the matching in-flight request, if any.
    pub fn dispatch_response(&self, frame: Frame) {
        let waiter = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&frame.id)
        };
        if let Some(waiter) = waiter {
            let _ = waiter.send(frame);
        }
    }

    fn encode(&self, body: &RequestBody) -> Result<Bytes, TransportError> {
        if self.agent_version >= min_binary_protocol_version() {
            let mut buf = Vec::new();
            ciborium::into_writer(body, &mut buf)
                .map_err(|e| TransportError::Fatal(format!("cbor encode failed: {e}")))?;
            Ok(Bytes::from(buf))
        } else {
            serde_json::to_vec(body)
                .map(Bytes::from)
                .map_err(|e| TransportError::Fatal(format!("json encode failed: {e}")))
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<ResponseBody, TransportError> {
        if self.agent_version >= min_binary_protocol_version() {
            ciborium::from_reader(payload).map_err(|e| TransportError::Fatal(format!("cbor decode failed: {e}")))
        } else {
            serde_json::from_slice(payload).map_err(|e| TransportError::Fatal(format!("json decode failed: {e}")))
        }
    }

    async fn request(&self, body: RequestBody, timeout: Duration) -> Result<ResponseBody, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).insert(id, tx);

        let payload = self.encode(&body)?;
        let frame = Frame::new(FrameKind::Request, id, payload);
        if self.outbound.send(frame).await.is_err() {
            self.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
            return Err(TransportError::Fatal("outbound channel closed".to_owned()));
        }

        let response = tokio::time::timeout(timeout, rx).await.map_err(|_| {
            self.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
            TransportError::Timeout
        })?;
        let frame = response.map_err(|_| TransportError::Fatal("response channel dropped".to_owned()))?;
        self.decode(&frame.payload)
    }
}

#[async_trait]
impl Transport for PersistentChannel {
    async fn fetch_snapshot(&self) -> Result<Value, TransportError> {
        match self.request(RequestBody::FetchSnapshot, self.fetch_timeout).await? {
            ResponseBody::Snapshot(value) => Ok(value),
            ResponseBody::Error(msg) => Err(TransportError::Transient(msg)),
            ResponseBody::Ack => Err(TransportError::Fatal("unexpected ack for fetch".to_owned())),
        }
    }

    async fn push_config(&self, config: &AgentConfig) -> Result<(), TransportError> {
        match self.request(RequestBody::PushConfig(config.clone()), self.push_timeout).await? {
            ResponseBody::Ack => Ok(()),
            ResponseBody::Error(msg) => Err(TransportError::Transient(msg)),
            ResponseBody::Snapshot(_) => Err(TransportError::Fatal("unexpected snapshot for push".to_owned())),
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.outbound
            .send(Frame::new(FrameKind::Ping, id, Bytes::new()))
            .await
            .map_err(|_| TransportError::Fatal("outbound channel closed".to_owned()))
    }

    async fn close(&self) {
        let _ = self.outbound.send(Frame::new(FrameKind::Close, 0, Bytes::new())).await;
    }
}
