// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport layer (§4.A): the `Transport` contract both channel kinds
//! implement, the wire frame, the persistent (agent-initiated) channel, the
//! hub-initiated tunnel, and the handshake shared by both.

mod frame;
mod handshake;
mod persistent;
mod select;
mod tunnel;

pub use frame::{Frame, FrameKind};
pub use handshake::{run_agent_side_handshake, AgentIdentity};
pub use persistent::PersistentChannel;
pub(crate) use persistent::{RequestBody, ResponseBody};
pub use select::fetch_snapshot;
pub use tunnel::HubInitiatedChannel;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::model::AgentConfig;

/// Unchanged contract (§4.A): both channel kinds implement it identically
/// regardless of which side dialed.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Value, TransportError>;
    async fn push_config(&self, config: &AgentConfig) -> Result<(), TransportError>;
    async fn ping(&self) -> Result<(), TransportError>;
    async fn close(&self);
}
