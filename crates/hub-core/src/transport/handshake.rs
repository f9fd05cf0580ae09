// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The nonce/signature challenge shared by both channel directions (§4.A):
//! whichever side is being authenticated must sign a random nonce with the
//! Ed25519 key matching its pinned fingerprint.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::transport::{Frame, FrameKind};

/// Runs the prover side: receive the hub's nonce, sign it, and reply with a
/// `Pong`. Used by the hub-initiated channel, where the hub must prove its
/// own identity to the agent it is dialing.
pub fn sign_nonce_as_pong(nonce: &[u8], sign: impl Fn(&[u8]) -> Vec<u8>) -> Frame {
    let signature = sign(nonce);
    Frame::new(FrameKind::Pong, 0, Bytes::from(signature))
}

pub fn run_agent_side_handshake(challenge: Frame, sign: impl Fn(&[u8]) -> Vec<u8>) -> Result<Frame, TransportError> {
    if challenge.kind != FrameKind::Ping {
        return Err(TransportError::Fatal("expected Ping challenge".to_owned()));
    }
    Ok(sign_nonce_as_pong(&challenge.payload, sign))
}

/// Reply an agent sends on the persistent channel after signing the hub's
/// challenge nonce (§4.A): proves key possession and carries the
/// `FingerprintResponse{hostname, port, fingerprint}` payload named in §6,
/// with the fingerprint computed hub-side from `public_key` rather than
/// trusted verbatim from the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub hostname: String,
    pub port: String,
}

impl AgentIdentity {
    pub fn encode(&self) -> Result<Bytes, TransportError> {
        serde_json::to_vec(self).map(Bytes::from).map_err(|e| TransportError::Fatal(e.to_string()))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(payload).map_err(|e| TransportError::Fatal(e.to_string()))
    }
}
