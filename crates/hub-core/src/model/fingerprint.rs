// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::ids::{SystemId, UserId};

/// Maximum accepted token length (§3).
pub const MAX_TOKEN_BYTES: usize = 512;

/// Per-system token/fingerprint pair (§3, §4.D). Setting `fingerprint` is a
/// compare-and-set, never a plain overwrite: once present it is only ever
/// replaced by the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub system_id: SystemId,
    pub token: Vec<u8>,
    pub fingerprint: Option<String>,
}

impl Fingerprint {
    /// Builds a fresh unfingerprinted record, rejecting oversized tokens.
    pub fn new(system_id: SystemId, token: Vec<u8>) -> Result<Self, TokenTooLong> {
        if token.len() > MAX_TOKEN_BYTES {
            return Err(TokenTooLong(token.len()));
        }
        Ok(Self { system_id, token, fingerprint: None })
    }

    /// Compare-and-set: succeeds if unset, or if already set to the same
    /// value. Returns `false` on mismatch (§4.D), which the caller surfaces
    /// as `HubError::AuthFingerprintMismatch`.
    pub fn try_set(&mut self, candidate: &str) -> bool {
        match &self.fingerprint {
            None => {
                self.fingerprint = Some(candidate.to_owned());
                true
            }
            Some(existing) => existing == candidate,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenTooLong(pub usize);

impl std::fmt::Display for TokenTooLong {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token is {} bytes, exceeds {MAX_TOKEN_BYTES}", self.0)
    }
}

impl std::error::Error for TokenTooLong {}

/// A universal-token map entry (§4.D): an opaque bearer token mapped to the
/// user id it grants self-registration on behalf of. The map itself is
/// process-lifetime state; entries are never persisted and are swept
/// lazily on lookup against a 1h TTL.
#[derive(Debug, Clone)]
pub struct UniversalTokenEntry {
    pub token: String,
    pub owner: UserId,
    pub created_at: Instant,
}

impl UniversalTokenEntry {
    pub fn new(token: String, owner: UserId) -> Self {
        Self { token, owner, created_at: Instant::now() }
    }

    pub fn is_expired(&self, ttl: std::time::Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}
