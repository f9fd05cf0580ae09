// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-lifetime universal-token bookkeeping (§4.D, §5 "process-wide
//! state"). Never persisted: a fresh process starts with an empty map, and
//! the 1h TTL is checked lazily on lookup rather than swept by a background
//! task, matching the teacher's credential-broker style of "check on use".

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use tokio::sync::RwLock;

use crate::ids::UserId;
use crate::model::UniversalTokenEntry;

pub struct UniversalTokenMap {
    entries: RwLock<Vec<UniversalTokenEntry>>,
}

impl UniversalTokenMap {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()) }
    }

    /// Mints a fresh token (32 random bytes, base64'd) for `owner` and
    /// remembers it.
    pub async fn mint(&self, owner: UserId) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        self.entries.write().await.push(UniversalTokenEntry::new(token.clone(), owner));
        token
    }

    /// Checks whether `candidate` matches a live (non-expired) entry. A
    /// match does not remove the entry: a universal token may authenticate
    /// more than one system before it expires.
    pub async fn is_valid(&self, candidate: &str, ttl: Duration) -> bool {
        let entries = self.entries.read().await;
        entries.iter().any(|e| e.token == candidate && !e.is_expired(ttl))
    }

    /// Resolves a candidate token to its owning user, if live. Used on a
    /// self-registration path once `is_valid` (or this) has confirmed a
    /// match, so the caller knows which user should own the new System.
    pub async fn owner_of(&self, candidate: &str, ttl: Duration) -> Option<UserId> {
        let entries = self.entries.read().await;
        entries.iter().find(|e| e.token == candidate && !e.is_expired(ttl)).map(|e| e.owner.clone())
    }

    /// The currently active token, if any, used by `GET /universal-token`
    /// to report `{active, token, expiresAt}` without minting a new one.
    pub async fn active(&self, ttl: Duration) -> Option<(String, u64)> {
        let entries = self.entries.read().await;
        entries.iter().rev().find(|e| !e.is_expired(ttl)).map(|e| {
            let expires_at = now_unix().saturating_add((ttl.as_secs()).saturating_sub(e.created_at.elapsed().as_secs()));
            (e.token.clone(), expires_at)
        })
    }

    /// Drops expired entries. Not required for correctness (expiry is
    /// checked on lookup) but keeps the vector from growing unboundedly
    /// across a long-lived process that mints many short-lived tokens.
    pub async fn sweep(&self, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.retain(|e| !e.is_expired(ttl));
    }
}

impl Default for UniversalTokenMap {
    fn default() -> Self {
        Self::new()
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serial_test::serial;

    use super::*;

    /// Invariant 5: a process-wide `UniversalTokenMap` loses any entry
    /// after its TTL elapses. `#[serial]` because this exercises the real
    /// wall clock rather than a per-test mock, the same process-wide state
    /// the map itself represents (§5).
    #[tokio::test]
    #[serial]
    async fn entry_expires_after_its_ttl_elapses() {
        let map = UniversalTokenMap::new();
        let ttl = Duration::from_millis(30);
        let token = map.mint(UserId::from("u1")).await;

        assert!(map.is_valid(&token, ttl).await);
        assert_eq!(map.owner_of(&token, ttl).await, Some(UserId::from("u1")));

        tokio::time::sleep(Duration::from_millis(90)).await;

        assert!(!map.is_valid(&token, ttl).await);
        assert_eq!(map.owner_of(&token, ttl).await, None);
    }

    /// Invariant 5's other half: the map has no persistence, so a fresh
    /// instance (standing in for a process restart) starts empty even
    /// though the previous process's tokens had not yet expired.
    #[tokio::test]
    #[serial]
    async fn a_fresh_map_has_no_entries_surviving_a_restart() {
        let long_ttl = Duration::from_secs(3600);
        let map = UniversalTokenMap::new();
        let _ = map.mint(UserId::from("u1")).await;
        assert!(map.active(long_ttl).await.is_some());

        let restarted = UniversalTokenMap::new();
        assert!(restarted.active(long_ttl).await.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn sweep_drops_only_expired_entries() {
        let map = UniversalTokenMap::new();
        let ttl = Duration::from_millis(30);
        let short_lived = map.mint(UserId::from("u1")).await;
        tokio::time::sleep(Duration::from_millis(90)).await;
        let fresh = map.mint(UserId::from("u2")).await;

        map.sweep(ttl).await;

        assert!(!map.is_valid(&short_lived, ttl).await);
        assert!(map.is_valid(&fresh, ttl).await);
    }
}
