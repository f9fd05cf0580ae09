// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fingerprint compare-and-set, the Ed25519 nonce/signature handshake, and
//! universal-token self-registration (§4.A, §4.D). Grounded on the
//! teacher's nonce-challenge shape in `crates/mux/src/transport/auth.rs`,
//! adapted from bearer-token comparison to public-key signature
//! verification.

use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{UnparsedPublicKey, ED25519};

use crate::error::HubError;
use crate::ids::{SystemId, UserId};
use crate::model::{Fingerprint, System, SystemStatus};
use crate::store::RecordStore;

pub const NONCE_LEN: usize = 32;

/// Generates a fresh random challenge nonce for the agent to sign.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN], HubError> {
    let rng = SystemRandom::new();
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce).map_err(|_| HubError::Internal)?;
    Ok(nonce)
}

/// Verifies that `signature` over `nonce` was produced by the private key
/// matching `public_key_bytes`.
pub fn verify_signature(public_key_bytes: &[u8], nonce: &[u8], signature: &[u8]) -> bool {
    let key = UnparsedPublicKey::new(&ED25519, public_key_bytes);
    key.verify(nonce, signature).is_ok()
}

/// Computes a stable fingerprint string from a raw Ed25519 public key, used
/// both to store and to compare against a previously pinned value.
pub fn fingerprint_of(public_key_bytes: &[u8]) -> String {
    use ring::digest::{digest, SHA256};
    let hash = digest(&SHA256, public_key_bytes);
    hash.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

/// Outcome of resolving an inbound connection's presented token (§4.D):
/// either it matches a known system (reconnect) or a still-valid universal
/// token (new system, to be self-registered by the caller).
pub enum TokenResolution {
    KnownSystem(SystemId),
    UniversalToken(UserId),
}

/// Resolves a presented `X-Token` against the Fingerprint table first, then
/// the universal-token map, matching the priority order implied by §4.D
/// ("if no matching Fingerprint exists, the universal map is consulted").
pub async fn resolve_token(
    store: &dyn RecordStore,
    universal_tokens: &crate::token::UniversalTokenMap,
    universal_token_ttl: std::time::Duration,
    presented_token: &[u8],
) -> Result<TokenResolution, HubError> {
    if let Some(fp) = store.find_fingerprint_by_token(presented_token).await.map_err(|_| HubError::Persistence)? {
        return Ok(TokenResolution::KnownSystem(fp.system_id));
    }

    let candidate = String::from_utf8(presented_token.to_vec()).map_err(|_| HubError::Unauthorized)?;
    if let Some(owner) = universal_tokens.owner_of(&candidate, universal_token_ttl).await {
        return Ok(TokenResolution::UniversalToken(owner));
    }

    Err(HubError::Unauthorized)
}

/// Compare-and-set the fingerprint on an already-resolved system's row
/// (§4.D): fails closed on a presented-token mismatch or on a fingerprint
/// that differs from the one pinned at first handshake.
pub async fn compare_and_set_fingerprint(
    store: &dyn RecordStore,
    system_id: &SystemId,
    presented_token: &[u8],
    candidate_fingerprint: &str,
) -> Result<(), HubError> {
    let mut fp = store
        .find_fingerprint(system_id)
        .await
        .map_err(|_| HubError::Persistence)?
        .ok_or(HubError::SystemNotFound)?;

    if fp.token != presented_token {
        return Err(HubError::AuthFingerprintMismatch);
    }

    if !fp.try_set(candidate_fingerprint) {
        return Err(HubError::AuthFingerprintMismatch);
    }

    store.upsert_fingerprint(&fp).await.map_err(|_| HubError::Persistence)?;
    Ok(())
}

/// Self-registers a brand-new System for a universal-token connect (§3 S1,
/// §4.D): creates the System row owned by `owner`, then binds a fresh
/// Fingerprint row to the presented token and the verified fingerprint.
pub async fn self_register(
    store: &dyn RecordStore,
    owner: UserId,
    host: String,
    presented_token: Vec<u8>,
    candidate_fingerprint: &str,
) -> Result<System, HubError> {
    let system = System {
        id: SystemId::from(crate::ids::new_id()),
        name: host.clone(),
        host,
        status: SystemStatus::Pending,
        info: serde_json::Value::Null,
        users: vec![owner],
    };
    store.save_system(&system).await.map_err(|_| HubError::Persistence)?;

    let mut fp = Fingerprint::new(system.id.clone(), presented_token).map_err(|_| HubError::BadRequest)?;
    fp.try_set(candidate_fingerprint);
    store.upsert_fingerprint(&fp).await.map_err(|_| HubError::Persistence)?;

    Ok(system)
}
