// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The admin HTTP surface consumed by the UI (§6): `GET /getkey`,
//! `GET /universal-token`, `GET /config-yaml`, `POST`/`DELETE /user-alerts`,
//! `POST /test-notification`, `POST /create-user`, and health. Grounded on
//! the teacher's `http::register_session`/`credentials_status` request
//! envelope shape, minus the session-bridge plumbing that doesn't apply
//! here.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use ring::signature::KeyPair;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::HubError;
use crate::http::auth::validate_bearer;
use crate::ids::{AlertId, SystemId, UserId};
use crate::model::{Alert, AlertMetric};
use crate::state::HubState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub system_count: usize,
}

pub async fn health(State(state): State<Arc<HubState>>) -> Json<HealthResponse> {
    let system_count = state.registry.snapshot().await.len();
    Json(HealthResponse { status: "ok", system_count })
}

#[derive(Debug, Serialize)]
pub struct GetKeyResponse {
    pub public_key: String,
    pub hub_version: &'static str,
}

/// `GET /getkey`: the hub's own Ed25519 public key, base64-encoded, for an
/// agent to pin before its first connect.
pub async fn getkey(State(state): State<Arc<HubState>>) -> Json<GetKeyResponse> {
    let public_key = BASE64_STANDARD.encode(state.hub_keypair.public_key().as_ref());
    Json(GetKeyResponse { public_key, hub_version: env!("CARGO_PKG_VERSION") })
}

#[derive(Debug, Deserialize)]
pub struct UniversalTokenQuery {
    user_id: String,
}

#[derive(Debug, Serialize)]
pub struct UniversalTokenResponse {
    pub active: bool,
    pub token: Option<String>,
    pub expires_at: Option<u64>,
}

/// `GET /universal-token`: reports the currently active token if one is
/// live, minting a fresh one for the caller's user otherwise (§3, §4.D).
pub async fn universal_token(
    State(state): State<Arc<HubState>>,
    Query(q): Query<UniversalTokenQuery>,
) -> Json<UniversalTokenResponse> {
    let ttl = state.config.universal_token_ttl();
    if let Some((token, expires_at)) = state.universal_tokens.active(ttl).await {
        return Json(UniversalTokenResponse { active: true, token: Some(token), expires_at: Some(expires_at) });
    }
    let token = state.universal_tokens.mint(UserId::from(q.user_id)).await;
    let expires_at = now_unix() + ttl.as_secs();
    Json(UniversalTokenResponse { active: true, token: Some(token), expires_at: Some(expires_at) })
}

/// `GET /config-yaml`: requires the separate admin bearer token (§6 "admin
/// only"), not just the regular session/trusted-header auth every other
/// admin route accepts. Exports every system's current config version as a
/// flat YAML document.
pub async fn config_yaml(State(state): State<Arc<HubState>>, headers: HeaderMap) -> axum::response::Response {
    let Some(admin_token) = &state.config.admin_token else {
        return HubError::Unauthorized.to_http_response("admin export disabled").into_response();
    };
    if validate_bearer(&headers, admin_token).is_err() {
        return HubError::Unauthorized.to_http_response("invalid admin token").into_response();
    }

    let systems = state.registry.snapshot().await;
    let mut yaml = String::from("systems:\n");
    for entry in systems {
        let system = entry.system.read().await;
        let version = state.agent_configs.current(&system.id).await.map(|c| c.version).unwrap_or(0);
        yaml.push_str(&format!(
            "  - id: {}\n    name: {}\n    host: {}\n    status: {:?}\n    config_version: {}\n",
            system.id, system.name, system.host, system.status, version
        ));
    }
    ([(axum::http::header::CONTENT_TYPE, "application/yaml")], yaml).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AlertUpsertRequest {
    pub user_id: String,
    pub system_ids: Vec<String>,
    pub metric: AlertMetric,
    pub threshold: f64,
    pub hold_minutes: u32,
}

#[derive(Debug, Serialize)]
pub struct AlertUpsertResponse {
    pub upserted: usize,
}

/// `POST /user-alerts`: bulk-creates or replaces one alert rule per system
/// for the given metric, then refreshes the evaluator's cached rule set for
/// every touched system so the new threshold applies from the next sample.
pub async fn create_user_alerts(
    State(state): State<Arc<HubState>>,
    Json(req): Json<AlertUpsertRequest>,
) -> Result<Json<AlertUpsertResponse>, (axum::http::StatusCode, Json<crate::error::ErrorResponse>)> {
    let user_id = UserId::from(req.user_id);
    let mut upserted = 0;
    for raw_id in &req.system_ids {
        let system_id = SystemId::from(raw_id.as_str());
        let alert = Alert {
            id: AlertId::from(crate::ids::new_id()),
            user_id: user_id.clone(),
            system_id: system_id.clone(),
            metric: req.metric,
            threshold: req.threshold,
            hold_minutes: req.hold_minutes,
            triggered: false,
        };
        state.store.save_alert(&alert).await.map_err(|_| HubError::Persistence.to_http_response("save failed"))?;
        let _ = state.alerts.load_for_system(&system_id).await;
        upserted += 1;
    }
    Ok(Json(AlertUpsertResponse { upserted }))
}

#[derive(Debug, Deserialize)]
pub struct AlertDeleteRequest {
    pub user_id: String,
    pub system_ids: Vec<String>,
    #[serde(default)]
    pub metric: Option<AlertMetric>,
}

#[derive(Debug, Serialize)]
pub struct AlertDeleteResponse {
    pub removed: usize,
}

/// `DELETE /user-alerts`: bulk-removes alerts for a user across a system
/// set, optionally scoped to one metric, then refreshes the evaluator for
/// every touched system.
pub async fn delete_user_alerts(
    State(state): State<Arc<HubState>>,
    Json(req): Json<AlertDeleteRequest>,
) -> Result<Json<AlertDeleteResponse>, (axum::http::StatusCode, Json<crate::error::ErrorResponse>)> {
    let user_id = UserId::from(req.user_id);
    let system_ids: Vec<SystemId> = req.system_ids.iter().map(|s| SystemId::from(s.as_str())).collect();
    let removed = state
        .store
        .delete_alerts(&user_id, &system_ids, req.metric)
        .await
        .map_err(|_| HubError::Persistence.to_http_response("delete failed"))?;
    for system_id in &system_ids {
        let _ = state.alerts.load_for_system(system_id).await;
    }
    Ok(Json(AlertDeleteResponse { removed: removed.len() }))
}

#[derive(Debug, Deserialize)]
pub struct TestNotificationRequest {
    pub user_id: String,
    pub message: String,
}

/// `POST /test-notification`: fire-and-forget per §6; the actual
/// SMTP/webhook sender is an external collaborator out of scope (§1), so
/// this only logs the request the embedding application would dispatch.
pub async fn test_notification(Json(req): Json<TestNotificationRequest>) -> impl IntoResponse {
    info!(user_id = %req.user_id, message = %req.message, "test notification requested");
    axum::http::StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub id: String,
    pub email: String,
}

/// `POST /create-user`: first-run only — available exactly while the user
/// table is empty (§6).
pub async fn create_user(
    State(state): State<Arc<HubState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, (axum::http::StatusCode, Json<crate::error::ErrorResponse>)> {
    let count = state.store.user_count().await.map_err(|_| HubError::Persistence.to_http_response("user count failed"))?;
    if count != 0 {
        return Err(HubError::Unauthorized.to_http_response("user table already populated"));
    }
    let user = state.store.create_user(&req.email).await.map_err(|_| HubError::Persistence.to_http_response("create failed"))?;
    Ok(Json(CreateUserResponse { id: user.id.0, email: user.email }))
}

fn now_unix() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}
