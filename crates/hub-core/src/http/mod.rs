// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/WebSocket transport for the hub's admin and agent-facing surfaces,
//! grounded on the teacher's `build_router`/`build_router_inner` composition
//! of routes + auth middleware + CORS + trace layer.

mod admin;
mod agent_ws;
mod auth;
mod realtime_ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::HubState;

/// Builds the full `axum::Router`, wiring the auth middleware, CORS, and
/// request tracing the same way the teacher's `build_router_inner` does.
pub fn build_router(state: Arc<HubState>) -> Router {
    Router::new()
        .route("/api/health", get(admin::health))
        .route("/agent/connect", get(agent_ws::agent_connect))
        .route("/getkey", get(admin::getkey))
        .route("/universal-token", get(admin::universal_token))
        .route("/config-yaml", get(admin::config_yaml))
        .route("/user-alerts", post(admin::create_user_alerts).delete(admin::delete_user_alerts))
        .route("/test-notification", post(admin::test_notification))
        .route("/create-user", post(admin::create_user))
        .route("/rt_metrics/{system_id}", get(realtime_ws::subscribe))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
