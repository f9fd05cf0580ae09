// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hub-core: the fleet-monitoring hub's agent registry, transport layer,
//! alert evaluator, and admin HTTP surface.

pub mod alerts;
pub mod broker;
pub mod config;
pub mod config_sync;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod ids;
pub mod model;
pub mod realtime;
pub mod registry;
pub mod state;
pub mod store;
pub mod test_support;
pub mod token;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use ring::rand::SystemRandom;
use ring::signature::Ed25519KeyPair;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::broker::MemoryBroker;
use crate::config::HubConfig;
use crate::http::build_router;
use crate::registry::{spawn_updater, startup_stagger};
use crate::state::HubState;
use crate::store::MemoryRecordStore;

/// Generates a fresh Ed25519 identity for this process, used by the
/// hub-initiated channel to prove itself to an agent it dials (§4.A). Not
/// persisted: an embedding application that needs a stable hub identity
/// across restarts is expected to load PKCS#8 bytes from its own storage
/// instead of calling this.
pub fn generate_hub_keypair() -> anyhow::Result<Ed25519KeyPair> {
    let rng = SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|e| anyhow::anyhow!("keypair generation failed: {e}"))?;
    Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).map_err(|e| anyhow::anyhow!("keypair parse failed: {e}"))
}

/// Runs the hub until shutdown, wiring the default in-memory `RecordStore`
/// and `RealtimeBroker`. Grounded on the teacher's `run()`: build state,
/// spawn background workers, serve until the root cancellation token fires.
pub async fn run(config: HubConfig) -> anyhow::Result<()> {
    let store = Arc::new(MemoryRecordStore::new());
    let broker = Arc::new(MemoryBroker::new());
    let hub_keypair = generate_hub_keypair()?;

    run_with_collaborators(config, store, broker, hub_keypair).await
}

/// Same as [`run`], but lets the embedding application supply its own
/// record store, realtime broker, and hub identity (§6 external
/// collaborators) instead of the in-memory reference implementation.
pub async fn run_with_collaborators(
    config: HubConfig,
    store: Arc<dyn crate::store::RecordStore>,
    broker: Arc<dyn crate::broker::RealtimeBroker>,
    hub_keypair: Ed25519KeyPair,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = HubState::new(config, store.clone(), broker, hub_keypair);

    let non_paused = store.non_paused_systems().await.map_err(|e| anyhow::anyhow!("startup load failed: {e}"))?;
    let count = non_paused.len();
    for (index, system) in non_paused.into_iter().enumerate() {
        let system_id = system.id.clone();
        if let Err(e) = state.alerts.load_for_system(&system_id).await {
            tracing::warn!(system_id = %system_id, err = %e, "failed to load alert rules at startup");
        }
        let entry = state.registry.add_system(system, &state.shutdown).await;
        spawn_updater(
            entry,
            system_id.clone(),
            state.store.clone(),
            state.alerts.clone(),
            state.hub_initiated_for(&system_id).await,
            state.config.tick_interval(),
            startup_stagger(index, count),
        );
    }

    crate::config_sync::spawn_config_distributor(state.agent_configs.clone(), state.registry.clone(), state.child_token());

    info!(addr = %addr, systems = count, "hub-core listening");

    let router = build_router(state.clone());
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    tokio::select! {
        _ = ctrl_c => {}
        _ = token.cancelled() => {}
    }
}
