// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared hub state (§5), grounded on the teacher's `MuxState`: one `Arc`
//! threaded through every handler and background task, holding the
//! registry, the external collaborators, and the root shutdown token every
//! other token is a child of.

use std::sync::Arc;

use ring::signature::Ed25519KeyPair;
use tokio_util::sync::CancellationToken;

use crate::alerts::AlertEvaluator;
use crate::broker::RealtimeBroker;
use crate::config::HubConfig;
use crate::config_sync::AgentConfigStore;
use crate::ids::SystemId;
use crate::realtime::RealtimeWorker;
use crate::registry::AgentRegistry;
use crate::store::RecordStore;
use crate::token::UniversalTokenMap;
use crate::transport::{HubInitiatedChannel, Transport};

pub struct HubState {
    pub config: HubConfig,
    pub registry: Arc<AgentRegistry>,
    pub store: Arc<dyn RecordStore>,
    pub broker: Arc<dyn RealtimeBroker>,
    pub universal_tokens: UniversalTokenMap,
    pub alerts: Arc<AlertEvaluator>,
    pub agent_configs: Arc<AgentConfigStore>,
    pub realtime: Arc<RealtimeWorker>,
    /// The hub's own identity for the hub-initiated channel (§4.A): it
    /// proves possession of this key when dialing an agent directly.
    pub hub_keypair: Arc<Ed25519KeyPair>,
    /// Root of the cancellation hierarchy (§5). Every system's updater token
    /// and every background worker's token is a child of this one, so a
    /// single cancel cascades process-wide shutdown.
    pub shutdown: CancellationToken,
}

impl HubState {
    pub fn new(
        config: HubConfig,
        store: Arc<dyn RecordStore>,
        broker: Arc<dyn RealtimeBroker>,
        hub_keypair: Ed25519KeyPair,
    ) -> Arc<Self> {
        let shutdown = CancellationToken::new();
        let registry = Arc::new(AgentRegistry::new());
        let alerts = Arc::new(AlertEvaluator::new(store.clone()));
        let agent_configs = AgentConfigStore::new();
        let hub_keypair = Arc::new(hub_keypair);

        let realtime = RealtimeWorker::new(
            registry.clone(),
            broker.clone(),
            hub_keypair.clone(),
            config.realtime_tick_interval(),
            config.fetch_timeout(),
        );

        Arc::new(Self {
            config,
            registry,
            store,
            broker,
            universal_tokens: UniversalTokenMap::new(),
            alerts,
            agent_configs,
            realtime,
            hub_keypair,
            shutdown,
        })
    }

    /// A token that fires when the root token fires, for a task that should
    /// not itself be able to cancel anything above it.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Builds the one-shot hub-initiated channel for a single system,
    /// dialing whatever host is currently on its registry row (§4.A). A
    /// system that has since been removed dials an empty host and fails
    /// closed on connect.
    pub async fn hub_initiated_for(&self, system_id: &SystemId) -> Arc<dyn Transport> {
        let (host, agent_version) = match self.registry.get(system_id).await {
            Some(entry) => {
                let host = entry.system.read().await.host.clone();
                let agent_version = entry.last_agent_version.read().await.clone();
                (host, agent_version)
            }
            None => (String::new(), None),
        };
        Arc::new(HubInitiatedChannel::new(host, self.hub_keypair.clone(), self.config.handshake_timeout(), agent_version))
    }
}
