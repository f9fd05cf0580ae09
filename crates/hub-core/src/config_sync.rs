// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config-sync channel (§4.H), grounded directly on the teacher's
//! `spawn_distributor`: a broadcast event per version bump, consumed by one
//! task that best-effort pushes to whatever persistent channel is attached.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::ids::SystemId;
use crate::model::AgentConfig;
use crate::registry::AgentRegistry;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct ConfigPushed {
    pub system_id: SystemId,
    pub config: AgentConfig,
}

struct LastPush {
    version: u64,
    pushed_at: u64,
}

/// Per-system monotonic config version store plus the broadcast event used
/// to notify the distributor of a fresh push.
pub struct AgentConfigStore {
    configs: RwLock<HashMap<SystemId, AgentConfig>>,
    last_push: RwLock<HashMap<SystemId, LastPush>>,
    tx: broadcast::Sender<ConfigPushed>,
}

impl AgentConfigStore {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(256);
        Arc::new(Self { configs: RwLock::new(HashMap::new()), last_push: RwLock::new(HashMap::new()), tx })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigPushed> {
        self.tx.subscribe()
    }

    /// Bumps a system's config version per §4.H/§9: `max(old + 1, now)`,
    /// so the version is monotonic even across a wall-clock rollback.
    pub async fn bump(&self, system_id: SystemId, mut new_cfg: AgentConfig, now_unix: u64) {
        let mut configs = self.configs.write().await;
        let old_version = configs.get(&system_id).map(|c| c.version).unwrap_or(0);
        new_cfg.version = AgentConfig::next_version(old_version, now_unix);
        configs.insert(system_id.clone(), new_cfg.clone());
        drop(configs);

        let _ = self.tx.send(ConfigPushed { system_id, config: new_cfg });
    }

    pub async fn current(&self, system_id: &SystemId) -> Option<AgentConfig> {
        self.configs.read().await.get(system_id).cloned()
    }

    async fn record_push(&self, system_id: SystemId, version: u64, now_unix: u64) {
        self.last_push.write().await.insert(system_id, LastPush { version, pushed_at: now_unix });
    }

    pub async fn last_pushed_version(&self, system_id: &SystemId) -> Option<(u64, u64)> {
        self.last_push.read().await.get(system_id).map(|p| (p.version, p.pushed_at))
    }
}

/// Consumes `ConfigPushed` events and pushes to the attached persistent
/// channel, if any. Failures are logged and dropped, never retried: the
/// agent is expected to pull the latest config on its next reconnect.
pub fn spawn_config_distributor(
    store: Arc<AgentConfigStore>,
    registry: Arc<AgentRegistry>,
    cancel: tokio_util::sync::CancellationToken,
) {
    tokio::spawn(async move {
        let mut rx = store.subscribe();
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => event,
            };
            let event = match event {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let Some(entry) = registry.get(&event.system_id).await else { continue };
            let Some(channel) = entry.channel.read().await.clone() else { continue };

            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            match channel.push_config(&event.config).await {
                Ok(()) => {
                    store.record_push(event.system_id.clone(), event.config.version, now).await;
                    info!(system_id = %event.system_id, version = event.config.version, "config pushed");
                }
                Err(e) => {
                    warn!(system_id = %event.system_id, err = %e, "config push failed, will not retry");
                }
            }
        }
    });
}
