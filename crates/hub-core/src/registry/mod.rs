// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent registry (§4.B), grounded directly on the teacher's
//! `MuxState`/`SessionEntry` pair: one `RwLock<HashMap>` of entries, each
//! owning a `CancellationToken` and an `AtomicU32` failure counter.

pub mod hooks;
mod updater;

pub use updater::{spawn_updater, startup_stagger};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::ids::SystemId;
use crate::model::{System, SystemStatus};
use crate::transport::PersistentChannel;

/// Per-system registry entry. Registry methods clone state out of the map
/// lock, mutate, and write back rather than holding the lock across any
/// `.await` that touches transport or storage (§5).
pub struct SystemEntry {
    pub system: RwLock<System>,
    /// Parent of the updater's own token; cancelling this stops that one
    /// system's background task without affecting any other.
    pub cancel: CancellationToken,
    pub channel: RwLock<Option<Arc<PersistentChannel>>>,
    pub fetch_failures: AtomicU32,
    /// Last agent version seen over the persistent channel, kept around so
    /// a hub-initiated dial (no upgrade headers of its own) still knows
    /// which wire encoding to use (§4.A).
    pub last_agent_version: RwLock<Option<semver::Version>>,
}

impl SystemEntry {
    fn new(system: System, parent: &CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            system: RwLock::new(system),
            cancel: parent.child_token(),
            channel: RwLock::new(None),
            fetch_failures: AtomicU32::new(0),
            last_agent_version: RwLock::new(None),
        })
    }
}

#[derive(Default)]
pub struct AgentRegistry {
    entries: RwLock<HashMap<SystemId, Arc<SystemEntry>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `AddSystem` (§4.B): inserts a new entry in `Pending` status. Returns
    /// the existing entry unchanged if the system is already registered.
    pub async fn add_system(&self, system: System, parent: &CancellationToken) -> Arc<SystemEntry> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(&system.id) {
            return existing.clone();
        }
        let entry = SystemEntry::new(system.clone(), parent);
        entries.insert(system.id.clone(), entry.clone());
        entry
    }

    /// `RemoveSystem` (§4.B): cancels the entry's token, cascading to its
    /// updater and any live persistent-channel reader, then drops it from
    /// the map.
    pub async fn remove_system(&self, id: &SystemId) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.remove(id) {
            entry.cancel.cancel();
        }
    }

    pub async fn get(&self, id: &SystemId) -> Option<Arc<SystemEntry>> {
        self.entries.read().await.get(id).cloned()
    }

    /// Snapshot of every entry, used by anything that must iterate without
    /// holding the registry lock for the duration (health sweep, admin
    /// listing, startup staggering).
    pub async fn snapshot(&self) -> Vec<Arc<SystemEntry>> {
        self.entries.read().await.values().cloned().collect()
    }

    /// `AddWebSocketSystem` (§4.B): attaches a freshly upgraded persistent
    /// channel to an existing entry, replacing any prior one.
    pub async fn attach_channel(&self, id: &SystemId, channel: Arc<PersistentChannel>) -> Option<()> {
        let entry = self.get(id).await?;
        *entry.last_agent_version.write().await = Some(channel.agent_version());
        *entry.channel.write().await = Some(channel);
        Some(())
    }

    pub async fn detach_channel(&self, id: &SystemId) {
        if let Some(entry) = self.get(id).await {
            *entry.channel.write().await = None;
        }
    }

    pub async fn set_status(&self, id: &SystemId, status: SystemStatus) {
        if let Some(entry) = self.get(id).await {
            entry.system.write().await.status = status;
        }
    }

    pub async fn non_paused_count(&self) -> usize {
        let entries = self.entries.read().await;
        let mut count = 0;
        for entry in entries.values() {
            if entry.system.read().await.status != SystemStatus::Paused {
                count += 1;
            }
        }
        count
    }
}

impl SystemEntry {
    pub fn record_fetch_failure(&self) -> u32 {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn clear_fetch_failures(&self) {
        self.fetch_failures.store(0, Ordering::Relaxed);
    }
}
