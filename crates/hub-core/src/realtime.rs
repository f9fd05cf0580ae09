// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime fan-out (§4.E), grounded on the teacher's prewarm/feed
//! lazy-start discipline (`upstream/prewarm.rs`): a 1 Hz worker that starts
//! on the first subscriber and stops once the last one unsubscribes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use ring::signature::Ed25519KeyPair;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::broker::{RealtimeBroker, RealtimeMessage};
use crate::ids::{ClientId, SystemId};
use crate::registry::AgentRegistry;
use crate::transport::HubInitiatedChannel;

struct RunningTask {
    handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

/// Dials a fresh `HubInitiatedChannel` per tick rather than sharing one
/// instance across systems, since each system's channel is bound to its own
/// host and `HubInitiatedChannel` is one-shot by design (§4.A).
pub struct RealtimeWorker {
    registry: Arc<AgentRegistry>,
    broker: Arc<dyn RealtimeBroker>,
    hub_keypair: Arc<Ed25519KeyPair>,
    tick: Duration,
    fetch_budget: Duration,
    subscriptions: Mutex<HashMap<SystemId, HashSet<ClientId>>>,
    task: Mutex<Option<RunningTask>>,
}

impl RealtimeWorker {
    pub fn new(
        registry: Arc<AgentRegistry>,
        broker: Arc<dyn RealtimeBroker>,
        hub_keypair: Arc<Ed25519KeyPair>,
        tick: Duration,
        fetch_budget: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            broker,
            hub_keypair,
            tick,
            fetch_budget,
            subscriptions: Mutex::new(HashMap::new()),
            task: Mutex::new(None),
        })
    }

    pub async fn subscribe(
        self: &Arc<Self>,
        system_id: SystemId,
        client: ClientId,
    ) -> tokio::sync::broadcast::Receiver<RealtimeMessage> {
        let mut subs = self.subscriptions.lock().await;
        subs.entry(system_id.clone()).or_default().insert(client.clone());
        drop(subs);
        let receiver = self.broker.subscribe(client, system_id.as_str()).await;
        self.ensure_running().await;
        receiver
    }

    pub async fn unsubscribe(self: &Arc<Self>, system_id: &SystemId, client: ClientId) {
        let mut subs = self.subscriptions.lock().await;
        if let Some(set) = subs.get_mut(system_id) {
            set.remove(&client);
            if set.is_empty() {
                subs.remove(system_id);
            }
        }
        let empty = subs.is_empty();
        drop(subs);
        self.broker.unsubscribe(client, system_id.as_str()).await;
        if empty {
            self.stop().await;
        }
    }

    async fn ensure_running(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let worker = Arc::clone(self);
        let tick_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            worker.run(tick_cancel).await;
        });
        *task = Some(RunningTask { handle, cancel });
    }

    async fn stop(&self) {
        let mut task = self.task.lock().await;
        if let Some(running) = task.take() {
            running.cancel.cancel();
            running.handle.abort();
        }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let system_ids: Vec<SystemId> = self.subscriptions.lock().await.keys().cloned().collect();
            for system_id in system_ids {
                let worker = Arc::clone(&self);
                tokio::spawn(async move {
                    worker.tick_one(system_id).await;
                });
            }
        }
    }

    async fn tick_one(&self, system_id: SystemId) {
        let Some(entry) = self.registry.get(&system_id).await else { return };
        let host = entry.system.read().await.host.clone();
        let agent_version = entry.last_agent_version.read().await.clone();
        let dialer = HubInitiatedChannel::new(host, self.hub_keypair.clone(), self.fetch_budget, agent_version);
        let fetch = crate::transport::fetch_snapshot(&entry, &dialer);
        let Ok(Ok(snapshot)) = tokio::time::timeout(self.fetch_budget, fetch).await else {
            return;
        };
        self.broker
            .broadcast(RealtimeMessage { feed: system_id.as_str().to_owned(), payload: snapshot })
            .await;
    }
}
