// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The realtime-broker contract (§6) and an in-memory reference
//! implementation grounded on the teacher's `Aggregator` subscription-set
//! bookkeeping (`crates/mux/src/state.rs`).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::ids::ClientId;

/// A message published to subscribers of a named realtime feed. `name` is
/// typically a system id, but the broker itself is feed-name-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub feed: String,
    pub payload: serde_json::Value,
}

/// Fan-out collaborator (§6) used by the realtime subsystem (§4.E) to push
/// samples to subscribed admin clients without coupling the updater to the
/// transport that eventually serves them.
#[async_trait::async_trait]
pub trait RealtimeBroker: Send + Sync {
    async fn subscribe(&self, client: ClientId, feed: &str) -> broadcast::Receiver<RealtimeMessage>;
    async fn unsubscribe(&self, client: ClientId, feed: &str);
    async fn broadcast(&self, message: RealtimeMessage);
    async fn enumerate_clients_with_subscription(&self, feed: &str) -> Vec<ClientId>;
}

const CHANNEL_CAPACITY: usize = 256;

struct FeedState {
    tx: broadcast::Sender<RealtimeMessage>,
    clients: HashSet<ClientId>,
}

/// In-memory broker: one broadcast channel per feed name, created lazily on
/// first subscribe and torn down once its client set is empty (teacher:
/// `PrewarmCache`'s start-on-demand, stop-when-idle discipline).
#[derive(Default)]
pub struct MemoryBroker {
    feeds: RwLock<HashMap<String, FeedState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of systems with at least one active subscriber. Used by the
    /// realtime worker to decide whether its 1 Hz task should keep running.
    pub async fn active_feed_count(&self) -> usize {
        self.feeds.read().await.len()
    }
}

#[async_trait::async_trait]
impl RealtimeBroker for MemoryBroker {
    async fn subscribe(&self, client: ClientId, feed: &str) -> broadcast::Receiver<RealtimeMessage> {
        let mut feeds = self.feeds.write().await;
        let entry = feeds.entry(feed.to_owned()).or_insert_with(|| FeedState {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
            clients: HashSet::new(),
        });
        entry.clients.insert(client);
        entry.tx.subscribe()
    }

    async fn unsubscribe(&self, client: ClientId, feed: &str) {
        let mut feeds = self.feeds.write().await;
        if let Some(entry) = feeds.get_mut(feed) {
            entry.clients.remove(&client);
            if entry.clients.is_empty() {
                feeds.remove(feed);
            }
        }
    }

    async fn broadcast(&self, message: RealtimeMessage) {
        let feeds = self.feeds.read().await;
        if let Some(entry) = feeds.get(&message.feed) {
            // No subscribers to fail a send to is not an error: the feed
            // exists only while clients.is_empty() is false, but a send can
            // still race a concurrent unsubscribe-to-zero.
            let _ = entry.tx.send(message);
        }
    }

    async fn enumerate_clients_with_subscription(&self, feed: &str) -> Vec<ClientId> {
        let feeds = self.feeds.read().await;
        feeds.get(feed).map(|e| e.clients.iter().cloned().collect()).unwrap_or_default()
    }
}
