// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Picks which channel kind the updater should use for a given tick (§4.C):
//! prefer an attached persistent channel, otherwise dial the hub-initiated
//! channel directly. On a persistent-channel fetch failure, the channel is
//! closed and dropped and the hub-initiated fallback is tried exactly once
//! in the same tick (§4.A selection policy).

use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;
use crate::registry::SystemEntry;
use crate::transport::Transport;

pub async fn fetch_snapshot(entry: &SystemEntry, hub_initiated: &dyn Transport) -> Result<Value, TransportError> {
    let channel = entry.channel.read().await.clone();
    match channel {
        Some(persistent) => match persistent.fetch_snapshot().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                debug!(err = %e, "persistent channel fetch failed, closing and falling back");
                persistent.close().await;
                *entry.channel.write().await = None;
                hub_initiated.fetch_snapshot().await
            }
        },
        None => hub_initiated.fetch_snapshot().await,
    }
}
