// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::ids::{SystemId, UserId};

/// A monitored host (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct System {
    pub id: SystemId,
    pub name: String,
    pub host: String,
    pub status: SystemStatus,
    pub info: serde_json::Value,
    pub users: Vec<UserId>,
}

/// Lifecycle status. `Pending` is the state between `AddSystem` and the
/// first successful handshake; `Paused` suspends the updater without
/// removing the system from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Pending,
    Up,
    Down,
    Paused,
}
