// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::ids::{AlertId, SystemId, UserId};

/// Closed set of alertable metrics (§3, §9 tagged-variant design note: the
/// direction each fires in is a property of the metric, not a user choice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    Status,
    Cpu,
    Memory,
    Disk,
    Temperature,
    Bandwidth,
    Gpu,
    LoadAvg1,
    LoadAvg5,
    LoadAvg15,
    Battery,
}

/// The direction a metric must cross its threshold to be considered firing.
/// Fixed per metric (§9): never user-configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
}

impl AlertMetric {
    /// The fixed firing direction for this metric (§9). Status is encoded
    /// by `rules::status_transition_selector` as `1.0` (down) / `0.0` (up),
    /// so it fires on the "exceeds" side like any other `Above` metric — a
    /// down reading is the breach.
    pub fn direction(self) -> Direction {
        match self {
            Self::Battery => Direction::Below,
            _ => Direction::Above,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub user_id: UserId,
    pub system_id: SystemId,
    pub metric: AlertMetric,
    pub threshold: f64,
    pub hold_minutes: u32,
    pub triggered: bool,
}

/// One firing/resolution occurrence (§3: "(user, system, alertId,
/// metric-name, value, createdAt, resolvedAt?)"). A row is inserted with
/// `resolved_at: None` when the alert fires and is updated in place, exactly
/// once, when it later resolves — it is never re-inserted for the same
/// occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistory {
    pub alert_id: AlertId,
    pub user_id: UserId,
    pub system_id: SystemId,
    pub metric: AlertMetric,
    pub value: f64,
    pub fired_at: u64,
    pub resolved_at: Option<u64>,
}
