// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::SystemId;

/// Aggregation window a `Sample` belongs to (§3). Only `OneMin` is produced
/// by this crate; the others exist so downstream aggregation jobs (out of
/// scope here) have a stable enum to roll samples up into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggWindow {
    OneMin,
    TenMin,
    TwentyMin,
    OneTwentyMin,
    FourEightyMin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FsStats {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub read_bytes_per_sec: u64,
    pub write_bytes_per_sec: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpuStats {
    pub usage_pct: f64,
    pub mem_used_bytes: u64,
    pub mem_total_bytes: u64,
    pub temperature_c: Option<f64>,
    pub power_draw_w: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BandwidthStats {
    pub sent: u64,
    pub recv: u64,
}

/// One periodic snapshot of a system's vitals (§3, "SystemStats" in the
/// record store's naming, `Sample` here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub system_id: SystemId,
    pub timestamp: u64,
    pub window: AggWindow,
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub mem_used_bytes: u64,
    pub mem_total_bytes: u64,
    pub disk_pct: f64,
    pub temperature_c: Option<f64>,
    pub load_avg: [f64; 3],
    pub bandwidth: BandwidthStats,
    pub battery_pct: Option<f64>,
    pub extra_fs: HashMap<String, FsStats>,
    pub gpu: HashMap<String, GpuStats>,
    pub peak_cpu_pct: f64,
    pub peak_mem_pct: f64,
    pub peak_disk_pct: f64,
    /// Opaque SMART/array data returned only when `extended=true` was
    /// requested of the agent (§4.G). This crate does not interpret it.
    pub extended: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStats {
    pub name: String,
    pub cpu_pct: f64,
    pub mem_bytes: u64,
    pub net_sent: u64,
    pub net_recv: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSample {
    pub system_id: SystemId,
    pub timestamp: u64,
    pub containers: Vec<ContainerStats>,
}
