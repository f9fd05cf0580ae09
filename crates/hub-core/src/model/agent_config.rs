// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Pushed to the agent over the config-sync channel (§3, §4.H). `version`
/// is a unix-seconds monotonic counter: `max(old + 1, now)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub version: u64,
    pub log_level: String,
    pub mem_mode: MemMode,
    pub extra_filesystems: Vec<String>,
    pub data_dir: Option<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemMode {
    Default,
    Swap,
    Cgroup,
}

impl AgentConfig {
    /// Computes the next monotonic version per §4.H / §9: never goes
    /// backwards even if the wall clock does.
    pub fn next_version(old: u64, now_unix: u64) -> u64 {
        (old + 1).max(now_unix)
    }
}
