// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use semver::Version;

/// The agent protocol version at and above which the hub-initiated channel
/// encodes snapshots as CBOR instead of JSON (§4.A, §9).
///
/// Named so the cutover is a single point of change rather than a magic
/// string scattered across the transport layer.
pub fn min_binary_protocol_version() -> Version {
    Version::new(0, 12, 0)
}

/// Minimum agent semver the hub will accept over the persistent channel.
pub fn min_agent_version() -> Version {
    Version::new(0, 9, 0)
}

/// Configuration for the hub core.
#[derive(Debug, Clone, clap::Args)]
pub struct HubConfig {
    /// Host to bind the admin/agent HTTP surface on.
    #[arg(long, default_value = "0.0.0.0", env = "HUB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8090, env = "HUB_PORT")]
    pub port: u16,

    /// Poll interval for each system's updater, in milliseconds (§4.C: 30s).
    #[arg(long, default_value_t = 30_000, env = "HUB_TICK_MS")]
    pub tick_ms: u64,

    /// Handshake timeout in milliseconds (§4.A).
    #[arg(long, default_value_t = 5_000, env = "HUB_HANDSHAKE_TIMEOUT_MS")]
    pub handshake_timeout_ms: u64,

    /// Single-fetch timeout in milliseconds (§4.A).
    #[arg(long, default_value_t = 4_000, env = "HUB_FETCH_TIMEOUT_MS")]
    pub fetch_timeout_ms: u64,

    /// Config-push timeout in milliseconds (§4.A).
    #[arg(long, default_value_t = 2_000, env = "HUB_PUSH_TIMEOUT_MS")]
    pub push_timeout_ms: u64,

    /// Realtime fan-out tick interval in milliseconds (§4.E: 1 Hz).
    #[arg(long, default_value_t = 1_000, env = "HUB_REALTIME_TICK_MS")]
    pub realtime_tick_ms: u64,

    /// Universal token time-to-live in seconds (§3: <= 1h).
    #[arg(long, default_value_t = 3_600, env = "HUB_UNIVERSAL_TOKEN_TTL_SECS")]
    pub universal_token_ttl_secs: u64,

    /// Bypass auth for this account email (`AUTO_LOGIN`, §6).
    #[arg(long, env = "AUTO_LOGIN")]
    pub auto_login: Option<String>,

    /// Header name that, if present, is trusted as the authenticated user's
    /// email (`TRUSTED_AUTH_HEADER`, §6).
    #[arg(long, env = "TRUSTED_AUTH_HEADER")]
    pub trusted_auth_header: Option<String>,

    /// State directory for on-disk persistence used by the in-memory store's
    /// optional snapshotting and by the fingerprint keypair.
    #[arg(long, env = "HUB_STATE_DIR")]
    pub state_dir: Option<std::path::PathBuf>,

    /// Log output format (`[AMBIENT]`).
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "HUB_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Bearer token the admin HTTP surface accepts (`[AMBIENT]`; the
    /// embedding application is expected to wire this from its own user
    /// store in production, §7 "AuthError").
    #[arg(long, env = "HUB_ADMIN_TOKEN")]
    pub admin_token: Option<String>,
}

/// Log formatting mode selectable at boot (`[AMBIENT]`, §2 component I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl HubConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    pub fn realtime_tick_interval(&self) -> Duration {
        Duration::from_millis(self.realtime_tick_ms)
    }

    pub fn universal_token_ttl(&self) -> Duration {
        Duration::from_secs(self.universal_token_ttl_secs)
    }
}

#[cfg(test)]
impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 0,
            tick_ms: 30_000,
            handshake_timeout_ms: 5_000,
            fetch_timeout_ms: 4_000,
            push_timeout_ms: 2_000,
            realtime_tick_ms: 1_000,
            universal_token_ttl_secs: 3_600,
            auto_login: None,
            trusted_auth_header: None,
            state_dir: None,
            log_format: LogFormat::Pretty,
            admin_token: None,
        }
    }
}
