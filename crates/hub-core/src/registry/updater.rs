// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-system updater loop (§4.C), grounded on the teacher's
//! `spawn_screen_poller`/`spawn_health_checker` shape: a `tokio::time`
//! interval guarded by `select!` against a `CancellationToken`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::alerts::AlertEvaluator;
use crate::ids::SystemId;
use crate::model::{ContainerSample, Sample, SystemStatus};
use crate::registry::SystemEntry;
use crate::store::RecordStore;
use crate::transport::{fetch_snapshot, Transport};

/// `min(30_000 / n, 2_000)` ms between each system's updater start, so a
/// mass restart does not thunder onto the network (§4.B).
pub fn startup_stagger(index: usize, non_paused_count: usize) -> Duration {
    let n = non_paused_count.max(1) as u64;
    let step = (30_000 / n).min(2_000);
    Duration::from_millis(step * index as u64)
}

/// Deterministic jitter fraction in `[0.40, 0.90)`, seeded from the system
/// id so repeated test runs see the same delay instead of wall-clock
/// randomness (§4.C).
fn jitter_fraction(system_id: &SystemId) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    system_id.hash(&mut hasher);
    let seed = hasher.finish();
    0.40 + (seed % 1000) as f64 / 1000.0 * 0.50
}

const NO_CHANNEL_INITIAL_DELAY: Duration = Duration::from_secs(11);

pub fn spawn_updater(
    entry: Arc<SystemEntry>,
    system_id: SystemId,
    store: Arc<dyn RecordStore>,
    alerts: Arc<AlertEvaluator>,
    hub_initiated: Arc<dyn Transport>,
    tick: Duration,
    start_delay: Duration,
) {
    let cancel = entry.cancel.clone();
    tokio::spawn(async move {
        if start_delay > Duration::ZERO {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(start_delay) => {}
            }
        }

        let has_channel = entry.channel.read().await.is_some();
        let initial_delay = if has_channel {
            tick.mul_f64(jitter_fraction(&system_id))
        } else {
            NO_CHANNEL_INITIAL_DELAY
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(initial_delay) => {}
        }

        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let status = entry.system.read().await.status;
            if status == SystemStatus::Paused {
                let has_channel = entry.channel.read().await.is_some();
                if has_channel {
                    if let Some(channel) = entry.channel.read().await.clone() {
                        let _ = channel.ping().await;
                    }
                } else {
                    break;
                }
                continue;
            }

            match fetch_snapshot(&entry, hub_initiated.as_ref()).await {
                Ok(snapshot) => {
                    entry.clear_fetch_failures();
                    if let Err(e) = persist_snapshot(&store, &system_id, &snapshot).await {
                        warn!(system_id = %system_id, err = %e, "failed to persist snapshot");
                        continue;
                    }
                    alerts.evaluate_sample(&system_id, &snapshot).await;
                    let persisted = {
                        let mut guard = entry.system.write().await;
                        guard.status = SystemStatus::Up;
                        guard.info = snapshot;
                        guard.clone()
                    };
                    if let Err(e) = store.save_system(&persisted).await {
                        warn!(system_id = %system_id, err = %e, "failed to persist status flip to up");
                    }
                    // Fed every tick, not only on the up-edge, so the
                    // hold-time ring (§4.F) accumulates consecutive "safe"
                    // readings and can resolve a triggered Status alert.
                    alerts.evaluate_status_transition(&system_id, SystemStatus::Up).await;
                }
                Err(e) => {
                    debug!(system_id = %system_id, err = %e, "fetch snapshot failed");
                    let current = entry.system.read().await.status;
                    if current != SystemStatus::Paused {
                        if current != SystemStatus::Down {
                            let persisted = {
                                let mut guard = entry.system.write().await;
                                guard.status = SystemStatus::Down;
                                guard.clone()
                            };
                            if let Err(e) = store.save_system(&persisted).await {
                                warn!(system_id = %system_id, err = %e, "failed to persist status flip to down");
                            }
                        }
                        // Fed every tick the system stays down, not only on
                        // the down-edge, so the ring can reach hold time
                        // before firing (§4.F, invariant 7).
                        alerts.evaluate_status_transition(&system_id, SystemStatus::Down).await;
                    }
                }
            }
        }
    });
}

async fn persist_snapshot(
    store: &Arc<dyn RecordStore>,
    system_id: &SystemId,
    snapshot: &serde_json::Value,
) -> Result<(), crate::error::StoreError> {
    if let Ok(sample) = serde_json::from_value::<Sample>(snapshot.clone()) {
        store.create_sample(&sample).await?;
    }
    if let Ok(containers) = serde_json::from_value::<ContainerSample>(snapshot.clone()) {
        if !containers.containers.is_empty() {
            store.create_container_sample(&containers).await?;
        }
    }
    Ok(())
}
