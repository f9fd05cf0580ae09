// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The alert evaluator (§4.F): loaded from the record store at registry
//! startup, refreshed on `POST`/`DELETE /user-alerts`, and driven
//! synchronously by the write that produces fresh data rather than by a
//! separate poll loop — the same "driven by the event that produced the
//! data" shape as the teacher's credential distributor.

mod rules;

pub use rules::AlertRule;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::ids::SystemId;
use crate::model::{AlertHistory, AlertMetric, Sample, SystemStatus};
use crate::store::RecordStore;

fn selector_for(metric: AlertMetric) -> fn(&Sample) -> Option<f64> {
    match metric {
        AlertMetric::Cpu => |s| Some(s.cpu_pct),
        AlertMetric::Memory => |s| Some(s.mem_pct),
        AlertMetric::Disk => |s| Some(s.disk_pct),
        AlertMetric::Temperature => |s| s.temperature_c,
        AlertMetric::Bandwidth => |s| Some((s.bandwidth.sent + s.bandwidth.recv) as f64),
        AlertMetric::Gpu => |s| s.gpu.values().next().map(|g| g.usage_pct),
        AlertMetric::LoadAvg1 => |s| Some(s.load_avg[0]),
        AlertMetric::LoadAvg5 => |s| Some(s.load_avg[1]),
        AlertMetric::LoadAvg15 => |s| Some(s.load_avg[2]),
        AlertMetric::Battery => |s| s.battery_pct,
        AlertMetric::Status => |_| None,
    }
}

pub struct AlertEvaluator {
    store: Arc<dyn RecordStore>,
    rules: RwLock<HashMap<SystemId, Vec<AlertRule>>>,
}

impl AlertEvaluator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store, rules: RwLock::new(HashMap::new()) }
    }

    /// Loads every alert for a system from the record store, replacing
    /// whatever rule set was previously loaded for it.
    pub async fn load_for_system(&self, system_id: &SystemId) -> Result<(), crate::error::StoreError> {
        let alerts = self.store.alerts_for_system(system_id).await?;
        let loaded = alerts
            .iter()
            .map(|a| AlertRule::new(a, selector_for(a.metric)))
            .collect();
        self.rules.write().await.insert(system_id.clone(), loaded);
        Ok(())
    }

    pub async fn evaluate_sample(&self, system_id: &SystemId, snapshot: &serde_json::Value) {
        let Ok(sample) = serde_json::from_value::<Sample>(snapshot.clone()) else {
            return;
        };
        let mut rules = self.rules.write().await;
        let Some(system_rules) = rules.get_mut(system_id) else { return };
        for rule in system_rules.iter_mut() {
            if rule.metric == AlertMetric::Status {
                continue;
            }
            let Some(value) = (rule.selector)(&sample) else { continue };
            if let Some(fired) = rule.observe(value) {
                Self::record_transition(&self.store, system_id, rule, value, fired).await;
            }
        }
    }

    pub async fn evaluate_status_transition(&self, system_id: &SystemId, new_status: SystemStatus) {
        let value = rules::status_transition_selector(new_status);
        let mut rules = self.rules.write().await;
        let Some(system_rules) = rules.get_mut(system_id) else { return };
        for rule in system_rules.iter_mut() {
            if rule.metric != AlertMetric::Status {
                continue;
            }
            if let Some(fired) = rule.observe(value) {
                Self::record_transition(&self.store, system_id, rule, value, fired).await;
            }
        }
    }

    /// §9 resolved Open Question: pausing a system force-resolves any
    /// active Status alert on it without waiting for the hold window;
    /// resuming clears the ring so the hold window must elapse again.
    pub async fn on_system_paused(&self, system_id: &SystemId) {
        let mut rules = self.rules.write().await;
        let Some(system_rules) = rules.get_mut(system_id) else { return };
        for rule in system_rules.iter_mut() {
            if rule.metric == AlertMetric::Status && rule.force_resolve_and_reset() {
                info!(system_id = %system_id, alert_id = %rule.alert_id, "status alert resolved on pause");
            }
        }
    }

    /// On fire, inserts a new open row and remembers its `fired_at` on the
    /// rule. On resolve, updates that same row's `resolved_at` rather than
    /// inserting a second one (§3).
    async fn record_transition(
        store: &Arc<dyn RecordStore>,
        system_id: &SystemId,
        rule: &mut AlertRule,
        value: f64,
        fired: bool,
    ) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        if fired {
            let row = AlertHistory {
                alert_id: rule.alert_id.clone(),
                user_id: rule.user_id.clone(),
                system_id: system_id.clone(),
                metric: rule.metric,
                value,
                fired_at: now,
                resolved_at: None,
            };
            if let Err(e) = store.append_alert_history(&row).await {
                tracing::warn!(system_id = %system_id, err = %e, "failed to append alert history");
            }
            rule.open_fired_at = Some(now);
        } else if let Some(fired_at) = rule.open_fired_at.take() {
            if let Err(e) = store.resolve_alert_history(&rule.alert_id, fired_at, now).await {
                tracing::warn!(system_id = %system_id, err = %e, "failed to resolve alert history");
            }
        }
    }
}
