// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The record-store contract (§6) and an in-memory reference implementation
//! grounded on the teacher's `PersistedCredentials` load/save discipline,
//! minus the disk round-trip: everything here lives in `RwLock`-guarded
//! maps for the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::ids::{AlertId, SystemId, UserId};
use crate::model::{Alert, AlertHistory, ContainerSample, Fingerprint, Sample, System, User};

/// External persistence collaborator (§6). The hub never assumes a
/// particular backend; everything it needs from storage is named here.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_system(&self, id: &SystemId) -> Result<Option<System>, StoreError>;
    async fn save_system(&self, sys: &System) -> Result<(), StoreError>;
    async fn delete_system(&self, id: &SystemId) -> Result<(), StoreError>;
    async fn create_sample(&self, sample: &Sample) -> Result<(), StoreError>;
    async fn create_container_sample(&self, s: &ContainerSample) -> Result<(), StoreError>;
    async fn find_fingerprint(&self, system_id: &SystemId) -> Result<Option<Fingerprint>, StoreError>;
    /// Looks up a fingerprint row by its bearer token rather than by system
    /// id, used to resolve an inbound persistent-channel connection to a
    /// system before that system's id is known (§4.D).
    async fn find_fingerprint_by_token(&self, token: &[u8]) -> Result<Option<Fingerprint>, StoreError>;
    async fn upsert_fingerprint(&self, fp: &Fingerprint) -> Result<(), StoreError>;
    async fn delete_fingerprint(&self, system_id: &SystemId) -> Result<(), StoreError>;
    async fn alerts_for_system(&self, system_id: &SystemId) -> Result<Vec<Alert>, StoreError>;
    async fn alerts_for_user(&self, user_id: &UserId) -> Result<Vec<Alert>, StoreError>;
    async fn save_alert(&self, alert: &Alert) -> Result<(), StoreError>;
    async fn delete_alerts(
        &self,
        user_id: &UserId,
        system_ids: &[SystemId],
        metric: Option<crate::model::AlertMetric>,
    ) -> Result<Vec<AlertId>, StoreError>;
    async fn append_alert_history(&self, row: &AlertHistory) -> Result<(), StoreError>;
    /// Sets `resolved_at` on the still-open row for `(alert_id, fired_at)`.
    /// A no-op if no such open row exists (e.g. it was already resolved).
    async fn resolve_alert_history(&self, alert_id: &AlertId, fired_at: u64, resolved_at: u64)
        -> Result<(), StoreError>;
    async fn non_paused_systems(&self) -> Result<Vec<System>, StoreError>;
    async fn user_count(&self) -> Result<u64, StoreError>;
    async fn create_user(&self, email: &str) -> Result<User, StoreError>;
}

/// In-memory `RecordStore`, used by `hub-specs` and as the default when no
/// external store is wired up. Every map is guarded by its own lock so a
/// slow fingerprint lookup never blocks a sample write.
#[derive(Default)]
pub struct MemoryRecordStore {
    systems: RwLock<HashMap<SystemId, System>>,
    samples: RwLock<Vec<Sample>>,
    container_samples: RwLock<Vec<ContainerSample>>,
    fingerprints: RwLock<HashMap<SystemId, Fingerprint>>,
    alerts: RwLock<HashMap<SystemId, Vec<Alert>>>,
    alert_history: RwLock<Vec<AlertHistory>>,
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_system(&self, id: &SystemId) -> Result<Option<System>, StoreError> {
        let systems = self.systems.read().await;
        Ok(systems.get(id).cloned())
    }

    async fn save_system(&self, sys: &System) -> Result<(), StoreError> {
        let mut systems = self.systems.write().await;
        systems.insert(sys.id.clone(), sys.clone());
        Ok(())
    }

    async fn delete_system(&self, id: &SystemId) -> Result<(), StoreError> {
        self.systems.write().await.remove(id);
        Ok(())
    }

    async fn create_sample(&self, sample: &Sample) -> Result<(), StoreError> {
        let mut samples = self.samples.write().await;
        samples.push(sample.clone());
        Ok(())
    }

    async fn create_container_sample(&self, s: &ContainerSample) -> Result<(), StoreError> {
        let mut rows = self.container_samples.write().await;
        rows.push(s.clone());
        Ok(())
    }

    async fn find_fingerprint(&self, system_id: &SystemId) -> Result<Option<Fingerprint>, StoreError> {
        let fps = self.fingerprints.read().await;
        Ok(fps.get(system_id).cloned())
    }

    async fn find_fingerprint_by_token(&self, token: &[u8]) -> Result<Option<Fingerprint>, StoreError> {
        let fps = self.fingerprints.read().await;
        Ok(fps.values().find(|fp| fp.token == token).cloned())
    }

    async fn upsert_fingerprint(&self, fp: &Fingerprint) -> Result<(), StoreError> {
        let mut fps = self.fingerprints.write().await;
        fps.insert(fp.system_id.clone(), fp.clone());
        Ok(())
    }

    async fn delete_fingerprint(&self, system_id: &SystemId) -> Result<(), StoreError> {
        self.fingerprints.write().await.remove(system_id);
        Ok(())
    }

    async fn alerts_for_system(&self, system_id: &SystemId) -> Result<Vec<Alert>, StoreError> {
        let alerts = self.alerts.read().await;
        Ok(alerts.get(system_id).cloned().unwrap_or_default())
    }

    async fn alerts_for_user(&self, user_id: &UserId) -> Result<Vec<Alert>, StoreError> {
        let alerts = self.alerts.read().await;
        Ok(alerts.values().flatten().filter(|a| &a.user_id == user_id).cloned().collect())
    }

    async fn save_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let mut alerts = self.alerts.write().await;
        let rows = alerts.entry(alert.system_id.clone()).or_default();
        if let Some(existing) = rows.iter_mut().find(|a| a.id == alert.id) {
            *existing = alert.clone();
        } else {
            rows.push(alert.clone());
        }
        Ok(())
    }

    async fn delete_alerts(
        &self,
        user_id: &UserId,
        system_ids: &[SystemId],
        metric: Option<crate::model::AlertMetric>,
    ) -> Result<Vec<AlertId>, StoreError> {
        let mut alerts = self.alerts.write().await;
        let mut removed = Vec::new();
        for system_id in system_ids {
            let Some(rows) = alerts.get_mut(system_id) else { continue };
            rows.retain(|a| {
                let metric_matches = match metric {
                    Some(m) => a.metric == m,
                    None => true,
                };
                let matches = &a.user_id == user_id && metric_matches;
                if matches {
                    removed.push(a.id.clone());
                }
                !matches
            });
        }
        Ok(removed)
    }

    async fn append_alert_history(&self, row: &AlertHistory) -> Result<(), StoreError> {
        let mut history = self.alert_history.write().await;
        history.push(row.clone());
        Ok(())
    }

    async fn resolve_alert_history(
        &self,
        alert_id: &AlertId,
        fired_at: u64,
        resolved_at: u64,
    ) -> Result<(), StoreError> {
        let mut history = self.alert_history.write().await;
        if let Some(row) = history
            .iter_mut()
            .find(|r| &r.alert_id == alert_id && r.fired_at == fired_at && r.resolved_at.is_none())
        {
            row.resolved_at = Some(resolved_at);
        }
        Ok(())
    }

    async fn non_paused_systems(&self) -> Result<Vec<System>, StoreError> {
        let systems = self.systems.read().await;
        Ok(systems
            .values()
            .filter(|s| s.status != crate::model::SystemStatus::Paused)
            .cloned()
            .collect())
    }

    async fn user_count(&self) -> Result<u64, StoreError> {
        Ok(self.users.read().await.len() as u64)
    }

    async fn create_user(&self, email: &str) -> Result<User, StoreError> {
        let user = User { id: UserId::from(crate::ids::new_id()), email: email.to_owned() };
        self.users.write().await.insert(user.id.clone(), user.clone());
        Ok(user)
    }
}
