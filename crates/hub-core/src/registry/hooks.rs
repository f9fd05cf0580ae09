// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record-store event bindings (§4.B). The record store itself lives
//! outside this crate (§1 Non-goals); whatever embeds `hub-core` is
//! expected to call these free functions from its own `OnRecordCreate` /
//! `OnRecordAfterCreateSuccess` / `OnRecordUpdate` /
//! `OnRecordAfterUpdateSuccess` / `OnRecordAfterDeleteSuccess` hooks (§6),
//! the same "hooks enqueue intents onto the registry" shape the teacher
//! uses for `MuxEvent` dispatch.

use std::sync::Arc;
use std::time::Duration;

use crate::ids::SystemId;
use crate::model::{System, SystemStatus};
use crate::state::HubState;

/// `OnRecordCreate`: force a freshly-created system row into `pending` with
/// zero info, regardless of what the caller set.
pub fn before_create(system: &mut System) {
    system.status = SystemStatus::Pending;
    system.info = serde_json::Value::Null;
}

/// `OnRecordAfterCreateSuccess`: install the row in the registry and start
/// its updater.
pub async fn after_create(state: &Arc<HubState>, system: System) {
    let system_id = system.id.clone();
    let entry = state.registry.add_system(system, &state.shutdown).await;
    crate::registry::spawn_updater(
        entry,
        system_id.clone(),
        state.store.clone(),
        state.alerts.clone(),
        state.hub_initiated_for(&system_id).await,
        state.config.tick_interval(),
        Duration::ZERO,
    );
}

/// `OnRecordUpdate`: a system being paused sheds its last observed info
/// before the write lands.
pub fn before_update(system: &mut System) {
    if system.status == SystemStatus::Paused {
        system.info = serde_json::Value::Null;
    }
}

/// `OnRecordAfterUpdateSuccess`: paused systems leave the registry
/// (cancelling their updater); pending systems are (re)installed with one
/// freshly spawned; anything else is synced in place and re-evaluated for a
/// Status alert transition.
pub async fn after_update(state: &Arc<HubState>, system: System) {
    match system.status {
        SystemStatus::Paused => {
            state.alerts.on_system_paused(&system.id).await;
            state.registry.remove_system(&system.id).await;
        }
        SystemStatus::Pending => {
            let system_id = system.id.clone();
            let entry = state.registry.add_system(system, &state.shutdown).await;
            crate::registry::spawn_updater(
                entry,
                system_id.clone(),
                state.store.clone(),
                state.alerts.clone(),
                state.hub_initiated_for(&system_id).await,
                state.config.tick_interval(),
                Duration::ZERO,
            );
        }
        SystemStatus::Up | SystemStatus::Down => {
            state.registry.set_status(&system.id, system.status).await;
            state.alerts.evaluate_status_transition(&system.id, system.status).await;
        }
    }
}

/// `OnRecordAfterDeleteSuccess`: cancel the updater, drop the transport, and
/// remove the now-orphaned fingerprint row.
pub async fn after_delete(state: &Arc<HubState>, system_id: &SystemId) {
    state.registry.remove_system(system_id).await;
    let _ = state.store.delete_fingerprint(system_id).await;
}
