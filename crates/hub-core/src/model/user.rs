// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Minimal user row. Full authentication (passwords, sessions, OAuth) is a
/// non-goal (§1): this crate only needs enough of a `User` to own Systems
/// and Alerts, and to gate the first-run `/create-user` endpoint (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
}
