// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub's error taxonomy (§7): API-facing errors carry an HTTP status and
//! a machine-readable code; anything else is a programming error that
//! propagates as `anyhow::Error` and is allowed to unwind its task.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Errors surfaced across the admin API and the agent-facing transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum HubError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("token or fingerprint invalid")]
    AuthFingerprintMismatch,
    #[error("agent version too old")]
    AuthVersionTooOld,
    #[error("bad request")]
    BadRequest,
    #[error("system not found")]
    SystemNotFound,
    #[error("upstream transport error")]
    TransportError,
    #[error("record store error")]
    Persistence,
    #[error("internal error")]
    Internal,
}

impl HubError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized | Self::AuthFingerprintMismatch | Self::AuthVersionTooOld => 401,
            Self::BadRequest => 400,
            Self::SystemNotFound => 404,
            Self::TransportError => 502,
            Self::Persistence | Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::AuthFingerprintMismatch => "FINGERPRINT_MISMATCH",
            Self::AuthVersionTooOld => "VERSION_TOO_OLD",
            Self::BadRequest => "BAD_REQUEST",
            Self::SystemNotFound => "SYSTEM_NOT_FOUND",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::Persistence => "PERSISTENCE_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error: self.to_error_body(message) }))
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with a machine-readable code and a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Errors from the transport layer (§4.A), distinguishing retry policy.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Auth failure: invalid/expired token, fingerprint mismatch, version too old. Never retried.
    #[error("auth failure: {0}")]
    Auth(HubError),
    /// Dial/framing/timeout failure. Retried once per tick on the hub-initiated channel;
    /// closes and falls back on the persistent channel.
    #[error("transient transport error: {0}")]
    Transient(String),
    /// Handshake failure or protocol violation. Connection is closed and the system
    /// marked down, but stays in the registry for future reconnect.
    #[error("fatal transport error: {0}")]
    Fatal(String),
    /// The operation did not complete within its budget.
    #[error("transport operation timed out")]
    Timeout,
    /// The caller's cancellation token fired mid-operation.
    #[error("transport operation cancelled")]
    Cancelled,
}

/// Errors from the record-store collaborator (§6). Logged and swallowed by
/// the updater; the sample in flight is dropped rather than retried.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store backend error: {0}")]
    Backend(String),
}
