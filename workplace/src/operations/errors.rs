// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::operations::registry::OperationSlot;
use crate::repository::RepositoryError;
use serde::Serialize;
use std::any::Any;
use std::error::Error;
use std::fmt;
use uuid::Uuid;

/// Caller-sequencing failures raised at the request boundary.
#[derive(Debug, Clone)]
pub enum OperationError {
    NoOperation {
        slot: OperationSlot,
    },
    AlreadyRunning {
        slot: OperationSlot,
        operation_id: Uuid,
        title: String,
    },
    InvalidParameters(String),
    Unavailable(String),
    SpawnFailed(String),
}

impl OperationError {
    pub fn code(&self) -> &'static str {
        match self {
            OperationError::NoOperation { .. } => "no_operation",
            OperationError::AlreadyRunning { .. } => "operation_in_progress",
            OperationError::InvalidParameters(_) => "invalid_parameters",
            OperationError::Unavailable(_) => "operation_unavailable",
            OperationError::SpawnFailed(_) => "spawn_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            OperationError::NoOperation { .. } => "No operation in progress.".to_string(),
            OperationError::AlreadyRunning { title, .. } => {
                format!("Operation already in progress: {}", title)
            }
            OperationError::InvalidParameters(message) => message.clone(),
            OperationError::Unavailable(message) => message.clone(),
            OperationError::SpawnFailed(_) => {
                "The operation could not be started. Please try again later.".to_string()
            }
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::NoOperation { slot } => {
                write!(f, "no operation registered in slot {}", slot.key())
            }
            OperationError::AlreadyRunning {
                slot, operation_id, ..
            } => write!(
                f,
                "operation {} is still running in slot {}",
                operation_id,
                slot.key()
            ),
            OperationError::InvalidParameters(message) => {
                write!(f, "invalid parameters: {}", message)
            }
            OperationError::Unavailable(message) => write!(f, "unavailable: {}", message),
            OperationError::SpawnFailed(message) => {
                write!(f, "failed to start worker thread: {}", message)
            }
        }
    }
}

impl Error for OperationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorOrigin {
    /// Raised by the content repository.
    Domain,
    /// A panic inside the worker.
    Unexpected,
}

/// Failure captured from a worker and shown to the admin once the operation ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    pub origin: ErrorOrigin,
    pub kind: String,
    pub message: String,
    pub detail: Option<String>,
}

impl ErrorDetails {
    pub fn from_repository(err: &RepositoryError) -> Self {
        Self {
            origin: ErrorOrigin::Domain,
            kind: err.kind().label().to_string(),
            message: err.to_string(),
            detail: err.detail().map(str::to_string),
        }
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let reason = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::unexpected(format!("unexpected failure: {}", reason))
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self {
            origin: ErrorOrigin::Unexpected,
            kind: "internal".to_string(),
            message: message.into(),
            detail: Some("The worker stopped abnormally; the server log has details.".to_string()),
        }
    }
}
