// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::operations::errors::OperationError;
use crate::operations::handle::OperationStatus;
use crate::operations::registry::{OperationRegistry, OperationSlot};
use crate::operations::tasks::OperationKind;
use crate::report::ReportEntry;
use std::time::Duration;
use uuid::Uuid;

/// One poll's view of an operation: its state and the report lines not seen before.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub title: String,
    pub state: OperationStatus,
    pub report: Vec<ReportEntry>,
    /// Every line the operation wrote; only filled in once it has ended.
    pub transcript: Vec<ReportEntry>,
    /// Only set while the operation is running.
    pub retry_after: Option<Duration>,
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressPoller {
    retry_after: Duration,
}

impl ProgressPoller {
    pub fn new(retry_after: Duration) -> Self {
        Self { retry_after }
    }

    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// Reports progress for `slot`, clearing it once the operation is observed finished.
    pub fn poll(
        &self,
        registry: &OperationRegistry,
        slot: OperationSlot,
    ) -> Result<PollOutcome, OperationError> {
        let handle = registry
            .get(slot)
            .ok_or(OperationError::NoOperation { slot })?;

        let state = handle.status();
        // Drained after the status so the final lines of a finished worker are included.
        let report = handle.sink().drain_entries();

        let transcript = if state.is_terminal() {
            handle.sink().snapshot_entries()
        } else {
            Vec::new()
        };

        let retry_after = if state.is_terminal() {
            if registry.clear_if(slot, handle.id()) {
                log::debug!(
                    "Cleared {} after {} ({}) ended as {}",
                    slot.key(),
                    handle.title(),
                    handle.id(),
                    state.label()
                );
            }
            None
        } else {
            Some(self.retry_after)
        };

        Ok(PollOutcome {
            operation_id: handle.id(),
            kind: handle.kind(),
            title: handle.title().to_string(),
            state,
            report,
            transcript,
            retry_after,
        })
    }
}
