// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::SlotPolicy;
use crate::operations::errors::OperationError;
use crate::operations::handle::{LongRunningOperation, OperationHandle};
use crate::util::sync::lock_or_recover;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Session key under which a screen family keeps its running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationSlot {
    Module,
    StaticExport,
    SyncFolder,
    Publish,
}

impl OperationSlot {
    pub const ALL: [OperationSlot; 4] = [
        OperationSlot::Module,
        OperationSlot::StaticExport,
        OperationSlot::SyncFolder,
        OperationSlot::Publish,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            OperationSlot::Module => "module_thread",
            OperationSlot::StaticExport => "static_export_thread",
            OperationSlot::SyncFolder => "sync_folder_thread",
            OperationSlot::Publish => "publish_thread",
        }
    }
}

/// Operations started by one session, at most one per slot.
#[derive(Debug)]
pub struct OperationRegistry {
    slots: Mutex<HashMap<OperationSlot, OperationHandle>>,
    policy: SlotPolicy,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new(SlotPolicy::default())
    }
}

impl OperationRegistry {
    pub fn new(policy: SlotPolicy) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationSlot, OperationHandle>> {
        lock_or_recover(&self.slots, "Operation registry")
    }

    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    pub fn put(&self, slot: OperationSlot, handle: OperationHandle) -> Option<OperationHandle> {
        self.lock().insert(slot, handle)
    }

    pub fn get(&self, slot: OperationSlot) -> Option<OperationHandle> {
        self.lock().get(&slot).cloned()
    }

    pub fn clear(&self, slot: OperationSlot) -> Option<OperationHandle> {
        self.lock().remove(&slot)
    }

    /// Removes the slot's handle only if it is still the operation `id`.
    pub fn clear_if(&self, slot: OperationSlot, id: Uuid) -> bool {
        let mut slots = self.lock();
        if slots.get(&slot).is_some_and(|handle| handle.id() == id) {
            slots.remove(&slot);
            return true;
        }
        false
    }

    /// Starts `operation` and registers it, applying the slot policy to a live occupant.
    pub fn start(
        &self,
        slot: OperationSlot,
        operation: LongRunningOperation,
    ) -> Result<OperationHandle, OperationError> {
        let mut slots = self.lock();
        if let Some(existing) = slots.get(&slot)
            && existing.is_alive()
        {
            match self.policy {
                SlotPolicy::Reject => {
                    log::info!(
                        "Refused to start {} in {}: {} ({}) is still running",
                        operation.title(),
                        slot.key(),
                        existing.title(),
                        existing.id()
                    );
                    return Err(OperationError::AlreadyRunning {
                        slot,
                        operation_id: existing.id(),
                        title: existing.title().to_string(),
                    });
                }
                SlotPolicy::Replace => {
                    log::warn!(
                        "Orphaning running operation {} ({}) in {}; it will finish unobserved",
                        existing.title(),
                        existing.id(),
                        slot.key()
                    );
                }
            }
        }

        let handle = operation.start()?;
        slots.insert(slot, handle.clone());
        Ok(handle)
    }

    pub fn has_live_operation(&self) -> bool {
        self.lock().values().any(OperationHandle::is_alive)
    }

    /// Occupied slots, in slot order.
    pub fn active(&self) -> Vec<(OperationSlot, OperationHandle)> {
        let slots = self.lock();
        OperationSlot::ALL
            .into_iter()
            .filter_map(|slot| slots.get(&slot).map(|handle| (slot, handle.clone())))
            .collect()
    }
}
