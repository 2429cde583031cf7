// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Background admin operations: a worker thread per operation, a report it writes
//! progress into, session slots that hold the handles, and the poller that reads them.

pub mod errors;
pub mod handle;
pub mod poller;
pub mod registry;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{ErrorDetails, ErrorOrigin, OperationError};
pub use handle::{LongRunningOperation, OperationHandle, OperationStatus};
pub use poller::{PollOutcome, ProgressPoller};
pub use registry::{OperationRegistry, OperationSlot};
pub use tasks::{AdminTask, OperationKind};
