// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::operations::errors::{ErrorDetails, OperationError};
use crate::operations::tasks::{AdminTask, OperationKind};
use crate::report::{ReportFormat, ReportSink};
use crate::repository::ContentRepository;
use crate::util::sync::lock_or_recover;
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Running,
    Succeeded,
    Failed(ErrorDetails),
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationStatus::Running => "running",
            OperationStatus::Succeeded => "succeeded",
            OperationStatus::Failed(_) => "failed",
        }
    }
}

/// An admin task that has not been started yet.
pub struct LongRunningOperation {
    task: Box<dyn AdminTask>,
    repository: Arc<dyn ContentRepository>,
    sink: Arc<ReportSink>,
}

impl LongRunningOperation {
    pub fn new(task: Box<dyn AdminTask>, repository: Arc<dyn ContentRepository>) -> Self {
        Self {
            task,
            repository,
            sink: Arc::new(ReportSink::new()),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.task.kind()
    }

    pub fn title(&self) -> String {
        self.task.title()
    }

    /// Runs the task on a dedicated thread and returns as soon as it is scheduled.
    pub fn start(self) -> Result<OperationHandle, OperationError> {
        let id = Uuid::new_v4();
        let kind = self.task.kind();
        let title = self.task.title();
        let outcome: Arc<Mutex<Option<OperationStatus>>> = Arc::new(Mutex::new(None));

        let worker = {
            let task = self.task;
            let repository = self.repository;
            let sink = self.sink.clone();
            let outcome = outcome.clone();
            let worker_title = title.clone();
            thread::Builder::new()
                .name(format!("workplace-op-{}", kind.name()))
                .spawn(move || run_worker(id, &worker_title, task, repository, sink, outcome))
                .map_err(|err| {
                    log::error!("Failed to spawn worker for {}: {}", title, err);
                    OperationError::SpawnFailed(err.to_string())
                })?
        };

        log::info!("Started operation {} ({})", title, id);
        Ok(OperationHandle {
            inner: Arc::new(HandleInner {
                id,
                kind,
                title,
                started_at: Utc::now(),
                sink: self.sink,
                worker: Mutex::new(Some(worker)),
                outcome,
            }),
        })
    }
}

fn run_worker(
    id: Uuid,
    title: &str,
    task: Box<dyn AdminTask>,
    repository: Arc<dyn ContentRepository>,
    sink: Arc<ReportSink>,
    outcome: Arc<Mutex<Option<OperationStatus>>>,
) {
    sink.append(format!("Begin: {}", title), ReportFormat::Headline);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        task.run(repository.as_ref(), sink.as_ref())
    }));

    let status = match result {
        Ok(Ok(())) => {
            sink.append(format!("End: {} finished", title), ReportFormat::Ok);
            log::info!("Operation {} ({}) finished", title, id);
            OperationStatus::Succeeded
        }
        Ok(Err(err)) => {
            log::warn!("Operation {} ({}) failed: {}", title, id, err);
            let details = ErrorDetails::from_repository(&err);
            sink.append_error(&details);
            OperationStatus::Failed(details)
        }
        Err(payload) => {
            let details = ErrorDetails::from_panic(payload.as_ref());
            log::error!(
                "Operation {} ({}) aborted by an unexpected failure: {}",
                title,
                id,
                details.message
            );
            sink.append_error(&details);
            OperationStatus::Failed(details)
        }
    };

    *lock_or_recover(&outcome, "Operation outcome") = Some(status);
}

#[derive(Debug)]
struct HandleInner {
    id: Uuid,
    kind: OperationKind,
    title: String,
    started_at: DateTime<Utc>,
    sink: Arc<ReportSink>,
    worker: Mutex<Option<JoinHandle<()>>>,
    outcome: Arc<Mutex<Option<OperationStatus>>>,
}

/// Shared reference to a started operation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    inner: Arc<HandleInner>,
}

impl OperationHandle {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> OperationKind {
        self.inner.kind
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn sink(&self) -> &ReportSink {
        self.inner.sink.as_ref()
    }

    /// Derived from the worker thread itself; false once it has returned.
    pub fn is_alive(&self) -> bool {
        match lock_or_recover(&self.inner.worker, "Operation worker").as_ref() {
            Some(worker) => !worker.is_finished(),
            None => false,
        }
    }

    pub fn status(&self) -> OperationStatus {
        if self.is_alive() {
            return OperationStatus::Running;
        }
        self.reap();
        self.recorded_outcome()
    }

    pub fn get_report_update(&self) -> String {
        self.inner.sink.drain_since_last_read()
    }

    /// Blocks the calling thread until the operation has ended.
    pub fn wait(&self) -> OperationStatus {
        while self.is_alive() {
            thread::sleep(WAIT_POLL_INTERVAL);
        }
        self.status()
    }

    // Joining under the lock keeps concurrent callers from reading the outcome early.
    fn reap(&self) {
        let mut worker = lock_or_recover(&self.inner.worker, "Operation worker");
        if let Some(handle) = worker.take()
            && handle.join().is_err()
        {
            log::error!(
                "Worker for operation {} ({}) panicked outside the task",
                self.inner.title,
                self.inner.id
            );
        }
    }

    fn recorded_outcome(&self) -> OperationStatus {
        lock_or_recover(&self.inner.outcome, "Operation outcome")
            .clone()
            .unwrap_or_else(|| {
                OperationStatus::Failed(ErrorDetails::unexpected(
                    "the worker stopped without reporting an outcome",
                ))
            })
    }
}
