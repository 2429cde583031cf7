// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Test doubles for driving operations through their states deterministically.

use crate::operations::tasks::{AdminTask, OperationKind};
use crate::report::ReportSink;
use crate::repository::{ContentRepository, RepositoryError, RepositoryResult};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

const GATE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub enum ScriptedStep {
    Succeed,
    Conflict,
    Panic,
}

/// Blocks inside `run` until its [`Gate`] is released.
pub struct GatedTask {
    step: ScriptedStep,
    entered: Sender<()>,
    release: Receiver<()>,
}

pub struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl GatedTask {
    pub fn new(step: ScriptedStep) -> (Self, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        (
            Self {
                step,
                entered: entered_tx,
                release: release_rx,
            },
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }
}

impl Gate {
    pub fn wait_entered(&self) {
        self.entered
            .recv_timeout(GATE_TIMEOUT)
            .expect("task did not start");
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl AdminTask for GatedTask {
    fn kind(&self) -> OperationKind {
        OperationKind::ResourcePublish
    }

    fn title(&self) -> String {
        "gated task".to_string()
    }

    fn run(&self, _repository: &dyn ContentRepository, report: &ReportSink) -> RepositoryResult<()> {
        report.append_line("working");
        let _ = self.entered.send(());
        let _ = self.release.recv_timeout(GATE_TIMEOUT);
        match self.step {
            ScriptedStep::Succeed => Ok(()),
            ScriptedStep::Conflict => Err(RepositoryError::conflict("resource locked")),
            ScriptedStep::Panic => panic!("scripted panic"),
        }
    }
}

/// Accepts every call and does nothing.
pub struct NullRepository;

impl ContentRepository for NullRepository {
    fn import_module(&self, _archive: &str, _report: &ReportSink) -> RepositoryResult<()> {
        Ok(())
    }

    fn export_module(&self, _module: &str, _report: &ReportSink) -> RepositoryResult<()> {
        Ok(())
    }

    fn delete_module(&self, _module: &str, _report: &ReportSink) -> RepositoryResult<()> {
        Ok(())
    }

    fn static_export(&self, _root: &str, _report: &ReportSink) -> RepositoryResult<()> {
        Ok(())
    }

    fn synchronize(&self, _folders: &[String], _report: &ReportSink) -> RepositoryResult<()> {
        Ok(())
    }

    fn publish_resource(
        &self,
        _resource: &str,
        _siblings: bool,
        _report: &ReportSink,
    ) -> RepositoryResult<()> {
        Ok(())
    }
}

/// Records the calls it receives, in order.
#[derive(Default)]
pub struct RecordingRepository {
    calls: Mutex<Vec<String>>,
}

impl RecordingRepository {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) -> RepositoryResult<()> {
        self.calls.lock().expect("calls lock").push(call);
        Ok(())
    }
}

impl ContentRepository for RecordingRepository {
    fn import_module(&self, archive: &str, _report: &ReportSink) -> RepositoryResult<()> {
        self.record(format!("import_module {}", archive))
    }

    fn export_module(&self, module: &str, _report: &ReportSink) -> RepositoryResult<()> {
        self.record(format!("export_module {}", module))
    }

    fn delete_module(&self, module: &str, _report: &ReportSink) -> RepositoryResult<()> {
        self.record(format!("delete_module {}", module))
    }

    fn static_export(&self, root: &str, _report: &ReportSink) -> RepositoryResult<()> {
        self.record(format!("static_export {}", root))
    }

    fn synchronize(&self, folders: &[String], _report: &ReportSink) -> RepositoryResult<()> {
        self.record(format!("synchronize {}", folders.join(",")))
    }

    fn publish_resource(
        &self,
        resource: &str,
        siblings: bool,
        _report: &ReportSink,
    ) -> RepositoryResult<()> {
        self.record(format!("publish_resource {} {}", resource, siblings))
    }
}
