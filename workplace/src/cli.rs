// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Shell runner: starts one operation outside the server and streams its report.

use crate::bootstrap::bootstrap_runtime;
use crate::operations::{LongRunningOperation, OperationError, OperationKind, OperationStatus};
use crate::repository::{ContentRepository, FsRepository};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorKind {
    Usage,
    Runtime,
}

#[derive(Debug, Clone)]
pub struct CliError {
    kind: CliErrorKind,
    message: String,
}

impl CliError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            kind: CliErrorKind::Usage,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: CliErrorKind::Runtime,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> CliErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind {
            CliErrorKind::Usage => 2,
            CliErrorKind::Runtime => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<OperationError> for CliError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::InvalidParameters(_) | OperationError::Unavailable(_) => {
                CliError::usage(err.message())
            }
            _ => CliError::runtime(err.message()),
        }
    }
}

/// A parsed `run <screen> key=value...` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCommand {
    pub kind: OperationKind,
    pub values: BTreeMap<String, String>,
}

pub fn help_text() -> String {
    let mut text = String::from(
        "Usage: workplace [-C <root>] [command]\n\n\
         Without a command the workplace server is started.\n\n\
         Commands:\n  \
         run <screen> [key=value...]  Run one operation and print its report\n  \
         help                         Show this help\n\n\
         Screens:\n",
    );
    for kind in OperationKind::ALL {
        let keys = kind.parameter_keys().join(", ");
        text.push_str(&format!("  {:<16} {} ({})\n", kind.name(), kind.label(), keys));
    }
    text
}

pub fn parse_run_command(tokens: &[String]) -> Result<RunCommand, CliError> {
    let Some(command) = tokens.first() else {
        return Err(CliError::usage("Missing command"));
    };
    if !command.eq_ignore_ascii_case("run") {
        return Err(CliError::usage(format!("Unknown command '{}'", command)));
    }
    let Some(screen) = tokens.get(1) else {
        return Err(CliError::usage("Missing screen name for 'run'"));
    };
    let kind = OperationKind::from_name(screen)
        .ok_or_else(|| CliError::usage(format!("Unknown screen '{}'", screen)))?;

    let mut values = BTreeMap::new();
    for token in &tokens[2..] {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| CliError::usage(format!("Expected key=value, got '{}'", token)))?;
        if !kind.parameter_keys().contains(&key) {
            return Err(CliError::usage(format!(
                "'{}' takes no parameter '{}'",
                kind.name(),
                key
            )));
        }
        values.insert(key.to_string(), value.to_string());
    }
    Ok(RunCommand { kind, values })
}

/// Runs a shell command against the runtime at `root`, returning the process exit code.
pub fn run_cli(root: &Path, tokens: Vec<String>) -> i32 {
    let mut stdout = std::io::stdout();
    match run_with_output(root, &tokens, &mut stdout) {
        Ok(OperationStatus::Succeeded) => 0,
        Ok(_) => 1,
        Err(err) => {
            eprintln!("❌ {}", err);
            if err.kind() == CliErrorKind::Usage {
                eprintln!("❌ Use 'workplace help' for usage.");
            }
            err.exit_code()
        }
    }
}

pub fn run_with_output(
    root: &Path,
    tokens: &[String],
    out: &mut dyn Write,
) -> Result<OperationStatus, CliError> {
    let command = parse_run_command(tokens)?;
    let bootstrap = bootstrap_runtime(root)
        .map_err(|err| CliError::runtime(format!("Bootstrap error: {}", err)))?;
    let config = bootstrap.validated_config;

    let task = command.kind.build_task(&command.values, &config)?;
    let repository: Arc<dyn ContentRepository> =
        Arc::new(FsRepository::new(&bootstrap.runtime_paths));
    let handle = LongRunningOperation::new(task, repository).start()?;
    let interval = config.operations.poll_interval();

    loop {
        let alive = handle.is_alive();
        write_update(out, &handle.get_report_update())?;
        if !alive {
            break;
        }
        std::thread::sleep(interval);
    }

    let status = handle.wait();
    write_update(out, &handle.get_report_update())?;
    let summary = match &status {
        OperationStatus::Failed(details) => match &details.detail {
            Some(detail) => format!("{}: {} ({})", status.label(), details.message, detail),
            None => format!("{}: {}", status.label(), details.message),
        },
        _ => status.label().to_string(),
    };
    writeln!(out, "{}", summary)
        .map_err(|err| CliError::runtime(format!("Failed to write output: {}", err)))?;
    Ok(status)
}

fn write_update(out: &mut dyn Write, text: &str) -> Result<(), CliError> {
    if text.is_empty() {
        return Ok(());
    }
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|err| CliError::runtime(format!("Failed to write output: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_fixtures::TestFixtureRoot;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn fast_fixture(name: &str) -> TestFixtureRoot {
        let fixture = TestFixtureRoot::new_unique(name).expect("fixture");
        fixture
            .write_file(
                "config.yaml",
                "server:\n  host: \"127.0.0.1\"\n  port: 6002\napp:\n  name: \"Workplace\"\noperations:\n  poll_interval_ms: 100\n",
            )
            .expect("config");
        fixture
    }

    #[test]
    fn parse_run_collects_parameters() {
        let command =
            parse_run_command(&tokens(&["run", "publish", "resource=/a.html", "siblings=true"]))
                .expect("parse");
        assert_eq!(command.kind, OperationKind::ResourcePublish);
        assert_eq!(command.values.get("resource").map(String::as_str), Some("/a.html"));
        assert_eq!(command.values.get("siblings").map(String::as_str), Some("true"));
    }

    #[test]
    fn parse_run_rejects_unknown_screen_and_keys() {
        let err = parse_run_command(&tokens(&["run", "reboot"])).expect_err("unknown screen");
        assert_eq!(err.exit_code(), 2);
        let err = parse_run_command(&tokens(&["run", "module_export", "archive=x"]))
            .expect_err("foreign key");
        assert!(err.to_string().contains("archive"));
        let err =
            parse_run_command(&tokens(&["run", "module_export", "module"])).expect_err("no equals");
        assert_eq!(err.kind(), CliErrorKind::Usage);
        assert!(parse_run_command(&tokens(&["status"])).is_err());
    }

    #[test]
    fn help_lists_every_screen() {
        let help = help_text();
        for kind in OperationKind::ALL {
            assert!(help.contains(kind.name()));
        }
    }

    #[test]
    fn publish_streams_report_and_succeeds() {
        let fixture = fast_fixture("cli-publish");
        fixture
            .write_file("content/offline/index.html", "home")
            .expect("seed");

        let mut out = Vec::new();
        let status = run_with_output(
            fixture.path(),
            &tokens(&["run", "publish", "resource=/index.html"]),
            &mut out,
        )
        .expect("run");

        assert_eq!(status, OperationStatus::Succeeded);
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("Begin: Publishing /index.html"));
        assert!(text.trim_end().ends_with("succeeded"));
        assert!(fixture.path().join("content/online/index.html").exists());
    }

    #[test]
    fn missing_module_fails_with_details() {
        let fixture = fast_fixture("cli-missing");
        let mut out = Vec::new();
        let status = run_with_output(
            fixture.path(),
            &tokens(&["run", "module_export", "module=absent"]),
            &mut out,
        )
        .expect("run");

        assert!(matches!(status, OperationStatus::Failed(_)));
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("failed: not found"));
    }

    #[test]
    fn missing_required_parameter_is_a_usage_error() {
        let fixture = fast_fixture("cli-usage");
        let mut out = Vec::new();
        let err = run_with_output(fixture.path(), &tokens(&["run", "module_import"]), &mut out)
            .expect_err("archive missing");
        assert_eq!(err.exit_code(), 2);
        assert!(out.is_empty());
    }
}
