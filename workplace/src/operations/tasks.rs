// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::ValidatedConfig;
use crate::operations::errors::OperationError;
use crate::operations::registry::OperationSlot;
use crate::report::{ReportFormat, ReportSink};
use crate::repository::{ContentRepository, RepositoryResult, is_safe_name, resolve_relative};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Unit of work executed on an operation's worker thread.
pub trait AdminTask: Send {
    fn kind(&self) -> OperationKind;

    fn title(&self) -> String;

    fn run(&self, repository: &dyn ContentRepository, report: &ReportSink) -> RepositoryResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ModuleImport,
    ModuleExport,
    ModuleReplace,
    StaticExport,
    FolderSync,
    ResourcePublish,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::ModuleImport,
        OperationKind::ModuleExport,
        OperationKind::ModuleReplace,
        OperationKind::StaticExport,
        OperationKind::FolderSync,
        OperationKind::ResourcePublish,
    ];

    /// Screen name used in URLs and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::ModuleImport => "module_import",
            OperationKind::ModuleExport => "module_export",
            OperationKind::ModuleReplace => "module_replace",
            OperationKind::StaticExport => "static_export",
            OperationKind::FolderSync => "sync_folder",
            OperationKind::ResourcePublish => "publish",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::ModuleImport => "Import module",
            OperationKind::ModuleExport => "Export module",
            OperationKind::ModuleReplace => "Replace module",
            OperationKind::StaticExport => "Static export",
            OperationKind::FolderSync => "Synchronize folders",
            OperationKind::ResourcePublish => "Publish resource",
        }
    }

    pub fn slot(&self) -> OperationSlot {
        match self {
            OperationKind::ModuleImport
            | OperationKind::ModuleExport
            | OperationKind::ModuleReplace => OperationSlot::Module,
            OperationKind::StaticExport => OperationSlot::StaticExport,
            OperationKind::FolderSync => OperationSlot::SyncFolder,
            OperationKind::ResourcePublish => OperationSlot::Publish,
        }
    }

    pub fn parameter_keys(&self) -> &'static [&'static str] {
        match self {
            OperationKind::ModuleImport => &["archive"],
            OperationKind::ModuleExport => &["module"],
            OperationKind::ModuleReplace => &["module", "archive"],
            OperationKind::StaticExport => &["root"],
            OperationKind::FolderSync => &["folders"],
            OperationKind::ResourcePublish => &["resource", "siblings"],
        }
    }

    /// Checkbox parameters: absent from a submitted form means off.
    pub fn flag_keys(&self) -> &'static [&'static str] {
        match self {
            OperationKind::ResourcePublish => &["siblings"],
            _ => &[],
        }
    }

    pub fn is_enabled(&self, config: &ValidatedConfig) -> bool {
        match self {
            OperationKind::StaticExport => config.static_export.enabled,
            OperationKind::FolderSync => config.sync.enabled,
            _ => true,
        }
    }

    /// Validates screen parameters and builds the task that will run them.
    pub fn build_task(
        &self,
        values: &BTreeMap<String, String>,
        config: &ValidatedConfig,
    ) -> Result<Box<dyn AdminTask>, OperationError> {
        if !self.is_enabled(config) {
            return Err(OperationError::Unavailable(format!(
                "{} is disabled in the configuration",
                self.label()
            )));
        }
        let task: Box<dyn AdminTask> = match self {
            OperationKind::ModuleImport => Box::new(ModuleImport {
                archive: required_name(values, "archive")?,
            }),
            OperationKind::ModuleExport => Box::new(ModuleExport {
                module: required_name(values, "module")?,
            }),
            OperationKind::ModuleReplace => Box::new(ModuleReplace {
                module: required_name(values, "module")?,
                archive: required_name(values, "archive")?,
            }),
            OperationKind::StaticExport => Box::new(StaticExport {
                root: match value(values, "root") {
                    Some(root) => checked_path("root", root)?,
                    None => "/".to_string(),
                },
            }),
            OperationKind::FolderSync => Box::new(FolderSync {
                folders: sync_folders(values, &config.sync.folders)?,
            }),
            OperationKind::ResourcePublish => Box::new(ResourcePublish {
                resource: checked_path("resource", required(values, "resource")?)?,
                siblings: value(values, "siblings").is_some_and(is_flag_set),
            }),
        };
        Ok(task)
    }
}

fn value<'a>(values: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    values
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(values: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str, OperationError> {
    value(values, key)
        .ok_or_else(|| OperationError::InvalidParameters(format!("Parameter '{}' is required", key)))
}

fn required_name(values: &BTreeMap<String, String>, key: &str) -> Result<String, OperationError> {
    let name = required(values, key)?;
    if !is_safe_name(name) {
        return Err(OperationError::InvalidParameters(format!(
            "Parameter '{}' must be a plain name, got '{}'",
            key, name
        )));
    }
    Ok(name.to_string())
}

fn checked_path(key: &str, path: &str) -> Result<String, OperationError> {
    resolve_relative(Path::new(""), path).map_err(|_| {
        OperationError::InvalidParameters(format!(
            "Parameter '{}' must stay inside the repository, got '{}'",
            key, path
        ))
    })?;
    Ok(path.to_string())
}

fn sync_folders(
    values: &BTreeMap<String, String>,
    configured: &[String],
) -> Result<Vec<String>, OperationError> {
    let requested: Vec<String> = match value(values, "folders") {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|folder| !folder.is_empty())
            .map(|folder| checked_path("folders", folder))
            .collect::<Result<_, _>>()?,
        None => Vec::new(),
    };
    let folders = if requested.is_empty() {
        configured.to_vec()
    } else {
        requested
    };
    if folders.is_empty() {
        return Err(OperationError::InvalidParameters(
            "No folders given and none configured in sync.folders".to_string(),
        ));
    }
    Ok(folders)
}

pub fn is_flag_set(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

pub struct ModuleImport {
    pub archive: String,
}

impl AdminTask for ModuleImport {
    fn kind(&self) -> OperationKind {
        OperationKind::ModuleImport
    }

    fn title(&self) -> String {
        format!("Importing module from {}", self.archive)
    }

    fn run(&self, repository: &dyn ContentRepository, report: &ReportSink) -> RepositoryResult<()> {
        repository.import_module(&self.archive, report)
    }
}

pub struct ModuleExport {
    pub module: String,
}

impl AdminTask for ModuleExport {
    fn kind(&self) -> OperationKind {
        OperationKind::ModuleExport
    }

    fn title(&self) -> String {
        format!("Exporting module {}", self.module)
    }

    fn run(&self, repository: &dyn ContentRepository, report: &ReportSink) -> RepositoryResult<()> {
        repository.export_module(&self.module, report)
    }
}

/// Deletes the installed module, then imports the archive in its place.
pub struct ModuleReplace {
    pub module: String,
    pub archive: String,
}

impl AdminTask for ModuleReplace {
    fn kind(&self) -> OperationKind {
        OperationKind::ModuleReplace
    }

    fn title(&self) -> String {
        format!("Replacing module {} with {}", self.module, self.archive)
    }

    fn run(&self, repository: &dyn ContentRepository, report: &ReportSink) -> RepositoryResult<()> {
        report.append(
            format!("Deleting module {}", self.module),
            ReportFormat::Headline,
        );
        repository.delete_module(&self.module, report)?;
        report.append(
            format!("Importing module from {}", self.archive),
            ReportFormat::Headline,
        );
        repository.import_module(&self.archive, report)
    }
}

pub struct StaticExport {
    pub root: String,
}

impl AdminTask for StaticExport {
    fn kind(&self) -> OperationKind {
        OperationKind::StaticExport
    }

    fn title(&self) -> String {
        format!("Static export of {}", self.root)
    }

    fn run(&self, repository: &dyn ContentRepository, report: &ReportSink) -> RepositoryResult<()> {
        repository.static_export(&self.root, report)
    }
}

pub struct FolderSync {
    pub folders: Vec<String>,
}

impl AdminTask for FolderSync {
    fn kind(&self) -> OperationKind {
        OperationKind::FolderSync
    }

    fn title(&self) -> String {
        format!("Synchronizing {}", self.folders.join(", "))
    }

    fn run(&self, repository: &dyn ContentRepository, report: &ReportSink) -> RepositoryResult<()> {
        repository.synchronize(&self.folders, report)
    }
}

pub struct ResourcePublish {
    pub resource: String,
    pub siblings: bool,
}

impl AdminTask for ResourcePublish {
    fn kind(&self) -> OperationKind {
        OperationKind::ResourcePublish
    }

    fn title(&self) -> String {
        if self.siblings {
            format!("Publishing {} with siblings", self.resource)
        } else {
            format!("Publishing {}", self.resource)
        }
    }

    fn run(&self, repository: &dyn ContentRepository, report: &ReportSink) -> RepositoryResult<()> {
        repository.publish_resource(&self.resource, self.siblings, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::RecordingRepository;
    use crate::util::test_config::TestConfigBuilder;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn names_round_trip_and_share_module_slot() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(OperationKind::from_name("unknown"), None);
        assert_eq!(OperationKind::ModuleImport.slot(), OperationSlot::Module);
        assert_eq!(OperationKind::ModuleReplace.slot(), OperationSlot::Module);
        assert_eq!(OperationKind::FolderSync.slot(), OperationSlot::SyncFolder);
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let config = TestConfigBuilder::new().build();
        let err = match OperationKind::ModuleExport.build_task(&params(&[("module", " ")]), &config) {
            Err(err) => err,
            Ok(_) => panic!("blank module accepted"),
        };
        assert_eq!(err.code(), "invalid_parameters");
        assert!(err.message().contains("module"));
    }

    #[test]
    fn traversal_is_rejected() {
        let config = TestConfigBuilder::new().build();
        let result = OperationKind::ResourcePublish
            .build_task(&params(&[("resource", "/../secret")]), &config);
        assert!(result.is_err());
        let result =
            OperationKind::ModuleImport.build_task(&params(&[("archive", "../pkg")]), &config);
        assert!(result.is_err());
    }

    #[test]
    fn sync_falls_back_to_configured_folders() {
        let config = TestConfigBuilder::new()
            .with_sync_folders(&["/sites/default"])
            .build();
        let task = OperationKind::FolderSync
            .build_task(&BTreeMap::new(), &config)
            .expect("configured folders");
        assert_eq!(task.title(), "Synchronizing /sites/default");

        let task = OperationKind::FolderSync
            .build_task(&params(&[("folders", "/a, /b")]), &config)
            .expect("explicit folders");
        assert_eq!(task.title(), "Synchronizing /a, /b");

        let bare = TestConfigBuilder::new().build();
        assert!(OperationKind::FolderSync.build_task(&BTreeMap::new(), &bare).is_err());
    }

    #[test]
    fn disabled_screen_is_unavailable() {
        let config = TestConfigBuilder::new().with_static_export(false).build();
        let err = match OperationKind::StaticExport.build_task(&BTreeMap::new(), &config) {
            Err(err) => err,
            Ok(_) => panic!("disabled export accepted"),
        };
        assert_eq!(err.code(), "operation_unavailable");
    }

    #[test]
    fn replace_deletes_then_imports() {
        let repository = RecordingRepository::default();
        let report = ReportSink::new();
        let task = ModuleReplace {
            module: "news".to_string(),
            archive: "news-2.0".to_string(),
        };
        task.run(&repository, &report).expect("replace");

        assert_eq!(
            repository.calls(),
            vec!["delete_module news".to_string(), "import_module news-2.0".to_string()]
        );
        let text = report.snapshot_text();
        assert!(text.contains("Deleting module news"));
        assert!(text.contains("Importing module from news-2.0"));
    }

    #[test]
    fn publish_flag_and_default_root() {
        let config = TestConfigBuilder::new().build();
        let task = OperationKind::ResourcePublish
            .build_task(
                &params(&[("resource", "/sites/index.html"), ("siblings", "on")]),
                &config,
            )
            .expect("publish");
        assert_eq!(task.title(), "Publishing /sites/index.html with siblings");

        let task = OperationKind::StaticExport
            .build_task(&BTreeMap::new(), &config)
            .expect("export");
        assert_eq!(task.title(), "Static export of /");
    }
}
