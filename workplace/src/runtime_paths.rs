// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RuntimePaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub content_dir: PathBuf,
    pub offline_dir: PathBuf,
    pub online_dir: PathBuf,
    pub modules_dir: PathBuf,
    pub packages_dir: PathBuf,
    pub exports_dir: PathBuf,
    pub static_dir: PathBuf,
    pub sync_dir: PathBuf,
    pub state_dir: PathBuf,
    pub locks_file: PathBuf,
}

impl RuntimePaths {
    /// Paths below `root` without touching the filesystem.
    pub fn layout(root: &Path) -> Self {
        let content_dir = root.join("content");
        let state_dir = root.join("state");
        Self {
            root: root.to_path_buf(),
            config_file: root.join("config.yaml"),
            offline_dir: content_dir.join("offline"),
            online_dir: content_dir.join("online"),
            content_dir,
            modules_dir: root.join("modules"),
            packages_dir: root.join("packages"),
            exports_dir: root.join("exports"),
            static_dir: root.join("static"),
            sync_dir: root.join("sync"),
            locks_file: state_dir.join("locks.yaml"),
            state_dir,
        }
    }

    /// Resolves the runtime root and creates every directory the repository writes to.
    pub fn from_root(root: &Path) -> Result<Self, ConfigError> {
        let root_path = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root.to_path_buf()
        };

        if !root_path.exists() {
            fs::create_dir_all(&root_path).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "Failed to create runtime root '{}': {}",
                    root_path.display(),
                    e
                ))
            })?;
        }

        let root_canonical = root_path.canonicalize().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to canonicalize runtime root '{}': {}",
                root_path.display(),
                e
            ))
        })?;

        let paths = Self::layout(&root_canonical);
        paths.ensure_layout()?;
        Ok(paths)
    }

    pub fn ensure_layout(&self) -> Result<(), ConfigError> {
        for dir in [
            &self.content_dir,
            &self.offline_dir,
            &self.online_dir,
            &self.modules_dir,
            &self.packages_dir,
            &self.exports_dir,
            &self.static_dir,
            &self.sync_dir,
            &self.state_dir,
        ] {
            ensure_dir_exists(dir)?;
        }
        Ok(())
    }
}

fn ensure_dir_exists(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to create directory '{}': {}",
                path.display(),
                e
            ))
        })?;
    }

    ensure_dir_writable(path, "Directory must be writable")
}

fn ensure_dir_writable(path: &Path, context: &str) -> Result<(), ConfigError> {
    if !path.is_dir() {
        return Err(ConfigError::ValidationError(format!(
            "{} (not a directory): {}",
            context,
            path.display()
        )));
    }

    let probe_path = path.join(format!(".workplace-write-check-{}", Uuid::new_v4()));
    let probe_result = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe_path);

    match probe_result {
        Ok(_) => fs::remove_file(&probe_path).map_err(|err| {
            ConfigError::ValidationError(format!(
                "{} (unable to clean probe file {}): {}",
                context,
                probe_path.display(),
                err
            ))
        }),
        Err(err) => Err(ConfigError::ValidationError(format!(
            "{} ({}): {}",
            context,
            path.display(),
            err
        ))),
    }
}
