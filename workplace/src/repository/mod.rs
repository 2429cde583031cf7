// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::report::ReportSink;
use std::error::Error;
use std::fmt;
use std::path::{Component, Path, PathBuf};

mod fs;

pub use fs::{FsRepository, ModuleManifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryErrorKind {
    NotFound,
    Conflict,
    Validation,
    Io,
    Internal,
}

impl RepositoryErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            RepositoryErrorKind::NotFound => "not found",
            RepositoryErrorKind::Conflict => "conflict",
            RepositoryErrorKind::Validation => "validation",
            RepositoryErrorKind::Io => "io",
            RepositoryErrorKind::Internal => "internal",
        }
    }
}

/// Failure raised by the content repository while an operation runs.
#[derive(Debug, Clone)]
pub struct RepositoryError {
    kind: RepositoryErrorKind,
    message: String,
    detail: Option<String>,
}

impl RepositoryError {
    pub fn new(kind: RepositoryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RepositoryErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RepositoryErrorKind::Conflict, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RepositoryErrorKind::Validation, message)
    }

    pub fn io(context: &str, path: &Path, err: std::io::Error) -> Self {
        Self::new(
            RepositoryErrorKind::Io,
            format!("{} '{}' failed", context, path.display()),
        )
        .with_detail(err.to_string())
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> RepositoryErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl Error for RepositoryError {}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Blocking content-repository calls used by the workplace operations.
///
/// Implementations write their own progress lines into the supplied report and
/// return an error on the first failure.
pub trait ContentRepository: Send + Sync {
    fn import_module(&self, archive: &str, report: &ReportSink) -> RepositoryResult<()>;

    fn export_module(&self, module: &str, report: &ReportSink) -> RepositoryResult<()>;

    fn delete_module(&self, module: &str, report: &ReportSink) -> RepositoryResult<()>;

    fn static_export(&self, root: &str, report: &ReportSink) -> RepositoryResult<()>;

    fn synchronize(&self, folders: &[String], report: &ReportSink) -> RepositoryResult<()>;

    fn publish_resource(
        &self,
        resource: &str,
        siblings: bool,
        report: &ReportSink,
    ) -> RepositoryResult<()>;
}

/// Resolves a repository-relative path ("/a/b", "a/b") below `base`.
/// Absolute components are stripped; parent or prefix components are rejected.
pub fn resolve_relative(base: &Path, relative: &str) -> RepositoryResult<PathBuf> {
    let mut resolved = base.to_path_buf();
    for component in Path::new(relative.trim()).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                log::warn!("🚨 SECURITY: Rejected repository path '{}'", relative);
                return Err(RepositoryError::validation(format!(
                    "path '{}' leaves the repository",
                    relative
                )));
            }
        }
    }
    Ok(resolved)
}

/// True for a single safe path segment such as a module name.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_kind_label() {
        let err = RepositoryError::conflict("resource locked");
        assert_eq!(err.to_string(), "conflict: resource locked");
        assert_eq!(err.kind(), RepositoryErrorKind::Conflict);
    }

    #[test]
    fn resolve_relative_strips_root_and_rejects_parents() {
        let base = Path::new("/srv/content");
        assert_eq!(
            resolve_relative(base, "/sites/index.html").expect("resolve"),
            PathBuf::from("/srv/content/sites/index.html")
        );
        assert_eq!(
            resolve_relative(base, "/").expect("root"),
            PathBuf::from("/srv/content")
        );
        let err = resolve_relative(base, "../etc/passwd").expect_err("parent rejected");
        assert_eq!(err.kind(), RepositoryErrorKind::Validation);
    }

    #[test]
    fn safe_names() {
        assert!(is_safe_name("org.example.news"));
        assert!(is_safe_name("module_1-beta"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name("a/b"));
    }
}
