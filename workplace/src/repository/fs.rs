// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{
    ContentRepository, RepositoryError, RepositoryErrorKind, RepositoryResult, is_safe_name,
    resolve_relative,
};
use crate::report::{ReportFormat, ReportSink};
use crate::runtime_paths::RuntimePaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MODULE_MANIFEST: &str = "module.yaml";
const MODULE_RESOURCES_DIR: &str = "resources";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ModuleManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
struct LockFile {
    #[serde(default)]
    locked: Vec<String>,
}

/// Content repository stored in the runtime directory.
///
/// `content/offline` holds the working copy, `content/online` the published tree.
/// Modules live in `modules/<name>` and are imported from `packages/<archive>`.
#[derive(Debug, Clone)]
pub struct FsRepository {
    offline_dir: PathBuf,
    online_dir: PathBuf,
    modules_dir: PathBuf,
    packages_dir: PathBuf,
    exports_dir: PathBuf,
    static_dir: PathBuf,
    sync_dir: PathBuf,
    locks_file: PathBuf,
}

impl FsRepository {
    pub fn new(paths: &RuntimePaths) -> Self {
        Self {
            offline_dir: paths.offline_dir.clone(),
            online_dir: paths.online_dir.clone(),
            modules_dir: paths.modules_dir.clone(),
            packages_dir: paths.packages_dir.clone(),
            exports_dir: paths.exports_dir.clone(),
            static_dir: paths.static_dir.clone(),
            sync_dir: paths.sync_dir.clone(),
            locks_file: paths.locks_file.clone(),
        }
    }

    fn read_manifest(&self, dir: &Path) -> RepositoryResult<ModuleManifest> {
        let manifest_path = dir.join(MODULE_MANIFEST);
        let content = match fs::read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::not_found(format!(
                    "'{}' has no {}",
                    dir.file_name()
                        .map(|name| name.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    MODULE_MANIFEST
                )));
            }
            Err(err) => return Err(RepositoryError::io("reading", &manifest_path, err)),
        };
        let manifest: ModuleManifest = serde_yaml::from_str(&content).map_err(|err| {
            RepositoryError::validation(format!("invalid {}", MODULE_MANIFEST))
                .with_detail(err.to_string())
        })?;
        if !is_safe_name(&manifest.name) {
            return Err(RepositoryError::validation(format!(
                "invalid module name '{}'",
                manifest.name
            )));
        }
        Ok(manifest)
    }

    fn module_dir(&self, module: &str) -> RepositoryResult<PathBuf> {
        if !is_safe_name(module) {
            return Err(RepositoryError::validation(format!(
                "invalid module name '{}'",
                module
            )));
        }
        Ok(self.modules_dir.join(module))
    }

    fn locked_paths(&self) -> RepositoryResult<Vec<String>> {
        if !self.locks_file.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.locks_file)
            .map_err(|err| RepositoryError::io("reading", &self.locks_file, err))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let locks: LockFile = serde_yaml::from_str(&content).map_err(|err| {
            RepositoryError::new(RepositoryErrorKind::Internal, "lock table is unreadable")
                .with_detail(err.to_string())
        })?;
        Ok(locks
            .locked
            .iter()
            .map(|path| normalize_resource(path))
            .collect())
    }

    fn ensure_unlocked(&self, resource: &str, locks: &[String]) -> RepositoryResult<()> {
        match find_lock(resource, locks) {
            Some(lock) => Err(RepositoryError::conflict("resource locked")
                .with_detail(format!("'{}' is locked", lock))),
            None => Ok(()),
        }
    }
}

impl ContentRepository for FsRepository {
    fn import_module(&self, archive: &str, report: &ReportSink) -> RepositoryResult<()> {
        if !is_safe_name(archive) {
            return Err(RepositoryError::validation(format!(
                "invalid package name '{}'",
                archive
            )));
        }
        let package = self.packages_dir.join(archive);
        if !package.is_dir() {
            return Err(RepositoryError::not_found(format!(
                "package '{}' not found",
                archive
            )));
        }

        let manifest = self.read_manifest(&package)?;
        let target = self.modules_dir.join(&manifest.name);
        if target.exists() {
            return Err(RepositoryError::conflict(format!(
                "module '{}' is already installed",
                manifest.name
            )));
        }

        report.append(
            format!("Module {} version {}", manifest.name, manifest.version),
            ReportFormat::Note,
        );
        let files = copy_tree(&package, &target, report, "Imported")?;

        let resources = package.join(MODULE_RESOURCES_DIR);
        if resources.is_dir() {
            report.append("Importing module resources", ReportFormat::Headline);
            copy_tree(&resources, &self.offline_dir, report, "Imported resource")?;
        }

        log::info!(
            "Imported module {} {} ({} files)",
            manifest.name,
            manifest.version,
            files
        );
        report.append(
            format!("Module {} installed ({} files)", manifest.name, files),
            ReportFormat::Note,
        );
        Ok(())
    }

    fn export_module(&self, module: &str, report: &ReportSink) -> RepositoryResult<()> {
        let dir = self.module_dir(module)?;
        if !dir.is_dir() {
            return Err(RepositoryError::not_found(format!(
                "module '{}' is not installed",
                module
            )));
        }
        let manifest = self.read_manifest(&dir)?;
        let export_name = format!("{}_{}", manifest.name, manifest.version);
        let target = self.exports_dir.join(&export_name);
        if target.exists() {
            report.append(
                format!("Replacing previous export {}", export_name),
                ReportFormat::Warning,
            );
            remove_path(&target)?;
        }

        let files = copy_tree(&dir, &target, report, "Exported")?;
        log::info!("Exported module {} to {}", module, target.display());
        report.append(
            format!("Export written to exports/{} ({} files)", export_name, files),
            ReportFormat::Note,
        );
        Ok(())
    }

    fn delete_module(&self, module: &str, report: &ReportSink) -> RepositoryResult<()> {
        let dir = self.module_dir(module)?;
        if !dir.is_dir() {
            return Err(RepositoryError::not_found(format!(
                "module '{}' is not installed",
                module
            )));
        }
        remove_path(&dir)?;
        log::info!("Deleted module {}", module);
        report.append_line(format!("Deleted module {}", module));
        Ok(())
    }

    fn static_export(&self, root: &str, report: &ReportSink) -> RepositoryResult<()> {
        let source = resolve_relative(&self.online_dir, root)?;
        if !has_entries(&source) {
            return Err(RepositoryError::not_found(format!(
                "nothing published below '{}'",
                normalize_resource(root)
            )));
        }
        let target = resolve_relative(&self.static_dir, root)?;
        if target.exists() {
            report.append("Removing previous export", ReportFormat::Note);
            remove_path(&target)?;
        }

        let files = copy_tree(&source, &target, report, "Exported")?;
        report.append(
            format!("{} files written to the static export", files),
            ReportFormat::Note,
        );
        Ok(())
    }

    fn synchronize(&self, folders: &[String], report: &ReportSink) -> RepositoryResult<()> {
        if folders.is_empty() {
            return Err(RepositoryError::validation("no folders to synchronize"));
        }
        for folder in folders {
            let source = resolve_relative(&self.offline_dir, folder)?;
            if !source.is_dir() {
                return Err(RepositoryError::not_found(format!(
                    "folder '{}' does not exist",
                    normalize_resource(folder)
                )));
            }
            let target = resolve_relative(&self.sync_dir, folder)?;
            report.append(
                format!("Synchronizing {}", normalize_resource(folder)),
                ReportFormat::Headline,
            );
            let stats = sync_tree(&source, &target, report)?;
            report.append(
                format!(
                    "{} updated, {} unchanged, {} deleted",
                    stats.updated, stats.unchanged, stats.deleted
                ),
                ReportFormat::Note,
            );
        }
        Ok(())
    }

    fn publish_resource(
        &self,
        resource: &str,
        siblings: bool,
        report: &ReportSink,
    ) -> RepositoryResult<()> {
        let normalized = normalize_resource(resource);
        let source = resolve_relative(&self.offline_dir, &normalized)?;
        if !source.exists() {
            return Err(RepositoryError::not_found(format!(
                "resource '{}' does not exist",
                normalized
            )));
        }
        let locks = self.locked_paths()?;
        self.ensure_unlocked(&normalized, &locks)?;

        let mut published = 0;
        if siblings && source.is_file() {
            let parent = parent_resource(&normalized);
            let folder = resolve_relative(&self.offline_dir, &parent)?;
            let entries = fs::read_dir(&folder)
                .map_err(|err| RepositoryError::io("listing", &folder, err))?;
            let mut files = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|err| RepositoryError::io("listing", &folder, err))?;
                if entry.path().is_file() {
                    files.push(entry.file_name().to_string_lossy().to_string());
                }
            }
            files.sort();
            // Nothing goes online while any sibling is locked.
            for name in &files {
                self.ensure_unlocked(&join_resource(&parent, name), &locks)?;
            }
            for name in files {
                let sibling = join_resource(&parent, &name);
                let target = resolve_relative(&self.online_dir, &sibling)?;
                published += copy_tree(&folder.join(&name), &target, report, "Published")?;
            }
        } else {
            let target = resolve_relative(&self.online_dir, &normalized)?;
            published += copy_tree(&source, &target, report, "Published")?;
        }

        log::info!("Published {} ({} files)", normalized, published);
        report.append(
            format!("{} resources published", published),
            ReportFormat::Note,
        );
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SyncStats {
    updated: usize,
    unchanged: usize,
    deleted: usize,
}

fn copy_tree(
    source: &Path,
    target: &Path,
    report: &ReportSink,
    verb: &str,
) -> RepositoryResult<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            RepositoryError::new(
                RepositoryErrorKind::Io,
                format!("walking '{}' failed", source.display()),
            )
            .with_detail(err.to_string())
        })?;
        let relative = relative_to(entry.path(), source)?;
        let destination = join_relative(target, relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|err| RepositoryError::io("creating", &destination, err))?;
            continue;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| RepositoryError::io("creating", parent, err))?;
        }
        fs::copy(entry.path(), &destination)
            .map_err(|err| RepositoryError::io("copying", entry.path(), err))?;
        report.append_line(format!("{} {}", verb, display_name(relative, source)));
        copied += 1;
    }
    Ok(copied)
}

fn sync_tree(source: &Path, target: &Path, report: &ReportSink) -> RepositoryResult<SyncStats> {
    let mut stats = SyncStats::default();
    fs::create_dir_all(target).map_err(|err| RepositoryError::io("creating", target, err))?;

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            RepositoryError::new(
                RepositoryErrorKind::Io,
                format!("walking '{}' failed", source.display()),
            )
            .with_detail(err.to_string())
        })?;
        let relative = relative_to(entry.path(), source)?;
        let destination = join_relative(target, relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|err| RepositoryError::io("creating", &destination, err))?;
            continue;
        }
        if needs_update(entry.path(), &destination) {
            fs::copy(entry.path(), &destination)
                .map_err(|err| RepositoryError::io("copying", entry.path(), err))?;
            report.append_line(format!("Updated {}", display_name(relative, source)));
            stats.updated += 1;
        } else {
            stats.unchanged += 1;
        }
    }

    // Remove anything in the target that no longer exists in the source.
    for entry in WalkDir::new(target).contents_first(true) {
        let entry = entry.map_err(|err| {
            RepositoryError::new(
                RepositoryErrorKind::Io,
                format!("walking '{}' failed", target.display()),
            )
            .with_detail(err.to_string())
        })?;
        let relative = relative_to(entry.path(), target)?;
        if relative.as_os_str().is_empty() || source.join(relative).exists() {
            continue;
        }
        if entry.file_type().is_dir() {
            fs::remove_dir_all(entry.path())
                .map_err(|err| RepositoryError::io("removing", entry.path(), err))?;
        } else {
            fs::remove_file(entry.path())
                .map_err(|err| RepositoryError::io("removing", entry.path(), err))?;
            report.append(
                format!("Deleted {}", display_name(relative, target)),
                ReportFormat::Warning,
            );
            stats.deleted += 1;
        }
    }

    Ok(stats)
}

fn needs_update(source: &Path, destination: &Path) -> bool {
    let (Ok(source_meta), Ok(destination_meta)) = (fs::metadata(source), fs::metadata(destination))
    else {
        return true;
    };
    if source_meta.len() != destination_meta.len() {
        return true;
    }
    match (source_meta.modified(), destination_meta.modified()) {
        (Ok(source_time), Ok(destination_time)) => source_time > destination_time,
        _ => true,
    }
}

fn remove_path(path: &Path) -> RepositoryResult<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|err| RepositoryError::io("removing", path, err))
}

fn join_relative(base: &Path, relative: &Path) -> PathBuf {
    if relative.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(relative)
    }
}

fn has_entries(path: &Path) -> bool {
    if path.is_file() {
        return true;
    }
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn relative_to<'a>(path: &'a Path, base: &Path) -> RepositoryResult<&'a Path> {
    path.strip_prefix(base).map_err(|_| {
        RepositoryError::new(
            RepositoryErrorKind::Internal,
            format!("'{}' is outside '{}'", path.display(), base.display()),
        )
    })
}

fn display_name(relative: &Path, source: &Path) -> String {
    if relative.as_os_str().is_empty() {
        source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    } else {
        relative.to_string_lossy().replace('\\', "/")
    }
}

/// "/a/b/" and "a/b" both become "/a/b"; the root stays "/".
fn normalize_resource(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}

fn parent_resource(resource: &str) -> String {
    match resource.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => resource[..index].to_string(),
    }
}

fn join_resource(folder: &str, name: &str) -> String {
    if folder == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", folder, name)
    }
}

/// A lock on a folder covers everything below it; publishing a folder is blocked by
/// any lock inside it.
fn find_lock(resource: &str, locks: &[String]) -> Option<String> {
    locks
        .iter()
        .find(|lock| {
            lock.as_str() == resource
                || is_below(resource, lock.as_str())
                || is_below(lock.as_str(), resource)
        })
        .cloned()
}

fn is_below(path: &str, folder: &str) -> bool {
    if folder == "/" {
        return true;
    }
    path.strip_prefix(folder)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_fixtures::TestFixtureRoot;

    fn setup(name: &str) -> (TestFixtureRoot, RuntimePaths, FsRepository) {
        let fixture = TestFixtureRoot::new_unique(name).expect("fixture");
        let paths = fixture.runtime_paths().expect("runtime paths");
        let repository = FsRepository::new(&paths);
        (fixture, paths, repository)
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir");
        }
        fs::write(path, content).expect("write file");
    }

    fn seed_package(paths: &RuntimePaths, archive: &str, name: &str) {
        let package = paths.packages_dir.join(archive);
        write(
            &package.join(MODULE_MANIFEST),
            &format!("name: {}\nversion: 1.2.0\n", name),
        );
        write(&package.join("templates/news.html"), "<h1>news</h1>");
        write(&package.join("resources/news/index.html"), "news index");
    }

    #[test]
    fn import_installs_module_and_resources() {
        let (_fixture, paths, repository) = setup("fs-import");
        seed_package(&paths, "news-1.2.0", "org.example.news");
        let report = ReportSink::new();

        repository
            .import_module("news-1.2.0", &report)
            .expect("import");

        assert!(paths.modules_dir.join("org.example.news/module.yaml").exists());
        assert!(paths.offline_dir.join("news/index.html").exists());
        let text = report.snapshot_text();
        assert!(text.contains("Module org.example.news version 1.2.0"));
        assert!(text.contains("Imported templates/news.html"));
    }

    #[test]
    fn import_twice_is_a_conflict() {
        let (_fixture, paths, repository) = setup("fs-import-twice");
        seed_package(&paths, "news", "org.example.news");
        let report = ReportSink::new();
        repository.import_module("news", &report).expect("first import");

        let err = repository
            .import_module("news", &report)
            .expect_err("second import");
        assert_eq!(err.kind(), RepositoryErrorKind::Conflict);
    }

    #[test]
    fn import_missing_package_is_not_found() {
        let (_fixture, _paths, repository) = setup("fs-import-missing");
        let err = repository
            .import_module("absent", &ReportSink::new())
            .expect_err("missing package");
        assert_eq!(err.kind(), RepositoryErrorKind::NotFound);
    }

    #[test]
    fn export_then_delete_module() {
        let (_fixture, paths, repository) = setup("fs-export");
        seed_package(&paths, "news", "org.example.news");
        let report = ReportSink::new();
        repository.import_module("news", &report).expect("import");

        repository
            .export_module("org.example.news", &report)
            .expect("export");
        assert!(
            paths
                .exports_dir
                .join("org.example.news_1.2.0/templates/news.html")
                .exists()
        );

        repository
            .delete_module("org.example.news", &report)
            .expect("delete");
        assert!(!paths.modules_dir.join("org.example.news").exists());
        let err = repository
            .delete_module("org.example.news", &report)
            .expect_err("already deleted");
        assert_eq!(err.kind(), RepositoryErrorKind::NotFound);
    }

    #[test]
    fn publish_copies_offline_to_online() {
        let (_fixture, paths, repository) = setup("fs-publish");
        write(&paths.offline_dir.join("sites/index.html"), "home");
        let report = ReportSink::new();

        repository
            .publish_resource("/sites/index.html", false, &report)
            .expect("publish");

        let published = fs::read_to_string(paths.online_dir.join("sites/index.html"))
            .expect("published file");
        assert_eq!(published, "home");
        assert!(report.snapshot_text().contains("Published index.html"));
    }

    #[test]
    fn publish_with_siblings_includes_folder_files() {
        let (_fixture, paths, repository) = setup("fs-publish-siblings");
        write(&paths.offline_dir.join("sites/index.html"), "home");
        write(&paths.offline_dir.join("sites/about.html"), "about");

        repository
            .publish_resource("/sites/index.html", true, &ReportSink::new())
            .expect("publish");

        assert!(paths.online_dir.join("sites/about.html").exists());
        assert!(paths.online_dir.join("sites/index.html").exists());
    }

    #[test]
    fn publish_locked_resource_is_a_conflict() {
        let (_fixture, paths, repository) = setup("fs-publish-locked");
        write(&paths.offline_dir.join("sites/index.html"), "home");
        write(&paths.locks_file, "locked:\n  - /sites/index.html\n");

        let err = repository
            .publish_resource("/sites", false, &ReportSink::new())
            .expect_err("locked");
        assert_eq!(err.to_string(), "conflict: resource locked");
        assert_eq!(err.detail(), Some("'/sites/index.html' is locked"));
        assert!(!paths.online_dir.join("sites/index.html").exists());
    }

    #[test]
    fn locked_sibling_blocks_the_whole_publish() {
        let (_fixture, paths, repository) = setup("fs-publish-locked-sibling");
        write(&paths.offline_dir.join("sites/a.html"), "a");
        write(&paths.offline_dir.join("sites/b.html"), "b");
        write(&paths.offline_dir.join("sites/z.html"), "z");
        write(&paths.locks_file, "locked:\n  - /sites/z.html\n");

        let report = ReportSink::new();
        let err = repository
            .publish_resource("/sites/a.html", true, &report)
            .expect_err("sibling locked");
        assert_eq!(err.to_string(), "conflict: resource locked");
        assert_eq!(err.detail(), Some("'/sites/z.html' is locked"));
        assert!(!paths.online_dir.join("sites/a.html").exists());
        assert!(!paths.online_dir.join("sites/b.html").exists());
        assert!(report.is_empty());
    }

    #[test]
    fn synchronize_updates_and_deletes() {
        let (_fixture, paths, repository) = setup("fs-sync");
        write(&paths.offline_dir.join("docs/a.txt"), "a");
        write(&paths.offline_dir.join("docs/b.txt"), "b");
        write(&paths.sync_dir.join("docs/stale.txt"), "stale");
        let report = ReportSink::new();

        repository
            .synchronize(&["/docs".to_string()], &report)
            .expect("sync");

        assert!(paths.sync_dir.join("docs/a.txt").exists());
        assert!(!paths.sync_dir.join("docs/stale.txt").exists());
        let text = report.snapshot_text();
        assert!(text.contains("2 updated, 0 unchanged, 1 deleted"));

        let second = ReportSink::new();
        repository
            .synchronize(&["/docs".to_string()], &second)
            .expect("second sync");
        assert!(second.snapshot_text().contains("0 updated, 2 unchanged, 0 deleted"));
    }

    #[test]
    fn static_export_requires_published_content() {
        let (_fixture, paths, repository) = setup("fs-static");
        let err = repository
            .static_export("/", &ReportSink::new())
            .expect_err("nothing published");
        assert_eq!(err.kind(), RepositoryErrorKind::NotFound);

        write(&paths.online_dir.join("index.html"), "home");
        repository
            .static_export("/", &ReportSink::new())
            .expect("export");
        assert!(paths.static_dir.join("index.html").exists());
    }

    #[test]
    fn lock_matching_covers_folders() {
        let locks = vec!["/sites".to_string()];
        assert_eq!(
            find_lock("/sites/a.html", &locks),
            Some("/sites".to_string())
        );
        assert_eq!(find_lock("/other", &locks), None);
        assert_eq!(find_lock("/sitesx", &locks), None);
        assert_eq!(parent_resource("/a.html"), "/");
        assert_eq!(parent_resource("/a/b.html"), "/a");
    }
}
