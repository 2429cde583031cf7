// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    LoadError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::LoadError(msg) => write!(f, "Configuration load error: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// What starting an operation does when its slot still holds a running one.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlotPolicy {
    #[default]
    Reject,
    Replace,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdminConfig {
    #[serde(default = "default_admin_path")]
    pub path: String,
}

fn default_admin_path() -> String {
    "/workplace".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OperationsConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub slot_policy: SlotPolicy,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            slot_policy: SlotPolicy::default(),
        }
    }
}

impl OperationsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionsConfig {
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_idle_timeout_seconds() -> u64 {
    1800
}

fn default_cookie_name() -> String {
    "workplace_session".to_string()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout_seconds(),
            cookie_name: default_cookie_name(),
        }
    }
}

impl SessionsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StaticExportConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for StaticExportConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Repository folders mirrored into `sync/` when the screen names none.
    #[serde(default)]
    pub folders: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            folders: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default = "default_admin_config")]
    pub admin: AdminConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub operations: OperationsConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub static_export: StaticExportConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_admin_config() -> AdminConfig {
    AdminConfig {
        path: default_admin_path(),
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub app: AppConfig,
    pub logging: LoggingConfig,
    pub operations: OperationsConfig,
    pub sessions: SessionsConfig,
    pub static_export: StaticExportConfig,
    pub sync: SyncConfig,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config_path = root.join("config.yaml");
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        serde_yaml::from_str(&config_content).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to parse config file '{}': {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Loads and validates configuration at startup. If validation fails, the application should not start.
    pub fn load_and_validate(root: &Path) -> Result<ValidatedConfig, ConfigError> {
        Self::load(root)?.validate()
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        Self::validate_server(&self.server)?;
        let admin = AdminConfig {
            path: Self::normalize_admin_path(&self.admin.path)?,
        };
        Self::validate_logging(&self.logging)?;
        Self::validate_operations(&self.operations)?;
        Self::validate_sessions(&self.sessions)?;
        let sync = SyncConfig {
            enabled: self.sync.enabled,
            folders: Self::validate_sync_folders(&self.sync.folders)?,
        };

        if self.app.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "app.name cannot be empty".to_string(),
            ));
        }

        if self.operations.slot_policy == SlotPolicy::Replace {
            warn!(
                "operations.slot_policy is 'replace': a running operation is orphaned when another starts in its slot"
            );
        }

        Ok(ValidatedConfig {
            server: self.server,
            admin,
            app: self.app,
            logging: self.logging,
            operations: self.operations,
            sessions: self.sessions,
            static_export: self.static_export,
            sync,
        })
    }

    fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
        if server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.host cannot be empty".to_string(),
            ));
        }
        if server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be greater than 0".to_string(),
            ));
        }
        if server.workers == 0 {
            return Err(ConfigError::ValidationError(
                "server.workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn normalize_admin_path(path: &str) -> Result<String, ConfigError> {
        let trimmed = path.trim().trim_end_matches('/');
        if !trimmed.starts_with('/') || trimmed.len() < 2 {
            return Err(ConfigError::ValidationError(format!(
                "admin.path must start with '/' and name a prefix, got: '{}'",
                path
            )));
        }
        if trimmed.contains("..") || trimmed.contains("//") {
            return Err(ConfigError::ValidationError(format!(
                "admin.path contains an invalid segment: '{}'",
                path
            )));
        }
        Ok(trimmed.to_string())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        match logging.level.to_ascii_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "logging.level must be one of off, error, warn, info, debug, trace, got: {}",
                other
            ))),
        }
    }

    fn validate_operations(operations: &OperationsConfig) -> Result<(), ConfigError> {
        if !(100..=60_000).contains(&operations.poll_interval_ms) {
            return Err(ConfigError::ValidationError(format!(
                "operations.poll_interval_ms must be between 100 and 60000, got: {}",
                operations.poll_interval_ms
            )));
        }
        Ok(())
    }

    fn validate_sessions(sessions: &SessionsConfig) -> Result<(), ConfigError> {
        if sessions.idle_timeout_seconds < 60 {
            return Err(ConfigError::ValidationError(format!(
                "sessions.idle_timeout_seconds must be at least 60, got: {}",
                sessions.idle_timeout_seconds
            )));
        }
        let cookie = sessions.cookie_name.as_str();
        if cookie.is_empty()
            || !cookie
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::ValidationError(format!(
                "sessions.cookie_name must be non-empty and use only letters, digits, '_' or '-', got: '{}'",
                cookie
            )));
        }
        Ok(())
    }

    fn validate_sync_folders(folders: &[String]) -> Result<Vec<String>, ConfigError> {
        let mut validated = Vec::with_capacity(folders.len());
        for folder in folders {
            let trimmed = folder.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.split('/').any(|segment| segment == "..") {
                return Err(ConfigError::ValidationError(format!(
                    "sync.folders entry leaves the repository: '{}'",
                    folder
                )));
            }
            validated.push(trimmed.to_string());
        }
        Ok(validated)
    }
}

impl ValidatedConfig {
    pub fn is_localhost_only(&self) -> bool {
        let host = self.server.host.trim();
        if host.eq_ignore_ascii_case("localhost") {
            return true;
        }
        host.parse::<IpAddr>()
            .map(|addr| addr.is_loopback())
            .unwrap_or(false)
    }

    pub fn bind_address(&self) -> (&str, u16) {
        (self.server.host.as_str(), self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_fixtures::TestFixtureRoot;
    use std::fs;

    const MINIMAL: &str = "server:\n  host: \"127.0.0.1\"\n  port: 5480\napp:\n  name: \"Workplace\"\n";

    #[test]
    fn minimal_config_gets_defaults() {
        let fixture = TestFixtureRoot::new_unique("config-minimal").unwrap();
        fs::write(fixture.path().join("config.yaml"), MINIMAL).unwrap();

        let config = Config::load_and_validate(fixture.path()).expect("valid config");
        assert_eq!(config.admin.path, "/workplace");
        assert_eq!(config.operations.poll_interval_ms, 2000);
        assert_eq!(config.operations.slot_policy, SlotPolicy::Reject);
        assert_eq!(config.sessions.cookie_name, "workplace_session");
        assert!(config.static_export.enabled);
        assert!(config.sync.folders.is_empty());
        assert!(config.is_localhost_only());
    }

    #[test]
    fn slot_policy_parses_replace() {
        let fixture = TestFixtureRoot::new_unique("config-replace").unwrap();
        let content = format!("{}operations:\n  slot_policy: replace\n", MINIMAL);
        fs::write(fixture.path().join("config.yaml"), content).unwrap();

        let config = Config::load_and_validate(fixture.path()).expect("valid config");
        assert_eq!(config.operations.slot_policy, SlotPolicy::Replace);
    }

    #[test]
    fn unknown_slot_policy_fails_to_load() {
        let fixture = TestFixtureRoot::new_unique("config-bad-policy").unwrap();
        let content = format!("{}operations:\n  slot_policy: queue\n", MINIMAL);
        fs::write(fixture.path().join("config.yaml"), content).unwrap();

        let err = Config::load(fixture.path()).expect_err("unknown policy");
        assert!(matches!(err, ConfigError::LoadError(_)));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let fixture = TestFixtureRoot::new_unique("config-missing").unwrap();
        let err = Config::load(fixture.path()).expect_err("no config file");
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn admin_path_is_normalized() {
        assert_eq!(
            Config::normalize_admin_path("/workplace/").unwrap(),
            "/workplace"
        );
        assert!(Config::normalize_admin_path("workplace").is_err());
        assert!(Config::normalize_admin_path("/").is_err());
        assert!(Config::normalize_admin_path("/a/../b").is_err());
    }

    #[test]
    fn poll_interval_bounds() {
        let mut operations = OperationsConfig::default();
        assert!(Config::validate_operations(&operations).is_ok());
        operations.poll_interval_ms = 10;
        assert!(Config::validate_operations(&operations).is_err());
    }

    #[test]
    fn sync_folders_reject_parent_segments() {
        let folders = vec!["/sites/default".to_string(), " ".to_string()];
        assert_eq!(
            Config::validate_sync_folders(&folders).unwrap(),
            vec!["/sites/default".to_string()]
        );
        assert!(Config::validate_sync_folders(&["/a/../b".to_string()]).is_err());
    }

    #[test]
    fn cookie_name_is_restricted() {
        let mut sessions = SessionsConfig::default();
        assert!(Config::validate_sessions(&sessions).is_ok());
        sessions.cookie_name = "bad name;".to_string();
        assert!(Config::validate_sessions(&sessions).is_err());
    }

    #[test]
    fn logging_level_is_checked() {
        let mut logging = LoggingConfig::default();
        assert!(Config::validate_logging(&logging).is_ok());
        logging.level = "loud".to_string();
        assert!(Config::validate_logging(&logging).is_err());
    }
}
