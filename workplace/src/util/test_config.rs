// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use crate::config::{
    AdminConfig, AppConfig, LoggingConfig, OperationsConfig, ServerConfig, SessionsConfig,
    SlotPolicy, StaticExportConfig, SyncConfig, ValidatedConfig,
};

#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: ValidatedConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ValidatedConfig {
                server: ServerConfig {
                    host: "127.0.0.1".to_string(),
                    port: 5480,
                    workers: 1,
                },
                admin: AdminConfig {
                    path: "/workplace".to_string(),
                },
                app: AppConfig {
                    name: "Test Workplace".to_string(),
                    description: "Test Description".to_string(),
                },
                logging: LoggingConfig {
                    level: "info".to_string(),
                },
                operations: OperationsConfig {
                    poll_interval_ms: 250,
                    slot_policy: SlotPolicy::Reject,
                },
                sessions: SessionsConfig::default(),
                static_export: StaticExportConfig { enabled: true },
                sync: SyncConfig {
                    enabled: true,
                    folders: Vec::new(),
                },
            },
        }
    }

    pub fn with_admin_path(mut self, path: &str) -> Self {
        self.config.admin.path = path.to_string();
        self
    }

    pub fn with_slot_policy(mut self, policy: SlotPolicy) -> Self {
        self.config.operations.slot_policy = policy;
        self
    }

    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.config.operations.poll_interval_ms = interval;
        self
    }

    pub fn with_static_export(mut self, enabled: bool) -> Self {
        self.config.static_export.enabled = enabled;
        self
    }

    pub fn with_sync_folders(mut self, folders: &[&str]) -> Self {
        self.config.sync.folders = folders.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_sync_enabled(mut self, enabled: bool) -> Self {
        self.config.sync.enabled = enabled;
        self
    }

    pub fn with_idle_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.sessions.idle_timeout_seconds = seconds;
        self
    }

    pub fn build(self) -> ValidatedConfig {
        self.config
    }
}

pub fn test_config() -> ValidatedConfig {
    TestConfigBuilder::new().build()
}
