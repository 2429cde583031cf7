// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::admin::params::ScreenParams;
use crate::config::ValidatedConfig;
use crate::operations::{OperationKind, OperationRegistry};
use crate::templates::{FieldView, ScreenSummary};

/// Screen is offered at all under the current configuration.
pub trait Visible {
    fn is_visible(&self, config: &ValidatedConfig) -> bool;
}

/// Screen can start a new operation right now.
pub trait Activatable {
    fn is_activatable(&self, registry: &OperationRegistry) -> bool;
}

/// One of the workplace operation screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    kind: OperationKind,
}

impl Screen {
    pub fn new(kind: OperationKind) -> Self {
        Self { kind }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        OperationKind::from_name(name).map(Self::new)
    }

    pub fn all() -> impl Iterator<Item = Screen> {
        OperationKind::ALL.into_iter().map(Self::new)
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn url(&self, admin_path: &str) -> String {
        format!("{}/operations/{}", admin_path, self.kind.name())
    }

    pub fn poll_url(&self, admin_path: &str) -> String {
        format!("{}/poll", self.url(admin_path))
    }

    pub fn fields(&self, params: &ScreenParams) -> Vec<FieldView> {
        self.kind
            .parameter_keys()
            .iter()
            .map(|key| {
                let (label, help, required) = describe_field(key);
                FieldView {
                    name: *key,
                    label,
                    value: params.value(key).to_string(),
                    checkbox: self.kind.flag_keys().contains(key),
                    required,
                    help,
                }
            })
            .collect()
    }

    pub fn summary(&self, config: &ValidatedConfig, registry: &OperationRegistry) -> ScreenSummary {
        let busy_title = registry
            .get(self.kind.slot())
            .filter(|handle| handle.is_alive())
            .map(|handle| handle.title().to_string());
        ScreenSummary {
            name: self.kind.name(),
            label: self.kind.label(),
            url: self.url(&config.admin.path),
            visible: self.is_visible(config),
            activatable: self.is_activatable(registry),
            busy_title,
        }
    }
}

impl Visible for Screen {
    fn is_visible(&self, config: &ValidatedConfig) -> bool {
        self.kind.is_enabled(config)
    }
}

impl Activatable for Screen {
    fn is_activatable(&self, registry: &OperationRegistry) -> bool {
        registry
            .get(self.kind.slot())
            .is_none_or(|handle| !handle.is_alive())
    }
}

fn describe_field(key: &str) -> (&'static str, &'static str, bool) {
    match key {
        "archive" => (
            "Package",
            "Name of a package directory below packages/",
            true,
        ),
        "module" => ("Module", "Name of an installed module", true),
        "root" => (
            "Root folder",
            "Published folder to export; defaults to /",
            false,
        ),
        "folders" => (
            "Folders",
            "Comma separated list; empty uses the configured folders",
            false,
        ),
        "resource" => ("Resource", "Path of the resource to publish", true),
        "siblings" => ("Publish all files in the same folder", "", false),
        _ => ("Value", "", false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_config::TestConfigBuilder;
    use std::collections::BTreeMap;

    #[test]
    fn disabled_export_is_not_visible() {
        let config = TestConfigBuilder::new().with_static_export(false).build();
        let export = Screen::new(OperationKind::StaticExport);
        let publish = Screen::new(OperationKind::ResourcePublish);
        assert!(!export.is_visible(&config));
        assert!(publish.is_visible(&config));
    }

    #[test]
    fn empty_registry_is_activatable() {
        let registry = OperationRegistry::default();
        assert!(Screen::all().all(|screen| screen.is_activatable(&registry)));
    }

    #[test]
    fn fields_carry_resolved_values() {
        let screen = Screen::from_name("publish").expect("publish screen");
        let mut request = BTreeMap::new();
        request.insert("resource".to_string(), "/index.html".to_string());
        let params = ScreenParams::resolve(screen.kind(), &request, &BTreeMap::new());

        let fields = screen.fields(&params);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].value, "/index.html");
        assert!(fields[0].required);
        assert!(fields[1].checkbox);
        assert_eq!(
            screen.poll_url("/workplace"),
            "/workplace/operations/publish/poll"
        );
    }
}
