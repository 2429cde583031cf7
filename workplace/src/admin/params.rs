// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::operations::{OperationKind, OperationStatus};
use crate::session::WorkplaceSession;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    Initial,
    Start,
    Poll,
    Done,
    Cancel,
}

impl ScreenAction {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("start") => ScreenAction::Start,
            Some("poll") => ScreenAction::Poll,
            Some("done") => ScreenAction::Done,
            Some("cancel") => ScreenAction::Cancel,
            _ => ScreenAction::Initial,
        }
    }

    /// Done and cancel end the screen's dialog and forget its parameters.
    pub fn drops_cache(&self) -> bool {
        matches!(self, ScreenAction::Done | ScreenAction::Cancel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSelector {
    Form,
    Wait,
    Done,
    Error,
}

/// Parameters of one screen request after merging in the session cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenParams {
    pub kind: OperationKind,
    pub action: ScreenAction,
    pub values: BTreeMap<String, String>,
}

impl ScreenParams {
    /// Request values win; keys the request leaves out come from the cache.
    pub fn resolve(
        kind: OperationKind,
        request: &BTreeMap<String, String>,
        cached: &BTreeMap<String, String>,
    ) -> Self {
        let action = ScreenAction::parse(request.get("action").map(String::as_str));
        let mut values = BTreeMap::new();
        for key in kind.parameter_keys() {
            let resolved = match request.get(*key) {
                Some(value) => Some(value.clone()),
                None if action == ScreenAction::Start && kind.flag_keys().contains(key) => {
                    Some("false".to_string())
                }
                None => cached.get(*key).cloned(),
            };
            if let Some(value) = resolved {
                values.insert((*key).to_string(), value);
            }
        }
        Self {
            kind,
            action,
            values,
        }
    }

    /// Resolves against the session cache and writes the outcome back.
    pub fn resolve_in(
        kind: OperationKind,
        request: &BTreeMap<String, String>,
        session: &WorkplaceSession,
    ) -> Self {
        let params = Self::resolve(kind, request, &session.cached_params(kind));
        if params.action.drops_cache() {
            session.clear_params(kind);
        } else {
            session.store_params(kind, params.values.clone());
        }
        params
    }

    pub fn value(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }
}

/// View for an action given the slot's operation state after the action ran.
pub fn select_view(action: ScreenAction, state: Option<&OperationStatus>) -> TemplateSelector {
    match (action, state) {
        (ScreenAction::Done | ScreenAction::Cancel, _) => TemplateSelector::Form,
        (_, None) => TemplateSelector::Form,
        (ScreenAction::Poll, Some(OperationStatus::Succeeded)) => TemplateSelector::Done,
        (ScreenAction::Poll, Some(OperationStatus::Failed(_))) => TemplateSelector::Error,
        (_, Some(_)) => TemplateSelector::Wait,
    }
}
