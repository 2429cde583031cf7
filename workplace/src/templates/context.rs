// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::report::ReportEntry;
use minijinja::{Value, context};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ReportLineView {
    pub css_class: &'static str,
    pub text: String,
}

impl ReportLineView {
    pub fn from_entries(entries: &[ReportEntry]) -> Vec<Self> {
        entries
            .iter()
            .map(|entry| Self {
                css_class: entry.format.css_class(),
                text: entry.text.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub checkbox: bool,
    pub required: bool,
    pub help: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenSummary {
    pub name: &'static str,
    pub label: &'static str,
    pub url: String,
    pub visible: bool,
    pub activatable: bool,
    pub busy_title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperationView {
    pub slot: &'static str,
    pub title: String,
    pub state: &'static str,
    pub started_at: String,
    pub screen_url: String,
}

#[derive(Debug, Clone)]
pub struct ErrorPageContext {
    app_name: String,
    admin_path: String,
    message: String,
}

impl ErrorPageContext {
    pub fn new(app_name: &str, admin_path: &str, message: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            admin_path: admin_path.to_string(),
            message: message.to_string(),
        }
    }

    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.app_name,
            admin_path => &self.admin_path,
            message => &self.message
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexContext {
    pub app_name: String,
    pub admin_path: String,
    pub description: String,
    pub screens: Vec<ScreenSummary>,
    pub active: Vec<ActiveOperationView>,
}

impl IndexContext {
    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.app_name,
            admin_path => &self.admin_path,
            description => &self.description,
            screens => &self.screens,
            active => &self.active
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationFormContext {
    pub app_name: String,
    pub admin_path: String,
    pub screen: &'static str,
    pub label: &'static str,
    pub action_url: String,
    pub csrf_field: &'static str,
    pub csrf_token: String,
    pub fields: Vec<FieldView>,
    pub error: Option<String>,
}

impl OperationFormContext {
    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.app_name,
            admin_path => &self.admin_path,
            screen => self.screen,
            label => self.label,
            action_url => &self.action_url,
            csrf_field => self.csrf_field,
            csrf_token => &self.csrf_token,
            fields => &self.fields,
            error => &self.error
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationWaitContext {
    pub app_name: String,
    pub admin_path: String,
    pub screen: &'static str,
    pub label: &'static str,
    pub title: String,
    pub operation_id: String,
    pub poll_url: String,
    pub form_url: String,
    pub retry_after_ms: u64,
    pub report: Vec<ReportLineView>,
}

impl OperationWaitContext {
    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.app_name,
            admin_path => &self.admin_path,
            screen => self.screen,
            label => self.label,
            title => &self.title,
            operation_id => &self.operation_id,
            poll_url => &self.poll_url,
            form_url => &self.form_url,
            retry_after_ms => self.retry_after_ms,
            report => &self.report
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationDoneContext {
    pub app_name: String,
    pub admin_path: String,
    pub label: &'static str,
    pub title: String,
    pub done_url: String,
    pub report: Vec<ReportLineView>,
}

impl OperationDoneContext {
    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.app_name,
            admin_path => &self.admin_path,
            label => self.label,
            title => &self.title,
            done_url => &self.done_url,
            report => &self.report
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationErrorContext {
    pub app_name: String,
    pub admin_path: String,
    pub label: &'static str,
    pub title: String,
    pub message: String,
    pub detail: Option<String>,
    pub done_url: String,
    pub report: Vec<ReportLineView>,
}

impl OperationErrorContext {
    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.app_name,
            admin_path => &self.admin_path,
            label => self.label,
            title => &self.title,
            message => &self.message,
            detail => &self.detail,
            done_url => &self.done_url,
            report => &self.report
        }
    }
}

/// Fragment appended to the wait view by each poll.
#[derive(Debug, Clone)]
pub struct ReportLinesContext {
    pub lines: Vec<ReportLineView>,
}

impl ReportLinesContext {
    pub fn to_value(&self) -> Value {
        context! {
            lines => &self.lines
        }
    }
}
