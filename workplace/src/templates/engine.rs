// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use minijinja::{Environment, Value, default_auto_escape_callback};

pub trait TemplateEngine: Send + Sync {
    fn render(&self, template_name: &str, context: Value) -> Result<String, minijinja::Error>;
}

pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(default_auto_escape_callback);
        env.set_loader(embedded_template_loader);
        Self { env }
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, template_name: &str, context: Value) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(template_name)?;
        tmpl.render(context)
    }
}

/// Template loader for minijinja that loads from embedded sources
fn embedded_template_loader(name: &str) -> Result<Option<String>, minijinja::Error> {
    let template_content = match name {
        "layout.html" => Some(include_str!("../admin/templates/layout.html")),

        // Error pages
        "error_404.html" => Some(include_str!("../admin/templates/error_404.html")),
        "error_500.html" => Some(include_str!("../admin/templates/error_500.html")),

        // Workplace screens
        "admin/index.html" => Some(include_str!("../admin/templates/index.html")),
        "admin/operation_form.html" => {
            Some(include_str!("../admin/templates/operation_form.html"))
        }
        "admin/operation_wait.html" => {
            Some(include_str!("../admin/templates/operation_wait.html"))
        }
        "admin/operation_done.html" => {
            Some(include_str!("../admin/templates/operation_done.html"))
        }
        "admin/operation_error.html" => {
            Some(include_str!("../admin/templates/operation_error.html"))
        }
        "admin/report_lines.html" => Some(include_str!("../admin/templates/report_lines.html")),

        _ => None,
    };

    Ok(template_content.map(|s| s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn report_lines_are_escaped() {
        let engine = MiniJinjaEngine::new();
        let html = engine
            .render(
                "admin/report_lines.html",
                context! {
                    lines => vec![context! { css_class => "report-error", text => "<b>boom</b>" }]
                },
            )
            .expect("render");
        assert!(html.contains("report-error"));
        assert!(html.contains("&lt;b&gt;boom"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let engine = MiniJinjaEngine::new();
        assert!(engine.render("admin/missing.html", context! {}).is_err());
    }
}
