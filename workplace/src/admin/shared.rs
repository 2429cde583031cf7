// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::templates::{ErrorPageContext, TemplateEngine, render_minijinja_template};
use actix_web::{HttpResponse, http::StatusCode};
use minijinja::Value;
use serde_json::json;

/// Renders an admin page, falling back to a plain 500 page if the template fails.
pub fn render_page(
    engine: &dyn TemplateEngine,
    template_name: &str,
    context: Value,
    status: StatusCode,
    app_name: &str,
    admin_path: &str,
) -> HttpResponse {
    match render_minijinja_template(engine, template_name, context) {
        Ok(html) => html_response(status, html),
        Err(e) => {
            log::error!("Failed to render template {}: {}", template_name, e);
            serve_500(engine, app_name, admin_path)
        }
    }
}

pub fn serve_500(engine: &dyn TemplateEngine, app_name: &str, admin_path: &str) -> HttpResponse {
    let context = ErrorPageContext::new(
        app_name,
        admin_path,
        "The page could not be rendered. The server log has details.",
    )
    .to_value();
    let html = match render_minijinja_template(engine, "error_500.html", context) {
        Ok(html) => html,
        Err(e) => {
            log::error!("Failed to render 500 error template: {}", e);
            fallback_500_html(app_name)
        }
    };
    html_response(StatusCode::INTERNAL_SERVER_ERROR, html)
}

pub fn serve_404(
    engine: &dyn TemplateEngine,
    app_name: &str,
    admin_path: &str,
    message: &str,
) -> HttpResponse {
    let context = ErrorPageContext::new(app_name, admin_path, message).to_value();
    match render_minijinja_template(engine, "error_404.html", context) {
        Ok(html) => html_response(StatusCode::NOT_FOUND, html),
        Err(e) => {
            log::error!("Failed to render 404 error template: {}", e);
            html_response(StatusCode::NOT_FOUND, fallback_404_html(app_name))
        }
    }
}

pub fn html_response(status: StatusCode, html: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Expires", "0"))
        .body(html)
}

pub fn json_error_response(code: &str, message: &str, status_code: StatusCode) -> HttpResponse {
    HttpResponse::build(status_code)
        .insert_header(("Cache-Control", "no-store"))
        .json(json!({
            "state": "none",
            "code": code,
            "message": message,
        }))
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location.to_string()))
        .finish()
}

fn fallback_404_html(app_name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><title>404 - Not Found | {}</title></head>
<body><h1>404 - Page Not Found</h1></body></html>"#,
        html_escape(app_name)
    )
}

fn fallback_500_html(app_name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><title>500 - Internal Server Error | {}</title></head>
<body><h1>500 - Internal Server Error</h1></body></html>"#,
        html_escape(app_name)
    )
}

fn html_escape(input: &str) -> String {
    let mut escaped = String::new();
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
