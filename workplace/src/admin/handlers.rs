// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::admin::params::{ScreenAction, ScreenParams, TemplateSelector, select_view};
use crate::admin::screens::{Screen, Visible};
use crate::admin::shared::{json_error_response, redirect, render_page, serve_404};
use crate::app_state::AppState;
use crate::config::ValidatedConfig;
use crate::operations::{
    ErrorDetails, LongRunningOperation, OperationError, OperationHandle, OperationStatus,
    PollOutcome,
};
use crate::report::ReportEntry;
use crate::session::{
    CSRF_FIELD_NAME, CurrentSession, WorkplaceSession, WorkplaceSessionMiddleware,
    validate_csrf_token,
};
use crate::templates::{
    ActiveOperationView, IndexContext, OperationDoneContext, OperationErrorContext,
    OperationFormContext, OperationWaitContext, ReportLineView, ReportLinesContext,
    render_minijinja_template,
};
use actix_web::{HttpResponse, Result, http::StatusCode, web};
use minijinja::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub fn configure(cfg: &mut web::ServiceConfig, config: &Arc<ValidatedConfig>, state: &Arc<AppState>) {
    let admin_path = config.admin.path.clone();
    let admin_path_for_redirect = admin_path.clone();

    cfg.app_data(web::Data::from(config.clone()))
        .app_data(web::Data::from(state.clone()))
        .route(
            "/",
            web::get().to(move || admin_redirect(admin_path_for_redirect.clone())),
        )
        .service(
            web::scope(&admin_path)
                .wrap(WorkplaceSessionMiddleware::new(
                    state.sessions.clone(),
                    &config.sessions.cookie_name,
                    &admin_path,
                ))
                .route("", web::get().to(index))
                .route("/", web::get().to(index))
                .route("/operations/{screen}/poll", web::get().to(poll_screen))
                .route("/operations/{screen}", web::get().to(show_screen))
                .route("/operations/{screen}", web::post().to(submit_screen))
                .default_service(web::route().to(not_found)),
        );
}

async fn admin_redirect(admin_path: String) -> Result<HttpResponse> {
    Ok(HttpResponse::Found()
        .insert_header(("Location", admin_path))
        .finish())
}

/// Landing page: every screen with its availability and the session's operations.
pub async fn index(
    session: CurrentSession,
    config: web::Data<ValidatedConfig>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let views = Views::new(config.as_ref(), app_state.as_ref());
    let registry = session.registry();

    let screens = Screen::all()
        .map(|screen| screen.summary(config.as_ref(), registry))
        .collect();
    let active = registry
        .active()
        .into_iter()
        .map(|(slot, handle)| ActiveOperationView {
            slot: slot.key(),
            title: handle.title().to_string(),
            state: handle.status().label(),
            started_at: handle
                .started_at()
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
            screen_url: Screen::new(handle.kind()).url(&config.admin.path),
        })
        .collect();

    let context = IndexContext {
        app_name: config.app.name.clone(),
        admin_path: config.admin.path.clone(),
        description: config.app.description.clone(),
        screens,
        active,
    };
    Ok(views.render("admin/index.html", context.to_value(), StatusCode::OK))
}

pub async fn show_screen(
    path: web::Path<String>,
    query: web::Query<BTreeMap<String, String>>,
    session: CurrentSession,
    config: web::Data<ValidatedConfig>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let mut request = query.into_inner();
    // Operations are only started by form submission.
    if ScreenAction::parse(request.get("action").map(String::as_str)) == ScreenAction::Start {
        log::debug!("Ignoring action=start on GET for screen {}", path.as_str());
        request.remove("action");
    }
    let views =
        Views::new(config.as_ref(), app_state.as_ref()).with_csrf_token(session.csrf_token());
    Ok(handle_screen(&views, path.as_str(), &request, &session))
}

pub async fn submit_screen(
    path: web::Path<String>,
    form: web::Form<BTreeMap<String, String>>,
    session: CurrentSession,
    config: web::Data<ValidatedConfig>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request = form.into_inner();
    validate_csrf_token(&session, request.get(CSRF_FIELD_NAME).map(String::as_str))?;
    let views =
        Views::new(config.as_ref(), app_state.as_ref()).with_csrf_token(session.csrf_token());
    Ok(handle_screen(&views, path.as_str(), &request, &session))
}

/// JSON progress for the wait view's polling script.
pub async fn poll_screen(
    path: web::Path<String>,
    session: CurrentSession,
    config: web::Data<ValidatedConfig>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(screen) = Screen::from_name(path.as_str()) else {
        return Ok(json_error_response(
            "unknown_screen",
            &format!("No screen named {}", path.as_str()),
            StatusCode::NOT_FOUND,
        ));
    };

    let views = Views::new(config.as_ref(), app_state.as_ref());
    match app_state
        .poller
        .poll(session.registry(), screen.kind().slot())
    {
        Ok(outcome) => Ok(views.poll_json(outcome)),
        Err(err) => Ok(json_error_response(
            err.code(),
            &err.message(),
            error_status(&err),
        )),
    }
}

pub async fn not_found(
    config: web::Data<ValidatedConfig>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let views = Views::new(config.as_ref(), app_state.as_ref());
    Ok(views.not_found("The requested page does not exist."))
}

fn handle_screen(
    views: &Views<'_>,
    name: &str,
    request: &BTreeMap<String, String>,
    session: &WorkplaceSession,
) -> HttpResponse {
    let Some(screen) = Screen::from_name(name) else {
        return views.not_found(&format!("No screen named {}.", name));
    };
    if !screen.is_visible(views.config) {
        return views.not_found(&format!(
            "{} is disabled in the configuration.",
            screen.kind().label()
        ));
    }

    let params = ScreenParams::resolve_in(screen.kind(), request, session);
    let slot = screen.kind().slot();

    match params.action {
        ScreenAction::Done | ScreenAction::Cancel => redirect(&views.config.admin.path),
        ScreenAction::Start => start_operation(views, screen, &params, session),
        ScreenAction::Poll => match views.state.poller.poll(session.registry(), slot) {
            Ok(outcome) => views.outcome(screen, &params, outcome),
            Err(err) => views.form(screen, &params, Some(err.message()), StatusCode::OK),
        },
        ScreenAction::Initial => {
            let handle = session.registry().get(slot);
            let state = handle.as_ref().map(OperationHandle::status);
            match (select_view(params.action, state.as_ref()), handle) {
                (TemplateSelector::Wait, Some(handle)) => {
                    let report = handle.sink().drain_entries();
                    views.wait(screen, &handle, &report)
                }
                _ => views.form(screen, &params, None, StatusCode::OK),
            }
        }
    }
}

fn start_operation(
    views: &Views<'_>,
    screen: Screen,
    params: &ScreenParams,
    session: &WorkplaceSession,
) -> HttpResponse {
    let kind = screen.kind();
    let task = match kind.build_task(&params.values, views.config) {
        Ok(task) => task,
        Err(err) => return views.start_failed(screen, params, err),
    };

    let operation = LongRunningOperation::new(task, views.state.repository.clone());
    match session.registry().start(kind.slot(), operation) {
        Ok(handle) => {
            log::info!(
                "Session {} started {} ({})",
                session.id(),
                handle.title(),
                handle.id()
            );
            let report = handle.sink().drain_entries();
            views.wait(screen, &handle, &report)
        }
        Err(err) => views.start_failed(screen, params, err),
    }
}

fn error_status(err: &OperationError) -> StatusCode {
    match err {
        OperationError::NoOperation { .. } => StatusCode::NOT_FOUND,
        OperationError::AlreadyRunning { .. } => StatusCode::CONFLICT,
        OperationError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        OperationError::Unavailable(_) => StatusCode::FORBIDDEN,
        OperationError::SpawnFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn retry_after_ms(retry_after: Duration) -> u64 {
    u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PollResponse<'a> {
    state: &'static str,
    operation_id: String,
    kind: &'static str,
    title: &'a str,
    report: &'a [ReportEntry],
    report_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorDetails>,
}

/// Rendering helpers bound to one request's configuration and state.
struct Views<'a> {
    config: &'a ValidatedConfig,
    state: &'a AppState,
    csrf_token: &'a str,
}

impl<'a> Views<'a> {
    fn new(config: &'a ValidatedConfig, state: &'a AppState) -> Self {
        Self {
            config,
            state,
            csrf_token: "",
        }
    }

    fn with_csrf_token(mut self, csrf_token: &'a str) -> Self {
        self.csrf_token = csrf_token;
        self
    }

    fn render(&self, template_name: &str, context: Value, status: StatusCode) -> HttpResponse {
        render_page(
            self.state.templates.as_ref(),
            template_name,
            context,
            status,
            &self.config.app.name,
            &self.config.admin.path,
        )
    }

    fn not_found(&self, message: &str) -> HttpResponse {
        serve_404(
            self.state.templates.as_ref(),
            &self.config.app.name,
            &self.config.admin.path,
            message,
        )
    }

    fn form(
        &self,
        screen: Screen,
        params: &ScreenParams,
        error: Option<String>,
        status: StatusCode,
    ) -> HttpResponse {
        let context = OperationFormContext {
            app_name: self.config.app.name.clone(),
            admin_path: self.config.admin.path.clone(),
            screen: screen.kind().name(),
            label: screen.kind().label(),
            action_url: screen.url(&self.config.admin.path),
            csrf_field: CSRF_FIELD_NAME,
            csrf_token: self.csrf_token.to_string(),
            fields: screen.fields(params),
            error,
        };
        self.render("admin/operation_form.html", context.to_value(), status)
    }

    fn start_failed(&self, screen: Screen, params: &ScreenParams, err: OperationError) -> HttpResponse {
        let status = error_status(&err);
        match &err {
            OperationError::SpawnFailed(_) => log::error!("{}", err),
            _ => log::debug!("Not starting {}: {}", screen.kind().name(), err),
        }
        self.form(screen, params, Some(err.message()), status)
    }

    fn wait(&self, screen: Screen, handle: &OperationHandle, report: &[ReportEntry]) -> HttpResponse {
        let context = OperationWaitContext {
            app_name: self.config.app.name.clone(),
            admin_path: self.config.admin.path.clone(),
            screen: screen.kind().name(),
            label: screen.kind().label(),
            title: handle.title().to_string(),
            operation_id: handle.id().to_string(),
            poll_url: screen.poll_url(&self.config.admin.path),
            form_url: screen.url(&self.config.admin.path),
            retry_after_ms: retry_after_ms(self.state.poller.retry_after()),
            report: ReportLineView::from_entries(report),
        };
        self.render("admin/operation_wait.html", context.to_value(), StatusCode::OK)
    }

    fn outcome(&self, screen: Screen, params: &ScreenParams, outcome: PollOutcome) -> HttpResponse {
        let done_url = format!("{}?action=done", screen.url(&self.config.admin.path));
        match select_view(params.action, Some(&outcome.state)) {
            TemplateSelector::Done => {
                let context = OperationDoneContext {
                    app_name: self.config.app.name.clone(),
                    admin_path: self.config.admin.path.clone(),
                    label: screen.kind().label(),
                    title: outcome.title,
                    done_url,
                    report: ReportLineView::from_entries(&outcome.transcript),
                };
                self.render("admin/operation_done.html", context.to_value(), StatusCode::OK)
            }
            TemplateSelector::Error => {
                let (message, detail) = match outcome.state {
                    OperationStatus::Failed(details) => (details.message, details.detail),
                    _ => (String::new(), None),
                };
                let context = OperationErrorContext {
                    app_name: self.config.app.name.clone(),
                    admin_path: self.config.admin.path.clone(),
                    label: screen.kind().label(),
                    title: outcome.title,
                    message,
                    detail,
                    done_url,
                    report: ReportLineView::from_entries(&outcome.transcript),
                };
                self.render("admin/operation_error.html", context.to_value(), StatusCode::OK)
            }
            TemplateSelector::Wait => {
                let context = OperationWaitContext {
                    app_name: self.config.app.name.clone(),
                    admin_path: self.config.admin.path.clone(),
                    screen: screen.kind().name(),
                    label: screen.kind().label(),
                    title: outcome.title,
                    operation_id: outcome.operation_id.to_string(),
                    poll_url: screen.poll_url(&self.config.admin.path),
                    form_url: screen.url(&self.config.admin.path),
                    retry_after_ms: retry_after_ms(
                        outcome
                            .retry_after
                            .unwrap_or_else(|| self.state.poller.retry_after()),
                    ),
                    report: ReportLineView::from_entries(&outcome.report),
                };
                self.render("admin/operation_wait.html", context.to_value(), StatusCode::OK)
            }
            TemplateSelector::Form => self.form(screen, params, None, StatusCode::OK),
        }
    }

    fn poll_json(&self, outcome: PollOutcome) -> HttpResponse {
        let lines = ReportLinesContext {
            lines: ReportLineView::from_entries(&outcome.report),
        };
        let report_html = match render_minijinja_template(
            self.state.templates.as_ref(),
            "admin/report_lines.html",
            lines.to_value(),
        ) {
            Ok(html) => html,
            Err(e) => {
                log::error!("Failed to render report lines: {}", e);
                String::new()
            }
        };

        let error = match &outcome.state {
            OperationStatus::Failed(details) => Some(details),
            _ => None,
        };
        let body = PollResponse {
            state: outcome.state.label(),
            operation_id: outcome.operation_id.to_string(),
            kind: outcome.kind.name(),
            title: &outcome.title,
            report: &outcome.report,
            report_html,
            retry_after_ms: outcome.retry_after.map(retry_after_ms),
            error,
        };

        let mut response = HttpResponse::Ok();
        response.insert_header(("Cache-Control", "no-store"));
        if let Some(retry_after) = outcome.retry_after {
            let seconds = retry_after.as_millis().div_ceil(1000).max(1);
            response.insert_header(("Retry-After", seconds.to_string()));
        }
        response.json(body)
    }
}
