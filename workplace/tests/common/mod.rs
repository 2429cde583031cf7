// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use workplace::admin;
use workplace::app_state::AppState;
use workplace::config::ValidatedConfig;
use workplace::operations::{OperationHandle, OperationKind};
use workplace::report::ReportSink;
use workplace::repository::{ContentRepository, RepositoryError, RepositoryResult};
use workplace::util::TestConfigBuilder;
use workplace::util::test_fixtures::TestFixtureRoot;

pub const ADMIN_PATH: &str = "/workplace";
pub const SESSION_COOKIE: &str = "workplace_session";
const GATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Repository whose publish step blocks until the test releases it.
///
/// Resources with "locked" in their path fail with a conflict once released.
#[derive(Default)]
pub struct ScriptedRepository {
    released: Mutex<bool>,
    signal: Condvar,
}

impl ScriptedRepository {
    pub fn release(&self) {
        let mut released = self.released.lock().unwrap_or_else(|e| e.into_inner());
        *released = true;
        self.signal.notify_all();
    }

    fn wait_for_release(&self) {
        let released = self.released.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self
            .signal
            .wait_timeout_while(released, GATE_TIMEOUT, |released| !*released);
    }
}

impl ContentRepository for ScriptedRepository {
    fn import_module(&self, archive: &str, report: &ReportSink) -> RepositoryResult<()> {
        report.append_line(format!("Imported {}", archive));
        Ok(())
    }

    fn export_module(&self, module: &str, report: &ReportSink) -> RepositoryResult<()> {
        report.append_line(format!("Exported {}", module));
        Ok(())
    }

    fn delete_module(&self, module: &str, report: &ReportSink) -> RepositoryResult<()> {
        report.append_line(format!("Deleted {}", module));
        Ok(())
    }

    fn static_export(&self, root: &str, report: &ReportSink) -> RepositoryResult<()> {
        report.append_line(format!("Exported {}", root));
        Ok(())
    }

    fn synchronize(&self, folders: &[String], report: &ReportSink) -> RepositoryResult<()> {
        report.append_line(format!("Synchronized {}", folders.join(", ")));
        Ok(())
    }

    fn publish_resource(
        &self,
        resource: &str,
        _siblings: bool,
        report: &ReportSink,
    ) -> RepositoryResult<()> {
        report.append_line(format!("Preparing {}", resource));
        self.wait_for_release();
        if resource.contains("locked") {
            return Err(RepositoryError::conflict("resource locked").with_detail("held by editor"));
        }
        report.append_line(format!("Published {}", resource));
        Ok(())
    }
}

pub struct TestHarness {
    pub fixture: TestFixtureRoot,
    pub config: Arc<ValidatedConfig>,
    pub app_state: Arc<AppState>,
    pub repository: Arc<ScriptedRepository>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(TestConfigBuilder::new().build())
    }

    pub fn with_config(config: ValidatedConfig) -> Self {
        let fixture = TestFixtureRoot::new_unique("workplace-http").expect("fixture root");
        let repository = Arc::new(ScriptedRepository::default());
        let shared: Arc<dyn ContentRepository> = repository.clone();
        let app_state = Arc::new(AppState::new(&config, shared));
        Self {
            fixture,
            config: Arc::new(config),
            app_state,
            repository,
        }
    }

    /// Blocks until the operation the session holds for `kind` has finished.
    pub fn wait_for(&self, cookie: &Cookie<'static>, kind: OperationKind) {
        if let Some(handle) = self.handle(cookie, kind) {
            handle.wait();
        }
    }

    pub fn handle(&self, cookie: &Cookie<'static>, kind: OperationKind) -> Option<OperationHandle> {
        self.app_state
            .sessions
            .get(cookie.value())
            .and_then(|session| session.registry().get(kind.slot()))
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        // Let any blocked worker run to completion.
        self.repository.release();
    }
}

pub fn build_test_app(
    harness: &TestHarness,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    > + use<>,
> {
    let config = harness.config.clone();
    let state = harness.app_state.clone();
    App::new().configure(move |cfg| admin::configure(cfg, &config, &state))
}

pub fn session_cookie<B>(response: &ServiceResponse<B>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.into_owned())
        .expect("session cookie issued")
}

/// Cookie and form token of a session opened by rendering a screen's form.
pub struct AdminSession {
    pub cookie: Cookie<'static>,
    pub csrf_token: String,
}

impl AdminSession {
    pub async fn from_form<B: MessageBody>(response: ServiceResponse<B>) -> Self {
        let cookie = session_cookie(&response);
        let body = body_text(&test::read_body(response).await);
        Self {
            cookie,
            csrf_token: csrf_token_in(&body).expect("form carries a csrf token"),
        }
    }

    /// A form post starting the screen's operation with `pairs` as parameters.
    pub fn start(&self, uri: &str, pairs: &[(&str, &str)]) -> TestRequest {
        let mut values = form(&[("action", "start"), ("csrf_token", self.csrf_token.as_str())]);
        values.extend(form(pairs));
        TestRequest::post()
            .uri(uri)
            .cookie(self.cookie.clone())
            .set_form(values)
    }
}

pub fn csrf_token_in(html: &str) -> Option<String> {
    let marker = "name=\"csrf_token\" value=\"";
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}

pub fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub async fn pause() {
    actix_web::rt::time::sleep(Duration::from_millis(20)).await;
}

pub fn body_text(bytes: &web::Bytes) -> String {
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
