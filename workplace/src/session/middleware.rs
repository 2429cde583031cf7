// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::session::store::WorkplaceSessionStore;
use actix_web::{
    Error, HttpMessage,
    cookie::{Cookie, SameSite},
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::Method,
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::sync::Arc;

/// Attaches the caller's workplace session to every request, issuing a cookie for new ones.
pub struct WorkplaceSessionMiddleware {
    store: Arc<WorkplaceSessionStore>,
    cookie_name: String,
    cookie_path: String,
}

impl WorkplaceSessionMiddleware {
    pub fn new(store: Arc<WorkplaceSessionStore>, cookie_name: &str, cookie_path: &str) -> Self {
        Self {
            store,
            cookie_name: cookie_name.to_string(),
            cookie_path: cookie_path.to_string(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WorkplaceSessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = WorkplaceSessionMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WorkplaceSessionMiddlewareService {
            service,
            store: self.store.clone(),
            cookie_name: self.cookie_name.clone(),
            cookie_path: self.cookie_path.clone(),
        }))
    }
}

pub struct WorkplaceSessionMiddlewareService<S> {
    service: S,
    store: Arc<WorkplaceSessionStore>,
    cookie_name: String,
    cookie_path: String,
}

impl<S, B> Service<ServiceRequest> for WorkplaceSessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let cookie_value = req
            .cookie(&self.cookie_name)
            .map(|cookie| cookie.value().to_string());

        // Only safe requests may open a session; a form post must come from one already issued.
        let (session, created) = if is_safe_method(req.method()) {
            self.store.resolve(cookie_value.as_deref())
        } else {
            match cookie_value.as_deref().and_then(|id| self.store.get(id)) {
                Some(session) => (session, false),
                None => {
                    log::warn!(
                        "Refusing {} {} without an established workplace session",
                        req.method(),
                        req.path()
                    );
                    return Box::pin(ready(Err(actix_web::error::ErrorForbidden(
                        "Workplace session required",
                    ))));
                }
            }
        };

        let new_cookie = if created {
            Some(
                Cookie::build(self.cookie_name.clone(), session.id().to_string())
                    .path(self.cookie_path.clone())
                    .http_only(true)
                    .same_site(SameSite::Strict)
                    .finish(),
            )
        } else {
            None
        };

        req.extensions_mut().insert(session);

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?;
            if let Some(cookie) = new_cookie
                && let Err(err) = res.response_mut().add_cookie(&cookie)
            {
                log::warn!("Failed to set workplace session cookie: {}", err);
            }
            Ok(res)
        })
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
