// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod csrf;
mod middleware;
mod store;

pub use csrf::{CSRF_FIELD_NAME, validate_csrf_token};
pub use middleware::WorkplaceSessionMiddleware;
pub use store::{WorkplaceSession, WorkplaceSessionStore};

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorInternalServerError};
use std::future::{Ready, ready};
use std::ops::Deref;
use std::sync::Arc;

/// The workplace session attached by [`WorkplaceSessionMiddleware`].
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Arc<WorkplaceSession>);

impl Deref for CurrentSession {
    type Target = WorkplaceSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for CurrentSession {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let session = req.extensions().get::<Arc<WorkplaceSession>>().cloned();
        ready(match session {
            Some(session) => Ok(CurrentSession(session)),
            None => {
                log::error!("Workplace session missing; is the session middleware installed?");
                Err(ErrorInternalServerError("Session unavailable"))
            }
        })
    }
}
