// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::session::WorkplaceSession;
use actix_web::Error;

/// Form field carrying the session's CSRF token.
pub const CSRF_FIELD_NAME: &str = "csrf_token";

/// Checks a posted token against the one issued to `session`.
pub fn validate_csrf_token(session: &WorkplaceSession, token: Option<&str>) -> Result<(), Error> {
    let Some(token) = token.filter(|token| !token.is_empty()) else {
        log::warn!("Missing CSRF token in form posted by session {}", session.id());
        return Err(actix_web::error::ErrorBadRequest("CSRF token required"));
    };
    if token != session.csrf_token() {
        log::warn!("Invalid CSRF token in form posted by session {}", session.id());
        return Err(actix_web::error::ErrorForbidden(
            "CSRF token validation failed",
        ));
    }
    log::debug!("CSRF token validated for session {}", session.id());
    Ok(())
}
