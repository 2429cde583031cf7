// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::sync::Arc;

use crate::config::ValidatedConfig;
use crate::operations::ProgressPoller;
use crate::repository::ContentRepository;
use crate::session::WorkplaceSessionStore;
use crate::templates::{MiniJinjaEngine, TemplateEngine};

pub struct AppState {
    pub templates: Arc<dyn TemplateEngine>,
    pub repository: Arc<dyn ContentRepository>,
    pub sessions: Arc<WorkplaceSessionStore>,
    pub poller: ProgressPoller,
}

impl AppState {
    pub fn new(config: &ValidatedConfig, repository: Arc<dyn ContentRepository>) -> Self {
        Self {
            templates: Arc::new(MiniJinjaEngine::new()),
            repository,
            sessions: Arc::new(WorkplaceSessionStore::from_config(config)),
            poller: ProgressPoller::new(config.operations.poll_interval()),
        }
    }
}
