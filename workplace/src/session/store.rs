// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::{SlotPolicy, ValidatedConfig};
use crate::operations::{OperationKind, OperationRegistry};
use crate::util::sync::{lock_or_recover, read_or_recover, write_or_recover};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

const MAX_SESSIONS: usize = 10000;

/// State one admin browser session keeps between requests.
#[derive(Debug)]
pub struct WorkplaceSession {
    id: String,
    csrf_token: String,
    registry: OperationRegistry,
    params: Mutex<HashMap<OperationKind, BTreeMap<String, String>>>,
    last_seen: Mutex<Instant>,
}

impl WorkplaceSession {
    fn new(id: String, policy: SlotPolicy) -> Self {
        Self {
            id,
            csrf_token: Uuid::new_v4().to_string(),
            registry: OperationRegistry::new(policy),
            params: Mutex::new(HashMap::new()),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token every form posted by this session must carry back.
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn cached_params(&self, kind: OperationKind) -> BTreeMap<String, String> {
        lock_or_recover(&self.params, "Session parameters")
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn store_params(&self, kind: OperationKind, values: BTreeMap<String, String>) {
        lock_or_recover(&self.params, "Session parameters").insert(kind, values);
    }

    pub fn clear_params(&self, kind: OperationKind) {
        lock_or_recover(&self.params, "Session parameters").remove(&kind);
    }

    fn touch(&self) {
        *lock_or_recover(&self.last_seen, "Session clock") = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        lock_or_recover(&self.last_seen, "Session clock").elapsed()
    }

    fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.idle_for() > idle_timeout && !self.registry.has_live_operation()
    }
}

/// In-process session table keyed by the session cookie.
#[derive(Debug)]
pub struct WorkplaceSessionStore {
    sessions: RwLock<HashMap<String, Arc<WorkplaceSession>>>,
    idle_timeout: Duration,
    policy: SlotPolicy,
}

impl WorkplaceSessionStore {
    pub fn new(idle_timeout: Duration, policy: SlotPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            policy,
        }
    }

    pub fn from_config(config: &ValidatedConfig) -> Self {
        Self::new(config.sessions.idle_timeout(), config.operations.slot_policy)
    }

    pub fn create(&self) -> Arc<WorkplaceSession> {
        let session = Arc::new(WorkplaceSession::new(
            Uuid::new_v4().to_string(),
            self.policy,
        ));
        let mut sessions = write_or_recover(&self.sessions, "Session store");
        if sessions.len() >= MAX_SESSIONS {
            let before = sessions.len();
            sessions.retain(|_, existing| !existing.is_expired(self.idle_timeout));
            log::warn!(
                "Session table full; evicted {} idle sessions",
                before - sessions.len()
            );
        }
        sessions.insert(session.id().to_string(), session.clone());
        log::debug!("Created workplace session {}", session.id());
        session
    }

    /// Live session for `id`, refreshing its idle clock. Expired sessions are dropped.
    pub fn get(&self, id: &str) -> Option<Arc<WorkplaceSession>> {
        let session = read_or_recover(&self.sessions, "Session store")
            .get(id)
            .cloned()?;
        if session.is_expired(self.idle_timeout) {
            write_or_recover(&self.sessions, "Session store").remove(id);
            log::debug!("Expired workplace session {}", id);
            return None;
        }
        session.touch();
        Some(session)
    }

    /// Existing session for the cookie value, or a new one. The flag is true when created.
    pub fn resolve(&self, id: Option<&str>) -> (Arc<WorkplaceSession>, bool) {
        if let Some(id) = id
            && let Some(session) = self.get(id)
        {
            return (session, false);
        }
        (self.create(), true)
    }

    pub fn sweep_expired(&self) -> usize {
        let mut sessions = write_or_recover(&self.sessions, "Session store");
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.idle_timeout));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        read_or_recover(&self.sessions, "Session store").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
