use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use changelens_core::{Notification, TicketId, Version, sort_versions_by_recency};
use serde::Serialize;

use crate::{RequestCoalescer, TicketSource, VersionFetchError};

/// Per-ticket cache of version histories, most recent first.
///
/// One store is built per session and shared by reference. Concurrent
/// `get_versions` calls for the same ticket share a single backend fetch.
/// A `clear_cache` issued while a fetch is in flight keeps that fetch's
/// result out of the cache; the caller that started it still receives it.
pub struct VersionStore {
    source: Arc<dyn TicketSource>,
    state: Mutex<VersionCacheState>,
    inflight: RequestCoalescer<TicketId>,
}

#[derive(Default)]
struct VersionCacheState {
    entries: HashMap<TicketId, CachedHistory>,
    invalidated_at: HashMap<TicketId, u64>,
    cleared_all_at: u64,
    fetch_starts: BTreeMap<u64, usize>,
    clock: u64,
    next_sequence: u64,
}

struct CachedHistory {
    versions: Vec<Version>,
    generation: u64,
}

impl VersionCacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn begin_fetch(&mut self) -> u64 {
        *self.fetch_starts.entry(self.clock).or_default() += 1;
        self.clock
    }

    fn finish_fetch(&mut self, started: u64) {
        if let Some(count) = self.fetch_starts.get_mut(&started) {
            *count -= 1;
            if *count == 0 {
                self.fetch_starts.remove(&started);
            }
        }
        self.prune_invalidations();
    }

    /// Stamps no older than the oldest in-flight fetch are the only ones
    /// `invalidated_since` can still observe.
    fn prune_invalidations(&mut self) {
        match self.fetch_starts.keys().next().copied() {
            Some(oldest) => self.invalidated_at.retain(|_, stamp| *stamp > oldest),
            None => self.invalidated_at.clear(),
        }
    }

    fn invalidated_since(&self, ticket_id: TicketId, started: u64) -> bool {
        self.cleared_all_at > started
            || self
                .invalidated_at
                .get(&ticket_id)
                .is_some_and(|stamp| *stamp > started)
    }
}

/// Keeps a fetch's start stamp registered until the fetch ends, including
/// when the future is dropped mid-request.
struct FetchRegistration<'a> {
    store: &'a VersionStore,
    started: u64,
}

impl Drop for FetchRegistration<'_> {
    fn drop(&mut self) {
        self.store.lock_state().finish_fetch(self.started);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationDetails {
    pub notification: Notification,
    pub versions: Vec<Version>,
    pub has_history: bool,
    pub latest: Option<Version>,
    pub previous: Option<Version>,
}

impl VersionStore {
    pub fn new(source: Arc<dyn TicketSource>) -> Self {
        Self {
            source,
            state: Mutex::new(VersionCacheState::default()),
            inflight: RequestCoalescer::new(),
        }
    }

    pub async fn get_versions(
        &self,
        ticket_id: TicketId,
        force_refresh: bool,
    ) -> Result<Vec<Version>, VersionFetchError> {
        let observed_generation = {
            let state = self.lock_state();
            let cached = state.entries.get(&ticket_id);
            if !force_refresh && let Some(entry) = cached {
                tracing::debug!(ticket_id, "version cache hit");
                return Ok(entry.versions.clone());
            }
            cached.map(|entry| entry.generation)
        };

        let _inflight = self.inflight.acquire(&ticket_id).await;

        let registration = {
            let mut state = self.lock_state();
            if let Some(entry) = state.entries.get(&ticket_id)
                && (!force_refresh || Some(entry.generation) != observed_generation)
            {
                tracing::debug!(ticket_id, "reusing concurrently fetched versions");
                return Ok(entry.versions.clone());
            }
            FetchRegistration {
                store: self,
                started: state.begin_fetch(),
            }
        };
        let started = registration.started;

        tracing::info!(ticket_id, force_refresh, "fetching ticket versions");
        let mut versions = self
            .source
            .ticket_versions(ticket_id)
            .await
            .map_err(|source| VersionFetchError { ticket_id, source })?;

        let mut state = self.lock_state();
        let base = state.next_sequence;
        for (offset, version) in versions.iter_mut().enumerate() {
            version.sequence = base + offset as u64;
        }
        state.next_sequence = base + versions.len() as u64;
        sort_versions_by_recency(&mut versions);

        if state.invalidated_since(ticket_id, started) {
            tracing::debug!(
                ticket_id,
                "cache invalidated during fetch, result not cached"
            );
        } else {
            let generation = state.tick();
            state.entries.insert(
                ticket_id,
                CachedHistory {
                    versions: versions.clone(),
                    generation,
                },
            );
        }

        Ok(versions)
    }

    /// Cached history without touching the backend.
    pub fn cached_versions(&self, ticket_id: TicketId) -> Option<Vec<Version>> {
        self.lock_state()
            .entries
            .get(&ticket_id)
            .map(|entry| entry.versions.clone())
    }

    /// Drops one ticket's history, or every history when `ticket_id` is `None`.
    pub fn clear_cache(&self, ticket_id: Option<TicketId>) {
        let mut state = self.lock_state();
        let stamp = state.tick();
        match ticket_id {
            Some(ticket_id) => {
                state.entries.remove(&ticket_id);
                state.invalidated_at.insert(ticket_id, stamp);
            }
            None => {
                state.entries.clear();
                state.invalidated_at.clear();
                state.cleared_all_at = stamp;
            }
        }
        state.prune_invalidations();
    }

    /// Notification plus its history; fetch failures yield an empty history.
    pub async fn notification_details(&self, notification: &Notification) -> NotificationDetails {
        let versions = match self.get_versions(notification.ticket_id, false).await {
            Ok(versions) => versions,
            Err(err) => {
                tracing::warn!(error = %err, "notification details without history");
                Vec::new()
            }
        };

        NotificationDetails {
            notification: notification.clone(),
            has_history: !versions.is_empty(),
            latest: versions.first().cloned(),
            previous: versions.get(1).cloned(),
            versions,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, VersionCacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
