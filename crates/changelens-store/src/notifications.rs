use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use changelens_core::{Notification, TicketId};

use crate::{RequestCoalescer, StoreError, TicketSource};

const LATEST_KEY: &str = "latest";

/// Cache of the latest change notifications plus in-memory read state.
///
/// Read state is never sent to the backend. Every fetch, including
/// `get_notifications(true)`, replaces the list with the server payload and
/// so resets every entry to unread. Whether read state should instead survive
/// a refresh (for example by re-applying previously read ticket ids) is an
/// open product question; the reset is the current, tested behavior.
pub struct NotificationCache {
    source: Arc<dyn TicketSource>,
    state: Mutex<NotificationState>,
    inflight: RequestCoalescer<&'static str>,
}

#[derive(Default)]
struct NotificationState {
    latest: Option<CachedNotifications>,
    invalidated_at: u64,
    clock: u64,
}

struct CachedNotifications {
    items: Vec<Notification>,
    generation: u64,
}

impl NotificationCache {
    pub fn new(source: Arc<dyn TicketSource>) -> Self {
        Self {
            source,
            state: Mutex::new(NotificationState::default()),
            inflight: RequestCoalescer::new(),
        }
    }

    pub async fn get_notifications(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let observed_generation = {
            let state = self.lock_state();
            if !force_refresh && let Some(cached) = &state.latest {
                tracing::debug!(key = LATEST_KEY, "notification cache hit");
                return Ok(cached.items.clone());
            }
            state.latest.as_ref().map(|cached| cached.generation)
        };

        let _inflight = self.inflight.acquire(&LATEST_KEY).await;

        let started = {
            let state = self.lock_state();
            if let Some(cached) = &state.latest
                && (!force_refresh || Some(cached.generation) != observed_generation)
            {
                tracing::debug!(key = LATEST_KEY, "reusing concurrently fetched notifications");
                return Ok(cached.items.clone());
            }
            state.clock
        };

        tracing::info!(force_refresh, "fetching latest notifications");
        let items = self.source.latest_notifications().await.inspect_err(|err| {
            tracing::warn!(error = %err, "failed to fetch notifications");
        })?;
        let items = items
            .into_iter()
            .map(|notification| Notification {
                read: false,
                ..notification
            })
            .collect::<Vec<_>>();

        let mut state = self.lock_state();
        if state.invalidated_at > started {
            tracing::debug!("notification cache invalidated during fetch, result not cached");
        } else {
            state.clock += 1;
            let generation = state.clock;
            state.latest = Some(CachedNotifications {
                items: items.clone(),
                generation,
            });
        }

        Ok(items)
    }

    /// Marks every cached notification for `ticket_id` as read and returns
    /// how many entries flipped. Local only; see the type docs.
    pub fn mark_read(&self, ticket_id: TicketId) -> usize {
        let mut state = self.lock_state();
        let Some(cached) = state.latest.as_mut() else {
            return 0;
        };

        let mut flipped = 0;
        for notification in cached
            .items
            .iter_mut()
            .filter(|notification| notification.ticket_id == ticket_id && !notification.read)
        {
            notification.read = true;
            flipped += 1;
        }
        flipped
    }

    /// Unread entries in the cached list, computed on each call.
    pub fn unread_count(&self) -> usize {
        self.lock_state()
            .latest
            .as_ref()
            .map(|cached| {
                cached
                    .items
                    .iter()
                    .filter(|notification| !notification.read)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn cached_notifications(&self) -> Option<Vec<Notification>> {
        self.lock_state()
            .latest
            .as_ref()
            .map(|cached| cached.items.clone())
    }

    pub fn clear_cache(&self) {
        let mut state = self.lock_state();
        state.clock += 1;
        state.invalidated_at = state.clock;
        state.latest = None;
    }

    fn lock_state(&self) -> MutexGuard<'_, NotificationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
