use std::sync::{Mutex, MutexGuard, PoisonError};

use changelens_core::TicketId;

use crate::change_view::ChangeView;

/// Holder for the change view currently on screen.
///
/// In-flight work cannot be cancelled, so every load takes a ticket from
/// `begin` and may only publish while that ticket is still current. Closing
/// the view or starting another load turns older tickets stale, and their
/// results are dropped instead of written.
#[derive(Default)]
pub struct ViewSlot {
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    generation: u64,
    target: Option<TicketId>,
    current: Option<ChangeView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTicket {
    generation: u64,
    ticket_id: TicketId,
}

impl ViewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, ticket_id: TicketId) -> ViewTicket {
        let mut state = self.lock_state();
        state.generation += 1;
        state.target = Some(ticket_id);
        state.current = None;
        ViewTicket {
            generation: state.generation,
            ticket_id,
        }
    }

    /// Stores `view` if `ticket` is still the latest load; returns whether it
    /// was stored.
    pub fn publish(&self, ticket: ViewTicket, view: ChangeView) -> bool {
        let mut state = self.lock_state();
        if state.generation != ticket.generation || state.target != Some(ticket.ticket_id) {
            tracing::debug!(
                ticket_id = ticket.ticket_id,
                "discarding stale change view result"
            );
            return false;
        }
        state.current = Some(view);
        true
    }

    pub fn close(&self) {
        let mut state = self.lock_state();
        state.generation += 1;
        state.target = None;
        state.current = None;
    }

    pub fn current(&self) -> Option<ChangeView> {
        self.lock_state().current.clone()
    }

    pub fn is_open(&self) -> bool {
        self.lock_state().target.is_some()
    }

    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
