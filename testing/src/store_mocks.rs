//! In-memory ticket store.

use chrono::{DateTime, Utc};
use gatecheck_core::store::{StoreError, StoreFuture, TicketStore};
use gatecheck_core::ticket::{OperatorId, Ticket, TicketId, TicketNumber};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// `HashMap`-backed [`TicketStore`].
///
/// The compare-and-set runs under a single lock, so concurrent check-ins of
/// one ticket admit exactly one caller, as with the database adapter. The
/// store can be switched offline to exercise outage handling.
///
/// # Example
///
/// ```
/// use gatecheck_testing::{InMemoryTicketStore, TicketBuilder};
///
/// let store = InMemoryTicketStore::new();
/// let ticket = TicketBuilder::new("gala").build();
/// store.insert(ticket.clone()).unwrap();
///
/// assert_eq!(store.get(&ticket.id), Some(ticket));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: Mutex<HashMap<TicketId, Ticket>>,
    unavailable: AtomicBool,
}

impl InMemoryTicketStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `tickets`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTicketNumber`] if two tickets share a number.
    pub fn with_tickets(tickets: impl IntoIterator<Item = Ticket>) -> Result<Self, StoreError> {
        let store = Self::new();
        for ticket in tickets {
            store.insert(ticket)?;
        }
        Ok(store)
    }

    /// Insert a ticket, replacing any ticket with the same id
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTicketNumber`] if another ticket already
    /// uses this number.
    pub fn insert(&self, ticket: Ticket) -> Result<(), StoreError> {
        let mut tickets = self.lock()?;
        let clash = tickets
            .values()
            .any(|other| other.ticket_number == ticket.ticket_number && other.id != ticket.id);
        if clash {
            return Err(StoreError::DuplicateTicketNumber(ticket.ticket_number));
        }
        tickets.insert(ticket.id.clone(), ticket);
        Ok(())
    }

    /// Current state of a ticket, bypassing the outage switch
    #[must_use]
    pub fn get(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets
            .lock()
            .ok()
            .and_then(|tickets| tickets.get(id).cloned())
    }

    /// Apply `change` to a stored ticket, as another flow (refunds, resale)
    /// writing the same table would.
    ///
    /// Returns `None` if the ticket does not exist.
    pub fn modify<T>(&self, id: &TicketId, change: impl FnOnce(&mut Ticket) -> T) -> Option<T> {
        let mut tickets = self.tickets.lock().ok()?;
        tickets.get_mut(id).map(change)
    }

    /// Number of stored tickets
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.lock().map_or(0, |tickets| tickets.len())
    }

    /// Whether the store holds no tickets
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every trait operation fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<TicketId, Ticket>>, StoreError> {
        self.tickets
            .lock()
            .map_err(|_| StoreError::Unavailable("ticket map lock poisoned".to_string()))
    }

    fn online(&self) -> Result<MutexGuard<'_, HashMap<TicketId, Ticket>>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        self.lock()
    }
}

impl TicketStore for InMemoryTicketStore {
    fn lookup_by_id<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Option<Ticket>> {
        Box::pin(async move { Ok(self.online()?.get(id).cloned()) })
    }

    fn lookup_by_number<'a>(
        &'a self,
        number: &'a TicketNumber,
    ) -> StoreFuture<'a, Option<Ticket>> {
        Box::pin(async move {
            Ok(self
                .online()?
                .values()
                .find(|ticket| &ticket.ticket_number == number)
                .cloned())
        })
    }

    fn compare_and_set_used<'a>(
        &'a self,
        ticket_id: &'a TicketId,
        operator: &'a OperatorId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tickets = self.online()?;
            let updated = tickets
                .get_mut(ticket_id)
                .is_some_and(|ticket| ticket.check_in(now, operator.clone()).is_ok());
            tracing::trace!(ticket_id = %ticket_id, updated, "In-memory compare-and-set");
            Ok(updated)
        })
    }

    fn reset_to_valid<'a>(&'a self, ticket_id: &'a TicketId) -> StoreFuture<'a, Ticket> {
        Box::pin(async move {
            let mut tickets = self.online()?;
            let ticket = tickets
                .get_mut(ticket_id)
                .ok_or_else(|| StoreError::NotFound(ticket_id.clone()))?;
            ticket.undo_check_in();
            Ok(ticket.clone())
        })
    }
}
