//! Ticket store abstraction.
//!
//! The orchestrator only needs four operations from persistence. Everything
//! else (sales, refunds, listings) belongs to other flows writing the same
//! table.
//!
//! # Implementations
//!
//! - `PostgresTicketStore` (in `gatecheck-postgres`): production
//! - `InMemoryTicketStore` (in `gatecheck-testing`): tests and demo mode

use crate::ticket::{OperatorId, Ticket, TicketId, TicketNumber};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`TicketStore`] methods
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during ticket store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached; the caller may retry.
    #[error("Ticket store unavailable: {0}")]
    Unavailable(String),

    /// No ticket with this id exists.
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),

    /// A ticket with this number already exists.
    #[error("Duplicate ticket number: {0}")]
    DuplicateTicketNumber(TicketNumber),

    /// A stored row could not be turned into a [`Ticket`].
    #[error("Corrupt ticket record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Persistence port used by the check-in orchestrator.
///
/// Lookups are not scoped by event, so the orchestrator can tell a ticket
/// for another event apart from an unknown one.
///
/// # Dyn Compatibility
///
/// Methods return explicit `Pin<Box<dyn Future>>` so the store can be shared
/// as `Arc<dyn TicketStore>`.
pub trait TicketStore: Send + Sync {
    /// Finds a ticket by its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store cannot be queried.
    fn lookup_by_id<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Option<Ticket>>;

    /// Finds a ticket by its human-facing number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store cannot be queried.
    fn lookup_by_number<'a>(&'a self, number: &'a TicketNumber)
    -> StoreFuture<'a, Option<Ticket>>;

    /// Marks a ticket used, but only if it is still `Valid`.
    ///
    /// Equivalent to
    /// `UPDATE tickets SET status = 'used', ... WHERE id = ? AND status = 'valid'`.
    /// Returns `false` when no row matched: another device won the race, or
    /// the ticket left `Valid` since it was read.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the update could not be issued.
    fn compare_and_set_used<'a>(
        &'a self,
        ticket_id: &'a TicketId,
        operator: &'a OperatorId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, bool>;

    /// Unconditionally resets a ticket to `Valid` and clears its check-in fields.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the ticket does not exist, or
    /// [`StoreError::Unavailable`] if the store cannot be reached.
    fn reset_to_valid<'a>(&'a self, ticket_id: &'a TicketId) -> StoreFuture<'a, Ticket>;
}
