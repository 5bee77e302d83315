//! Check-in orchestration.
//!
//! Resolves a scanned identifier to a ticket, validates it for the gate's
//! event and commits the `Valid → Used` transition through the store.
//!
//! # Flow
//!
//! ```text
//! identifier ──▶ lookup by id ──▶ lookup by number ──▶ NotFound
//!                     │                 │
//!                     └──────┬──────────┘
//!                            ▼
//!                  event matches gate? ──no──▶ WrongEvent
//!                            │
//!                        validate()  ──not valid──▶ AlreadyUsed / EventPassed /
//!                            │                      Cancelled / Refunded
//!                            │
//!              compare_and_set_used() ──false──▶ AlreadyUsed (another device won)
//!                            │
//!                         admitted
//! ```
//!
//! Rejections are typed values for the check-in screen. Only store failures
//! are meant to be retried.

use crate::environment::Clock;
use crate::nfc::{PayloadCodec, TicketNfcPayload};
use crate::store::{StoreError, TicketStore};
use crate::ticket::{EventId, OperatorId, Ticket, TicketId, TicketNumber};
use crate::validation::{ValidationOutcome, admission_cutoff, validate};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// A check-in point bound to one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventGate {
    /// Event admitted at this gate
    pub event_id: EventId,
    /// Scheduled start; `None` disables the post-event cutoff
    pub event_date: Option<DateTime<Utc>>,
}

impl EventGate {
    /// Creates a gate for `event_id`
    #[must_use]
    pub const fn new(event_id: EventId, event_date: Option<DateTime<Utc>>) -> Self {
        Self {
            event_id,
            event_date,
        }
    }
}

/// Where a check-in attempt came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanSource {
    /// QR code contents
    Qr,
    /// NFC ticket payload
    Nfc,
    /// Identifier typed or passed in directly
    Manual,
}

impl ScanSource {
    /// Metric label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Nfc => "nfc",
            Self::Manual => "manual",
        }
    }
}

/// Why a ticket was not admitted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckInFailure {
    /// No ticket matches the identifier
    #[error("Ticket not found")]
    NotFound,

    /// Ticket belongs to another event
    #[error("Ticket is for event {actual}, not {expected}")]
    WrongEvent {
        /// Event of this gate
        expected: EventId,
        /// Event on the ticket
        actual: EventId,
    },

    /// Ticket was already scanned
    #[error("Ticket already used")]
    AlreadyUsed {
        /// When it was scanned, if known
        checked_in_at: Option<DateTime<Utc>>,
    },

    /// The grace period after the event is over
    #[error("Admission closed at {cutoff}")]
    EventPassed {
        /// Last admissible instant
        cutoff: DateTime<Utc>,
    },

    /// Ticket was cancelled
    #[error("Ticket was cancelled")]
    Cancelled,

    /// Ticket was refunded
    #[error("Ticket was refunded")]
    Refunded,
}

impl CheckInFailure {
    /// Stable machine-readable reason
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::WrongEvent { .. } => "wrong_event",
            Self::AlreadyUsed { .. } => "already_used",
            Self::EventPassed { .. } => "event_passed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

/// Errors returned by [`CheckInService`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckInError {
    /// The ticket was not admitted
    #[error(transparent)]
    Rejected(#[from] CheckInFailure),

    /// The store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckInError {
    /// The rejection reason, if the ticket was rejected
    #[must_use]
    pub const fn failure(&self) -> Option<&CheckInFailure> {
        match self {
            Self::Rejected(failure) => Some(failure),
            Self::Store(_) => None,
        }
    }

    /// Whether retrying the same check-in may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Rejected(_) => false,
            Self::Store(error) => error.is_retryable(),
        }
    }

    const fn outcome(&self) -> &'static str {
        match self {
            Self::Rejected(failure) => failure.reason(),
            Self::Store(_) => "store_error",
        }
    }
}

/// Check-in orchestrator.
///
/// All collaborators are supplied at construction.
#[derive(Clone)]
pub struct CheckInService {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    codec: PayloadCodec,
}

impl CheckInService {
    /// Creates a new `CheckInService`
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>, codec: PayloadCodec) -> Self {
        Self {
            store,
            clock,
            codec,
        }
    }

    /// Checks in the ticket identified by `identifier` (ticket id or number).
    ///
    /// # Errors
    ///
    /// Returns [`CheckInError::Rejected`] when the ticket may not enter, or
    /// [`CheckInError::Store`] when the store fails.
    #[tracing::instrument(
        skip(self, gate),
        fields(event_id = %gate.event_id, operator = %operator)
    )]
    pub async fn check_in(
        &self,
        identifier: &str,
        gate: &EventGate,
        operator: &OperatorId,
    ) -> Result<Ticket, CheckInError> {
        let result = self.check_in_identifier(identifier, gate, operator).await;
        Self::record(ScanSource::Manual, &result);
        result
    }

    /// Checks in the ticket described by an NFC payload.
    ///
    /// The payload's event is checked before any lookup, and the stored
    /// ticket number must match the payload's.
    ///
    /// # Errors
    ///
    /// Same as [`CheckInService::check_in`].
    #[tracing::instrument(
        skip(self, payload, gate),
        fields(ticket_id = %payload.ticket_id, event_id = %gate.event_id, operator = %operator)
    )]
    pub async fn check_in_payload(
        &self,
        payload: &TicketNfcPayload,
        gate: &EventGate,
        operator: &OperatorId,
    ) -> Result<Ticket, CheckInError> {
        let result = self.check_in_nfc(payload, gate, operator).await;
        Self::record(ScanSource::Nfc, &result);
        result
    }

    /// Checks in whatever a scanner produced.
    ///
    /// NFC scan links go through [`CheckInService::check_in_payload`];
    /// anything else is reduced with [`crate::qr::extract`].
    ///
    /// # Errors
    ///
    /// Same as [`CheckInService::check_in`].
    pub async fn check_in_scan(
        &self,
        raw: &str,
        gate: &EventGate,
        operator: &OperatorId,
    ) -> Result<Ticket, CheckInError> {
        if let Some(payload) = self.codec.decode_scan_link(raw.trim()) {
            return self.check_in_payload(&payload, gate, operator).await;
        }

        let identifier = crate::qr::extract(raw);
        let result = self.check_in_identifier(&identifier, gate, operator).await;
        Self::record(ScanSource::Qr, &result);
        result
    }

    /// Reverts a check-in regardless of the ticket's current status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown ticket, or any other
    /// store failure.
    #[tracing::instrument(skip(self))]
    pub async fn undo_check_in(&self, ticket_id: &TicketId) -> Result<Ticket, StoreError> {
        let ticket = self.store.reset_to_valid(ticket_id).await?;
        crate::metrics::record_undo();
        tracing::info!(ticket_number = %ticket.ticket_number, "Check-in undone");
        Ok(ticket)
    }

    async fn check_in_identifier(
        &self,
        identifier: &str,
        gate: &EventGate,
        operator: &OperatorId,
    ) -> Result<Ticket, CheckInError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(CheckInFailure::NotFound.into());
        }

        let ticket = self
            .resolve(identifier)
            .await?
            .ok_or(CheckInFailure::NotFound)?;
        self.admit(ticket, gate, operator).await
    }

    async fn check_in_nfc(
        &self,
        payload: &TicketNfcPayload,
        gate: &EventGate,
        operator: &OperatorId,
    ) -> Result<Ticket, CheckInError> {
        if payload.event_id != gate.event_id.as_str() {
            return Err(CheckInFailure::WrongEvent {
                expected: gate.event_id.clone(),
                actual: EventId::new(payload.event_id.clone()),
            }
            .into());
        }

        let ticket = self
            .store
            .lookup_by_id(&TicketId::new(payload.ticket_id.clone()))
            .await?
            .filter(|ticket| ticket.ticket_number.as_str() == payload.ticket_number)
            .ok_or(CheckInFailure::NotFound)?;
        self.admit(ticket, gate, operator).await
    }

    async fn resolve(&self, identifier: &str) -> Result<Option<Ticket>, StoreError> {
        if let Some(ticket) = self.store.lookup_by_id(&TicketId::new(identifier)).await? {
            return Ok(Some(ticket));
        }
        self.store
            .lookup_by_number(&TicketNumber::new(identifier))
            .await
    }

    async fn admit(
        &self,
        ticket: Ticket,
        gate: &EventGate,
        operator: &OperatorId,
    ) -> Result<Ticket, CheckInError> {
        if ticket.event_id != gate.event_id {
            return Err(CheckInFailure::WrongEvent {
                expected: gate.event_id.clone(),
                actual: ticket.event_id,
            }
            .into());
        }

        let now = self.clock.now();
        let failure = match validate(&ticket, gate.event_date, now) {
            ValidationOutcome::Valid => None,
            ValidationOutcome::AlreadyUsed => Some(CheckInFailure::AlreadyUsed {
                checked_in_at: ticket.checked_in_at,
            }),
            ValidationOutcome::EventPassed => Some(CheckInFailure::EventPassed {
                cutoff: gate.event_date.map_or(now, admission_cutoff),
            }),
            ValidationOutcome::Cancelled => Some(CheckInFailure::Cancelled),
            ValidationOutcome::Refunded => Some(CheckInFailure::Refunded),
        };
        if let Some(failure) = failure {
            return Err(failure.into());
        }

        if !self
            .store
            .compare_and_set_used(&ticket.id, operator, now)
            .await?
        {
            tracing::info!(ticket_id = %ticket.id, "Lost check-in race to another device");
            return Err(CheckInFailure::AlreadyUsed {
                checked_in_at: None,
            }
            .into());
        }

        let mut admitted = ticket;
        admitted
            .check_in(now, operator.clone())
            .map_err(|_| CheckInFailure::AlreadyUsed {
                checked_in_at: None,
            })?;
        Ok(admitted)
    }

    fn record(source: ScanSource, result: &Result<Ticket, CheckInError>) {
        match result {
            Ok(ticket) => {
                tracing::info!(
                    source = source.as_str(),
                    ticket_id = %ticket.id,
                    ticket_number = %ticket.ticket_number,
                    "Ticket admitted"
                );
                crate::metrics::record_check_in(source.as_str(), "admitted");
            }
            Err(CheckInError::Store(error)) => {
                tracing::warn!(source = source.as_str(), error = %error, "Check-in failed");
                crate::metrics::record_check_in(source.as_str(), "store_error");
            }
            Err(error) => {
                tracing::info!(
                    source = source.as_str(),
                    reason = error.outcome(),
                    "Ticket rejected"
                );
                crate::metrics::record_check_in(source.as_str(), error.outcome());
            }
        }
    }
}

impl std::fmt::Debug for CheckInService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckInService")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons_are_stable() {
        assert_eq!(CheckInFailure::NotFound.reason(), "not_found");
        assert_eq!(
            CheckInFailure::AlreadyUsed {
                checked_in_at: None
            }
            .reason(),
            "already_used"
        );
        assert_eq!(CheckInFailure::Refunded.reason(), "refunded");
    }

    #[test]
    fn metric_labels_name_the_scan_source() {
        assert_eq!(ScanSource::Qr.as_str(), "qr");
        assert_eq!(ScanSource::Nfc.as_str(), "nfc");
        assert_eq!(ScanSource::Manual.as_str(), "manual");
    }

    #[test]
    fn only_store_outages_are_retryable() {
        let rejected = CheckInError::from(CheckInFailure::Cancelled);
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.failure(), Some(&CheckInFailure::Cancelled));

        let outage = CheckInError::from(StoreError::Unavailable("connection reset".into()));
        assert!(outage.is_retryable());
        assert!(outage.failure().is_none());
    }

    #[test]
    fn wrong_event_message_names_both_events() {
        let failure = CheckInFailure::WrongEvent {
            expected: EventId::new("gala"),
            actual: EventId::new("matinee"),
        };
        assert_eq!(failure.to_string(), "Ticket is for event matinee, not gala");
    }
}
