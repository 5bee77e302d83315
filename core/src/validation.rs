//! Time-aware admission rule.
//!
//! Status-derived outcomes always win over the time window: a used ticket is
//! reported as used even long after the event, never as "event passed".

use crate::ticket::{Ticket, TicketStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long after the event date a valid ticket still admits.
pub const GRACE_PERIOD: Duration = Duration::hours(6);

/// Result of validating a ticket for admission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    /// Ticket may be admitted
    Valid,
    /// Ticket was already scanned
    AlreadyUsed,
    /// Grace period after the event is over
    EventPassed,
    /// Ticket was cancelled
    Cancelled,
    /// Ticket was refunded
    Refunded,
}

impl ValidationOutcome {
    /// Whether the ticket may be admitted
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Last instant at which a valid ticket for an event dated `event_date` admits.
#[must_use]
pub fn admission_cutoff(event_date: DateTime<Utc>) -> DateTime<Utc> {
    event_date + GRACE_PERIOD
}

/// Validates a ticket for admission at `now`.
///
/// Without an `event_date` the time rule is skipped.
#[must_use]
pub fn validate(
    ticket: &Ticket,
    event_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ValidationOutcome {
    match ticket.status {
        TicketStatus::Used => ValidationOutcome::AlreadyUsed,
        TicketStatus::Cancelled => ValidationOutcome::Cancelled,
        TicketStatus::Refunded => ValidationOutcome::Refunded,
        TicketStatus::Valid => match event_date {
            Some(date) if now > admission_cutoff(date) => ValidationOutcome::EventPassed,
            _ => ValidationOutcome::Valid,
        },
    }
}
