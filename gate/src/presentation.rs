//! Presentation adapter: maps domain values to what the gate screen shows.

use gatecheck_core::checkin::{CheckInError, CheckInFailure};
use gatecheck_core::ticket::{Ticket, TicketStatus};

/// Colour family of a badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Admissible
    Success,
    /// Already handled
    Neutral,
    /// Money went back
    Warning,
    /// Void
    Danger,
}

/// Label, tone and icon for a ticket status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    /// Text shown on the badge
    pub label: &'static str,
    /// Colour family
    pub tone: Tone,
    /// Icon name
    pub icon: &'static str,
}

/// Badge for `status`
#[must_use]
pub const fn status_badge(status: TicketStatus) -> StatusBadge {
    match status {
        TicketStatus::Valid => StatusBadge {
            label: "Valid",
            tone: Tone::Success,
            icon: "check-circle",
        },
        TicketStatus::Used => StatusBadge {
            label: "Checked in",
            tone: Tone::Neutral,
            icon: "check-double",
        },
        TicketStatus::Cancelled => StatusBadge {
            label: "Cancelled",
            tone: Tone::Danger,
            icon: "x-circle",
        },
        TicketStatus::Refunded => StatusBadge {
            label: "Refunded",
            tone: Tone::Warning,
            icon: "rotate-ccw",
        },
    }
}

/// Operator-facing message for a rejection
#[must_use]
pub fn failure_message(failure: &CheckInFailure) -> String {
    match failure {
        CheckInFailure::NotFound => "Ticket not found".to_string(),
        CheckInFailure::WrongEvent { actual, .. } => {
            format!("Ticket is for a different event ({actual})")
        }
        CheckInFailure::AlreadyUsed {
            checked_in_at: Some(at),
        } => format!("Already checked in at {}", at.format("%H:%M UTC")),
        CheckInFailure::AlreadyUsed {
            checked_in_at: None,
        } => "Already checked in".to_string(),
        CheckInFailure::EventPassed { cutoff } => {
            format!("Admission closed at {}", cutoff.format("%Y-%m-%d %H:%M UTC"))
        }
        CheckInFailure::Cancelled => "Ticket was cancelled".to_string(),
        CheckInFailure::Refunded => "Ticket was refunded".to_string(),
    }
}

/// One-line summary of a ticket
#[must_use]
pub fn render_ticket(ticket: &Ticket) -> String {
    let badge = status_badge(ticket.status);
    match &ticket.attendee_name {
        Some(name) => format!("[{}] {} ({name})", badge.label, ticket.ticket_number),
        None => format!("[{}] {}", badge.label, ticket.ticket_number),
    }
}

/// One-line result of a check-in attempt
#[must_use]
pub fn render_outcome(outcome: &Result<Ticket, CheckInError>) -> String {
    match outcome {
        Ok(ticket) => format!("ADMIT {}", render_ticket(ticket)),
        Err(CheckInError::Rejected(failure)) => format!("REJECT {}", failure_message(failure)),
        Err(CheckInError::Store(error)) if error.is_retryable() => {
            "RETRY Ticket server unreachable, scan again".to_string()
        }
        Err(CheckInError::Store(error)) => format!("ERROR {error}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gatecheck_core::store::StoreError;
    use gatecheck_core::ticket::EventId;
    use gatecheck_testing::TicketBuilder;

    #[test]
    fn every_status_has_a_distinct_badge() {
        let badges = [
            TicketStatus::Valid,
            TicketStatus::Used,
            TicketStatus::Cancelled,
            TicketStatus::Refunded,
        ]
        .map(status_badge);

        for (i, a) in badges.iter().enumerate() {
            for b in &badges[i + 1..] {
                assert_ne!(a.label, b.label);
                assert_ne!(a.icon, b.icon);
            }
        }
        assert_eq!(badges[0].tone, Tone::Success);
    }

    #[test]
    fn already_used_shows_time_when_known() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 19, 42, 0).unwrap();
        let message = failure_message(&CheckInFailure::AlreadyUsed {
            checked_in_at: Some(at),
        });
        assert_eq!(message, "Already checked in at 19:42 UTC");
    }

    #[test]
    fn renders_admitted_ticket() {
        let ticket = TicketBuilder::new("gala")
            .number("TKT-7")
            .attendee("Grace Hopper")
            .build();
        assert_eq!(
            render_outcome(&Ok(ticket)),
            "ADMIT [Valid] TKT-7 (Grace Hopper)"
        );
    }

    #[test]
    fn renders_errors() {
        let wrong_event = CheckInError::from(CheckInFailure::WrongEvent {
            expected: EventId::new("gala"),
            actual: EventId::new("matinee"),
        });
        assert_eq!(
            render_outcome(&Err(wrong_event)),
            "REJECT Ticket is for a different event (matinee)"
        );

        let outage = CheckInError::from(StoreError::Unavailable("timeout".into()));
        assert!(render_outcome(&Err(outage)).starts_with("RETRY"));
    }
}
