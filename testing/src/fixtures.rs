//! Ticket fixtures.

#![allow(clippy::module_name_repetitions)]

use crate::mocks::test_clock;
use chrono::{DateTime, Utc};
use gatecheck_core::environment::Clock;
use gatecheck_core::ticket::{
    EventId, ListingStatus, Money, OperatorId, Ticket, TicketId, TicketNumber, TicketStatus,
};

/// Fluent builder for [`Ticket`] fixtures.
///
/// Defaults to a valid, unlisted ticket sold at [`test_clock`] time for
/// 25.00 USD, with a generated id and a number derived from it.
///
/// # Example
///
/// ```
/// use gatecheck_core::environment::Clock;
/// use gatecheck_core::ticket::TicketStatus;
/// use gatecheck_testing::{TicketBuilder, test_clock};
///
/// let ticket = TicketBuilder::new("gala")
///     .number("TKT-42")
///     .used_at(test_clock().now(), "door-1")
///     .build();
///
/// assert_eq!(ticket.status, TicketStatus::Used);
/// assert!(ticket.is_consistent());
/// ```
#[derive(Clone, Debug)]
pub struct TicketBuilder {
    ticket: Ticket,
}

impl TicketBuilder {
    /// Valid ticket for `event_id`
    #[must_use]
    pub fn new(event_id: impl Into<String>) -> Self {
        let id = TicketId::generate();
        let number: String = id.as_str().chars().take(8).collect();
        let ticket = Ticket::new(
            id,
            EventId::new(event_id),
            TicketNumber::new(format!("TKT-{}", number.to_uppercase())),
            Money::from_cents(2500),
            "USD",
            test_clock().now(),
        );
        Self { ticket }
    }

    /// Sets the ticket id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ticket.id = TicketId::new(id);
        self
    }

    /// Sets the ticket number
    #[must_use]
    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.ticket.ticket_number = TicketNumber::new(number);
        self
    }

    /// Sets the attendee name
    #[must_use]
    pub fn attendee(mut self, name: impl Into<String>) -> Self {
        self.ticket.attendee_name = Some(name.into());
        self
    }

    /// Sets the owner account
    #[must_use]
    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.ticket.owner_id = Some(owner_id.into());
        self
    }

    /// Sets the price paid
    #[must_use]
    pub fn price(mut self, cents: u64, currency: impl Into<String>) -> Self {
        self.ticket.price_paid = Money::from_cents(cents);
        self.ticket.currency = currency.into();
        self
    }

    /// Marks the ticket as scanned at `at` by `operator`
    #[must_use]
    pub fn used_at(mut self, at: DateTime<Utc>, operator: impl Into<String>) -> Self {
        self.ticket.status = TicketStatus::Used;
        self.ticket.checked_in_at = Some(at);
        self.ticket.checked_in_by = Some(OperatorId::new(operator));
        self.withdraw_listing()
    }

    /// Marks the ticket cancelled
    #[must_use]
    pub fn cancelled(mut self) -> Self {
        self.ticket.status = TicketStatus::Cancelled;
        self.clear_check_in().withdraw_listing()
    }

    /// Marks the ticket refunded
    #[must_use]
    pub fn refunded(mut self) -> Self {
        self.ticket.status = TicketStatus::Refunded;
        self.clear_check_in().withdraw_listing()
    }

    /// Lists the ticket for resale at `cents`
    #[must_use]
    pub fn listed(mut self, cents: u64) -> Self {
        self.ticket.listing_status = ListingStatus::Listed;
        self.ticket.listing_price = Some(Money::from_cents(cents));
        self
    }

    /// Finishes the fixture
    #[must_use]
    pub fn build(self) -> Ticket {
        self.ticket
    }

    fn clear_check_in(mut self) -> Self {
        self.ticket.checked_in_at = None;
        self.ticket.checked_in_by = None;
        self
    }

    fn withdraw_listing(mut self) -> Self {
        if self.ticket.listing_status == ListingStatus::Listed {
            self.ticket.listing_status = ListingStatus::Cancelled;
            self.ticket.listing_price = None;
        }
        self
    }
}
