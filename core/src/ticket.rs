//! Ticket domain types.
//!
//! Identifiers, money, the ticket entity and its two state machines:
//! the admission status (`Valid`/`Used`/`Cancelled`/`Refunded`) and the
//! resale listing status (`None`/`Listed`/`Sold`/`Cancelled`).
//!
//! Transitions are methods on [`Ticket`]. Each one checks its precondition
//! first and only then mutates, so a rejected transition leaves the ticket
//! untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticket
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    /// Wraps an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a fresh random `TicketId` (UUID v4)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an event
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Wraps an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-facing ticket number (e.g. "TKT-2025-000142"), globally unique
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketNumber(String);

impl TicketNumber {
    /// Wraps an existing ticket number
    #[must_use]
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Returns the ticket number as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Staff member performing check-ins
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(String);

impl OperatorId {
    /// Wraps an existing operator identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Admission status of a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Sold and not yet scanned
    Valid,
    /// Scanned at the gate
    Used,
    /// Cancelled before use (terminal)
    Cancelled,
    /// Money returned to the buyer (terminal)
    Refunded,
}

impl TicketStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Parses the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "valid" => Some(Self::Valid),
            "used" => Some(Self::Used),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// `Cancelled` and `Refunded` admit nobody, ever again
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resale listing status of a ticket
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Never listed
    #[default]
    None,
    /// Currently offered for resale
    Listed,
    /// Resold to another buyer
    Sold,
    /// Listing withdrawn
    Cancelled,
}

impl ListingStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Listed => "listed",
            Self::Sold => "sold",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "listed" => Some(Self::Listed),
            "sold" => Some(Self::Sold),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Ticket entity
// ============================================================================

/// Errors raised by illegal state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Admission status does not allow the requested transition
    #[error("Cannot {action} a ticket with status {from}")]
    InvalidStatus {
        /// Attempted transition
        action: &'static str,
        /// Status at the time of the attempt
        from: TicketStatus,
    },

    /// Listing status does not allow the requested transition
    #[error("Cannot {action} a ticket with listing status {from}")]
    InvalidListing {
        /// Attempted transition
        action: &'static str,
        /// Listing status at the time of the attempt
        from: ListingStatus,
    },

    /// Resale price must be positive
    #[error("Listing price must be greater than zero")]
    ZeroListingPrice,
}

/// A sold ticket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket identifier
    pub id: TicketId,
    /// Event this ticket admits to
    pub event_id: EventId,
    /// Human-facing unique number, assigned once at sale time
    pub ticket_number: TicketNumber,
    /// Buyer account (if known)
    pub owner_id: Option<String>,
    /// Name printed on the ticket (if any)
    pub attendee_name: Option<String>,
    /// Amount paid at sale time
    pub price_paid: Money,
    /// ISO 4217 currency code of `price_paid`
    pub currency: String,
    /// Admission status
    pub status: TicketStatus,
    /// When the ticket was scanned (set iff `status == Used`)
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Who scanned the ticket (set together with `checked_in_at`)
    pub checked_in_by: Option<OperatorId>,
    /// Resale listing status
    pub listing_status: ListingStatus,
    /// Asking price (present iff `listing_status == Listed`)
    pub listing_price: Option<Money>,
    /// When the ticket was sold
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Creates a freshly sold, valid, unlisted ticket
    #[must_use]
    pub fn new(
        id: TicketId,
        event_id: EventId,
        ticket_number: TicketNumber,
        price_paid: Money,
        currency: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id,
            ticket_number,
            owner_id: None,
            attendee_name: None,
            price_paid,
            currency: currency.into(),
            status: TicketStatus::Valid,
            checked_in_at: None,
            checked_in_by: None,
            listing_status: ListingStatus::None,
            listing_price: None,
            created_at,
        }
    }

    /// Checks the data-model invariants
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let used = self.status == TicketStatus::Used;
        let listed = self.listing_status == ListingStatus::Listed;

        self.checked_in_at.is_some() == used
            && self.checked_in_by.is_some() == used
            && (!listed || self.status == TicketStatus::Valid)
            && self.listing_price.is_some() == listed
    }

    /// `Valid → Used`
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidStatus`] unless the ticket is `Valid`.
    pub fn check_in(&mut self, at: DateTime<Utc>, by: OperatorId) -> Result<(), TransitionError> {
        self.require_status("check in", &[TicketStatus::Valid])?;
        self.status = TicketStatus::Used;
        self.checked_in_at = Some(at);
        self.checked_in_by = Some(by);
        self.withdraw_listing();
        Ok(())
    }

    /// Back to `Valid` from anywhere; operator override
    pub fn undo_check_in(&mut self) {
        self.status = TicketStatus::Valid;
        self.checked_in_at = None;
        self.checked_in_by = None;
    }

    /// `Valid → Cancelled`
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidStatus`] unless the ticket is `Valid`.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.require_status("cancel", &[TicketStatus::Valid])?;
        self.status = TicketStatus::Cancelled;
        self.withdraw_listing();
        Ok(())
    }

    /// `Valid | Used → Refunded`
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidStatus`] if the ticket is already terminal.
    pub fn refund(&mut self) -> Result<(), TransitionError> {
        self.require_status("refund", &[TicketStatus::Valid, TicketStatus::Used])?;
        self.status = TicketStatus::Refunded;
        self.checked_in_at = None;
        self.checked_in_by = None;
        self.withdraw_listing();
        Ok(())
    }

    /// Offers the ticket for resale
    ///
    /// # Errors
    ///
    /// Fails if the ticket is not `Valid`, is already listed, or the price is zero.
    pub fn list(&mut self, price: Money) -> Result<(), TransitionError> {
        self.require_status("list", &[TicketStatus::Valid])?;
        if self.listing_status == ListingStatus::Listed {
            return Err(TransitionError::InvalidListing {
                action: "list",
                from: self.listing_status,
            });
        }
        if price.is_zero() {
            return Err(TransitionError::ZeroListingPrice);
        }
        self.listing_status = ListingStatus::Listed;
        self.listing_price = Some(price);
        Ok(())
    }

    /// Withdraws an active listing
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidListing`] unless the ticket is listed.
    pub fn unlist(&mut self) -> Result<(), TransitionError> {
        self.require_listed("unlist")?;
        self.withdraw_listing();
        Ok(())
    }

    /// Marks an active listing as resold
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidListing`] unless the ticket is listed.
    pub fn complete_sale(&mut self) -> Result<(), TransitionError> {
        self.require_listed("complete the sale of")?;
        self.listing_status = ListingStatus::Sold;
        self.listing_price = None;
        Ok(())
    }

    fn require_status(
        &self,
        action: &'static str,
        allowed: &[TicketStatus],
    ) -> Result<(), TransitionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(TransitionError::InvalidStatus {
                action,
                from: self.status,
            })
        }
    }

    fn require_listed(&self, action: &'static str) -> Result<(), TransitionError> {
        if self.listing_status == ListingStatus::Listed {
            Ok(())
        } else {
            Err(TransitionError::InvalidListing {
                action,
                from: self.listing_status,
            })
        }
    }

    fn withdraw_listing(&mut self) {
        if self.listing_status == ListingStatus::Listed {
            self.listing_status = ListingStatus::Cancelled;
            self.listing_price = None;
        }
    }
}
