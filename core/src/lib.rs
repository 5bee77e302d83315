//! # Gatecheck Core
//!
//! Ticket model, scan decoding, NFC sessions and check-in orchestration.
//!
//! ## Core Concepts
//!
//! - **Ticket**: an admission right with a status lifecycle (`Valid → Used`)
//! - **Validation**: pure admissibility check against the event date
//! - **Scan decoding**: QR contents and NFC scan links reduced to an identifier
//! - **NFC sessions**: read and broadcast sessions over device bindings
//! - **Check-in**: lookup, validate and an atomic `Valid → Used` update
//!
//! ## Example
//!
//! ```ignore
//! use gatecheck_core::checkin::{CheckInService, EventGate};
//!
//! let service = CheckInService::new(store, Arc::new(SystemClock), PayloadCodec::default());
//! let gate = EventGate::new(EventId::new("gala"), Some(event_date));
//!
//! match service.check_in_scan(scanned, &gate, &operator).await {
//!     Ok(ticket) => println!("Welcome {}", ticket.ticket_number),
//!     Err(error) => println!("Rejected: {error}"),
//! }
//! ```
//!
//! Persistence lives behind [`store::TicketStore`]; see `gatecheck-postgres`
//! for the production adapter and `gatecheck-testing` for in-memory doubles.

pub mod checkin;
pub mod environment;
pub mod metrics;
pub mod nfc;
pub mod qr;
pub mod store;
pub mod ticket;
pub mod validation;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub use checkin::{CheckInError, CheckInFailure, CheckInService, EventGate, ScanSource};
pub use environment::{Clock, SystemClock};
pub use store::{StoreError, StoreFuture, TicketStore};
pub use ticket::{
    EventId, ListingStatus, Money, OperatorId, Ticket, TicketId, TicketNumber, TicketStatus,
    TransitionError,
};
pub use validation::{GRACE_PERIOD, ValidationOutcome, admission_cutoff, validate};
