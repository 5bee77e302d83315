//! # Gatecheck Testing
//!
//! Test doubles and fixtures for gatecheck.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic time
//! - [`InMemoryTicketStore`]: `HashMap`-backed [`TicketStore`] with outage injection
//! - [`MockNfcPlatform`]: scriptable NFC bindings driven through a [`MockNfcHandle`]
//! - [`TicketBuilder`]: concise ticket fixtures
//!
//! ## Example
//!
//! ```
//! use gatecheck_core::checkin::{CheckInService, EventGate};
//! use gatecheck_core::nfc::PayloadCodec;
//! use gatecheck_core::ticket::{EventId, OperatorId};
//! use gatecheck_testing::{InMemoryTicketStore, TicketBuilder, test_clock};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryTicketStore::new());
//! store.insert(TicketBuilder::new("gala").number("TKT-1").build())?;
//!
//! let service = CheckInService::new(store, Arc::new(test_clock()), PayloadCodec::default());
//! let gate = EventGate::new(EventId::new("gala"), None);
//! let ticket = service.check_in("TKT-1", &gate, &OperatorId::new("door-1")).await?;
//! assert!(ticket.checked_in_at.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! [`TicketStore`]: gatecheck_core::store::TicketStore

mod fixtures;
mod nfc_mocks;
mod store_mocks;

use chrono::{DateTime, Utc};
use gatecheck_core::environment::Clock;

/// Mock implementations of injected dependencies
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    pub use crate::nfc_mocks::{MockNfcHandle, MockNfcPlatform};
    pub use crate::store_mocks::InMemoryTicketStore;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use gatecheck_testing::mocks::FixedClock;
    /// use gatecheck_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use fixtures::TicketBuilder;
pub use mocks::{
    FixedClock, InMemoryTicketStore, MockNfcHandle, MockNfcPlatform, test_clock,
};
