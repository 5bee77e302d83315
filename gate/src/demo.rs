//! Demo ticket inventory for running the gate without a database.

use chrono::Duration;
use gatecheck_core::environment::Clock;
use gatecheck_core::store::StoreError;
use gatecheck_testing::{InMemoryTicketStore, TicketBuilder, test_clock};

/// In-memory store seeded with one ticket per interesting case for `event_id`.
///
/// | Id | Number | State |
/// |---|---|---|
/// | `demo-1` | `TKT-0001` | valid |
/// | `demo-2` | `TKT-0002` | valid, listed for resale |
/// | `demo-3` | `TKT-0003` | already checked in |
/// | `demo-4` | `TKT-0004` | cancelled |
/// | `demo-5` | `TKT-0005` | refunded |
/// | `demo-6` | `TKT-0006` | valid, for another event |
///
/// # Errors
///
/// Returns [`StoreError`] if seeding fails.
pub fn demo_store(event_id: &str) -> Result<InMemoryTicketStore, StoreError> {
    let scanned_at = test_clock().now() + Duration::hours(1);

    InMemoryTicketStore::with_tickets([
        TicketBuilder::new(event_id)
            .id("demo-1")
            .number("TKT-0001")
            .attendee("Ada Lovelace")
            .build(),
        TicketBuilder::new(event_id)
            .id("demo-2")
            .number("TKT-0002")
            .listed(4000)
            .build(),
        TicketBuilder::new(event_id)
            .id("demo-3")
            .number("TKT-0003")
            .used_at(scanned_at, "door-2")
            .build(),
        TicketBuilder::new(event_id)
            .id("demo-4")
            .number("TKT-0004")
            .cancelled()
            .build(),
        TicketBuilder::new(event_id)
            .id("demo-5")
            .number("TKT-0005")
            .refunded()
            .build(),
        TicketBuilder::new(format!("{event_id}-matinee"))
            .id("demo-6")
            .number("TKT-0006")
            .build(),
    ])
}
