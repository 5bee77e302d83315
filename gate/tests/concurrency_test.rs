//! Concurrent check-ins of one ticket from several gate devices.
//!
//! Run with: `cargo test -p gatecheck-gate --test concurrency_test`

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use gatecheck_core::checkin::{CheckInError, CheckInFailure, CheckInService, EventGate};
use gatecheck_core::environment::Clock;
use gatecheck_core::nfc::PayloadCodec;
use gatecheck_core::store::{StoreFuture, TicketStore};
use gatecheck_core::ticket::{EventId, OperatorId, Ticket, TicketId, TicketNumber, TicketStatus};
use gatecheck_testing::{InMemoryTicketStore, TicketBuilder, test_clock};
use std::sync::Arc;

const EVENT: &str = "gala-2025";

/// Serves lookups from a snapshot taken before another device committed.
struct StaleReadStore {
    inner: InMemoryTicketStore,
    snapshot: Ticket,
}

impl TicketStore for StaleReadStore {
    fn lookup_by_id<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Option<Ticket>> {
        let stale = (id == &self.snapshot.id).then(|| self.snapshot.clone());
        Box::pin(async move { Ok(stale) })
    }

    fn lookup_by_number<'a>(
        &'a self,
        number: &'a TicketNumber,
    ) -> StoreFuture<'a, Option<Ticket>> {
        let stale = (number == &self.snapshot.ticket_number).then(|| self.snapshot.clone());
        Box::pin(async move { Ok(stale) })
    }

    fn compare_and_set_used<'a>(
        &'a self,
        ticket_id: &'a TicketId,
        operator: &'a OperatorId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, bool> {
        self.inner.compare_and_set_used(ticket_id, operator, now)
    }

    fn reset_to_valid<'a>(&'a self, ticket_id: &'a TicketId) -> StoreFuture<'a, Ticket> {
        self.inner.reset_to_valid(ticket_id)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_check_ins_admit_exactly_one() {
    let ticket = TicketBuilder::new(EVENT).id("t-1").build();
    let store = Arc::new(InMemoryTicketStore::with_tickets([ticket]).unwrap());
    let service = CheckInService::new(
        Arc::clone(&store) as Arc<dyn TicketStore>,
        Arc::new(test_clock()),
        PayloadCodec::default(),
    );
    let gate = EventGate::new(EventId::new(EVENT), None);

    let mut handles = Vec::new();
    for device in 0..16 {
        let service = service.clone();
        let gate = gate.clone();
        handles.push(tokio::spawn(async move {
            let operator = OperatorId::new(format!("door-{device}"));
            service.check_in("t-1", &gate, &operator).await
        }));
    }

    let mut admitted = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(ticket) => admitted.push(ticket),
            Err(error) => assert!(
                matches!(
                    error,
                    CheckInError::Rejected(CheckInFailure::AlreadyUsed { .. })
                ),
                "unexpected error: {error:?}"
            ),
        }
    }

    assert_eq!(admitted.len(), 1, "Exactly one device should admit the ticket");
    let stored = store.get(&TicketId::new("t-1")).unwrap();
    assert_eq!(stored.status, TicketStatus::Used);
    assert_eq!(stored.checked_in_by, admitted[0].checked_in_by);
}

#[tokio::test]
async fn stale_read_loses_to_committed_check_in() {
    let ticket = TicketBuilder::new(EVENT).id("t-1").build();
    let inner = InMemoryTicketStore::with_tickets([ticket.clone()]).unwrap();

    // Another device commits after our lookup snapshot was taken
    let committed_at = test_clock().now();
    inner
        .compare_and_set_used(&ticket.id, &OperatorId::new("door-2"), committed_at)
        .await
        .unwrap();

    let store = Arc::new(StaleReadStore {
        inner,
        snapshot: ticket,
    });
    let service = CheckInService::new(
        Arc::clone(&store) as Arc<dyn TicketStore>,
        Arc::new(test_clock()),
        PayloadCodec::default(),
    );
    let gate = EventGate::new(EventId::new(EVENT), None);

    let result = service
        .check_in("t-1", &gate, &OperatorId::new("door-1"))
        .await;

    assert_eq!(
        result,
        Err(CheckInError::Rejected(CheckInFailure::AlreadyUsed {
            checked_in_at: None
        }))
    );
    let stored = store.inner.get(&TicketId::new("t-1")).unwrap();
    assert_eq!(stored.checked_in_by, Some(OperatorId::new("door-2")));
    assert_eq!(stored.checked_in_at, Some(committed_at));
}
