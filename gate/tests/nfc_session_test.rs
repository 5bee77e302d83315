//! NFC read and broadcast sessions driven through the mock platform, and the
//! NFC admission loop on top of them.
//!
//! Run with: `cargo test -p gatecheck-gate --test nfc_session_test`

#![allow(clippy::unwrap_used)]

use gatecheck_core::checkin::{CheckInService, EventGate};
use gatecheck_core::nfc::ndef::broadcast_message;
use gatecheck_core::nfc::{
    Capabilities, NdefMessage, NdefRecord, NfcError, NfcPlatform, NfcSessionManager, OsFamily,
    PayloadCodec, TicketNfcPayload, decode_tag,
};
use gatecheck_core::ticket::{EventId, OperatorId, TicketId, TicketStatus};
use gatecheck_gate::{AdmissionDesk, AdmissionSummary, run_nfc_admission};
use gatecheck_testing::{InMemoryTicketStore, MockNfcPlatform, TicketBuilder, test_clock};
use std::sync::{Arc, Mutex};

type Seen<T> = Arc<Mutex<Vec<T>>>;

fn recorder<T: Send + 'static>() -> (Seen<T>, impl FnMut(T) + Send + 'static) {
    let seen: Seen<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value| sink.lock().unwrap().push(value))
}

fn ticket_tag(payload: &TicketNfcPayload) -> NdefMessage {
    broadcast_message(payload, &PayloadCodec::default())
}

#[test]
fn unavailable_hardware_reports_synchronously() {
    let mut manager =
        NfcSessionManager::new(MockNfcPlatform::without_nfc(), PayloadCodec::default());
    let (tags, on_tag) = recorder::<TicketNfcPayload>();
    let (errors, on_error) = recorder::<NfcError>();

    assert!(!manager.start_reading(on_tag, on_error));

    assert!(!manager.is_reading());
    assert!(tags.lock().unwrap().is_empty());
    assert_eq!(*errors.lock().unwrap(), vec![NfcError::TransportUnavailable]);
}

#[test]
fn platform_refusal_keeps_session_idle() {
    let platform = MockNfcPlatform::android();
    let handle = platform.handle();
    handle.fail_next_discovery("reader busy");
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
    let (errors, on_error) = recorder::<NfcError>();

    assert!(!manager.start_reading(|_| {}, on_error));

    assert!(!manager.is_reading());
    assert_eq!(
        *errors.lock().unwrap(),
        vec![NfcError::Platform("reader busy".to_string())]
    );
}

#[test]
fn starting_twice_keeps_one_session() {
    let platform = MockNfcPlatform::ios();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());

    assert!(manager.start_reading(|_| {}, |_| {}));
    assert!(manager.start_reading(|_| {}, |_| {}));

    assert!(manager.is_reading());
    assert_eq!(handle.discovery_starts(), 1);
}

#[test]
fn enabling_nfc_lets_a_later_read_start() {
    let platform = MockNfcPlatform::without_nfc();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
    assert!(!manager.start_reading(|_| {}, |_| {}));

    handle.set_capabilities(Capabilities {
        os: OsFamily::Android,
        nfc_available: true,
        host_card_emulation: true,
    });

    assert!(manager.platform().capabilities().nfc_available);
    assert!(manager.start_reading(|_| {}, |_| {}));
    assert!(handle.is_discovering());
}

#[tokio::test]
async fn tapped_tags_reach_the_callbacks() {
    let platform = MockNfcPlatform::ios();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
    let (tags, on_tag) = recorder::<TicketNfcPayload>();
    let (errors, on_error) = recorder::<NfcError>();
    assert!(manager.start_reading(on_tag, on_error));

    let payload = TicketNfcPayload::new("t-1", "TKT-1", "gala");
    assert!(handle.tap(ticket_tag(&payload)));
    assert!(handle.tap(NdefMessage::new(vec![NdefRecord::text("en", "hello")])));

    assert!(manager.dispatch_next().await);
    assert!(manager.dispatch_next().await);

    assert_eq!(*tags.lock().unwrap(), vec![payload]);
    assert_eq!(*errors.lock().unwrap(), vec![NfcError::PayloadRejected]);
    // A rejected tag does not end the session
    assert!(manager.is_reading());
}

#[test]
fn raw_bytes_from_a_tag_decode() {
    let body = r#"tickety.app/scan#{"t":"x","n":"n1","e":"e1"}"#;
    let mut payload = vec![0x04];
    payload.extend_from_slice(body.as_bytes());

    let mut bytes = vec![0xD1, 0x01];
    bytes.push(u8::try_from(payload.len()).unwrap());
    bytes.push(b'U');
    bytes.extend_from_slice(&payload);

    let message = NdefMessage::parse(&bytes).unwrap();
    assert_eq!(
        decode_tag(&message, &PayloadCodec::default()),
        Some(TicketNfcPayload::new("x", "n1", "e1"))
    );
}

#[test]
fn platform_failure_resets_to_idle() {
    let platform = MockNfcPlatform::android();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
    let (errors, on_error) = recorder::<NfcError>();
    assert!(manager.start_reading(|_| {}, on_error));

    assert!(handle.fail("tag lost"));
    assert_eq!(manager.dispatch_pending(), 1);

    assert!(!manager.is_reading());
    assert!(!handle.is_discovering());
    assert_eq!(
        *errors.lock().unwrap(),
        vec![NfcError::Platform("tag lost".to_string())]
    );
}

#[test]
fn stop_reading_is_idempotent_and_discards_queued_tags() {
    let platform = MockNfcPlatform::android();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
    let (tags, on_tag) = recorder::<TicketNfcPayload>();
    assert!(manager.start_reading(on_tag, |_| {}));

    assert!(handle.tap(ticket_tag(&TicketNfcPayload::new("t-1", "TKT-1", "gala"))));
    manager.stop_reading();
    manager.stop_reading();

    assert_eq!(manager.dispatch_pending(), 0);
    assert!(tags.lock().unwrap().is_empty());
    assert!(!handle.tap(ticket_tag(&TicketNfcPayload::new("t-2", "TKT-2", "gala"))));
}

#[test]
fn stop_failures_are_swallowed_and_sessions_end() {
    let platform = MockNfcPlatform::android();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
    let (tags, on_tag) = recorder::<TicketNfcPayload>();
    assert!(manager.start_reading(on_tag, |_| {}));
    assert!(manager.start_broadcasting(TicketNfcPayload::new("t-1", "TKT-1", "gala")));

    handle.fail_next_end_discovery("reader stuck");
    handle.fail_next_end_emulation("secure element stuck");
    manager.stop_reading();
    manager.stop_broadcasting();

    assert!(!manager.is_reading());
    assert!(!manager.is_broadcasting());
    assert_eq!(manager.broadcast_payload(), None);

    // The platform kept its sink, but taps no longer reach the stopped session
    assert!(handle.is_discovering());
    assert!(!handle.tap(ticket_tag(&TicketNfcPayload::new("t-2", "TKT-2", "gala"))));
    assert_eq!(manager.dispatch_pending(), 0);
    assert!(tags.lock().unwrap().is_empty());

    // A fresh session starts cleanly afterwards
    assert!(manager.start_reading(|_| {}, |_| {}));
    assert_eq!(handle.discovery_starts(), 2);
}

#[tokio::test]
async fn disconnected_platform_ends_the_session() {
    let platform = MockNfcPlatform::android();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
    assert!(manager.start_reading(|_| {}, |_| {}));

    handle.disconnect();

    assert!(!manager.dispatch_next().await);
    assert!(!manager.is_reading());
}

#[test]
fn broadcasting_requires_host_card_emulation() {
    let mut ios = NfcSessionManager::new(MockNfcPlatform::ios(), PayloadCodec::default());
    assert!(!ios.start_broadcasting(TicketNfcPayload::new("t-1", "TKT-1", "gala")));
    assert!(!ios.is_broadcasting());

    let platform = MockNfcPlatform::new(Capabilities {
        os: OsFamily::Android,
        nfc_available: true,
        host_card_emulation: false,
    });
    let mut no_hce = NfcSessionManager::new(platform, PayloadCodec::default());
    assert!(!no_hce.start_broadcasting(TicketNfcPayload::new("t-1", "TKT-1", "gala")));
}

#[test]
fn broadcast_emulates_the_encoded_payload_and_can_be_replaced() {
    let platform = MockNfcPlatform::android();
    let handle = platform.handle();
    let codec = PayloadCodec::default();
    let mut manager = NfcSessionManager::new(platform, codec.clone());

    let first = TicketNfcPayload::new("t-1", "TKT-1", "gala");
    let second = TicketNfcPayload::new("t-2", "TKT-2", "gala");
    assert!(manager.start_broadcasting(first.clone()));
    assert_eq!(
        decode_tag(&handle.emulated_message().unwrap(), &codec),
        Some(first)
    );

    assert!(manager.start_broadcasting(second.clone()));
    assert_eq!(manager.broadcast_payload(), Some(&second));
    assert_eq!(
        decode_tag(&handle.emulated_message().unwrap(), &codec),
        Some(second)
    );

    manager.stop_broadcasting();
    manager.stop_broadcasting();
    assert!(!manager.is_broadcasting());
    assert!(handle.emulated_message().is_none());
}

#[test]
fn refused_emulation_leaves_state_unchanged() {
    let platform = MockNfcPlatform::android();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
    handle.fail_next_emulation("secure element busy");

    assert!(!manager.start_broadcasting(TicketNfcPayload::new("t-1", "TKT-1", "gala")));
    assert!(!manager.is_broadcasting());
    assert_eq!(handle.emulation_starts(), 0);
}

#[tokio::test]
async fn nfc_admission_checks_in_every_tap() {
    let store = Arc::new(
        InMemoryTicketStore::with_tickets([
            TicketBuilder::new("gala").id("t-1").number("TKT-1").build(),
            TicketBuilder::new("gala").id("t-2").number("TKT-2").build(),
        ])
        .unwrap(),
    );
    let service = CheckInService::new(
        Arc::clone(&store) as Arc<dyn gatecheck_core::store::TicketStore>,
        Arc::new(test_clock()),
        PayloadCodec::default(),
    );
    let desk = AdmissionDesk::new(
        service,
        EventGate::new(EventId::new("gala"), None),
        OperatorId::new("door-1"),
    );

    let platform = MockNfcPlatform::ios();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());

    let tapper = handle.clone();
    let taps = tokio::spawn(async move {
        // Wait for the admission loop to open the read session
        while !tapper.is_discovering() {
            tokio::task::yield_now().await;
        }
        tapper.tap(ticket_tag(&TicketNfcPayload::new("t-1", "TKT-1", "gala")));
        tapper.tap(ticket_tag(&TicketNfcPayload::new("t-1", "TKT-1", "gala")));
        tapper.tap(NdefMessage::new(vec![NdefRecord::uri("https://example.com")]));
        tapper.tap(ticket_tag(&TicketNfcPayload::new("t-2", "TKT-2", "gala")));
        tapper.disconnect();
    });

    let mut outcomes = Vec::new();
    let summary = run_nfc_admission(
        &mut manager,
        &desk,
        std::future::pending::<()>(),
        |outcome| outcomes.push(outcome.is_ok()),
    )
    .await
    .unwrap();
    taps.await.unwrap();

    assert_eq!(
        summary,
        AdmissionSummary {
            admitted: 2,
            rejected: 1,
            unreadable: 1,
        }
    );
    assert_eq!(outcomes, vec![true, false, true]);
    assert!(!manager.is_reading());
    for id in ["t-1", "t-2"] {
        let ticket = store.get(&TicketId::new(id)).unwrap();
        assert_eq!(ticket.status, TicketStatus::Used);
    }
}

#[tokio::test]
async fn nfc_admission_stops_on_shutdown() {
    let store = Arc::new(InMemoryTicketStore::new());
    let service = CheckInService::new(
        store as Arc<dyn gatecheck_core::store::TicketStore>,
        Arc::new(test_clock()),
        PayloadCodec::default(),
    );
    let desk = AdmissionDesk::new(
        service,
        EventGate::new(EventId::new("gala"), None),
        OperatorId::new("door-1"),
    );
    let platform = MockNfcPlatform::android();
    let handle = platform.handle();
    let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());

    let summary = run_nfc_admission(&mut manager, &desk, async {}, |_| {})
        .await
        .unwrap();

    assert_eq!(summary, AdmissionSummary::default());
    assert!(!handle.is_discovering());
}

#[tokio::test]
async fn nfc_admission_without_hardware_fails_to_start() {
    let service = CheckInService::new(
        Arc::new(InMemoryTicketStore::new()),
        Arc::new(test_clock()),
        PayloadCodec::default(),
    );
    let desk = AdmissionDesk::new(
        service,
        EventGate::new(EventId::new("gala"), None),
        OperatorId::new("door-1"),
    );
    let mut manager =
        NfcSessionManager::new(MockNfcPlatform::without_nfc(), PayloadCodec::default());

    let result =
        run_nfc_admission(&mut manager, &desk, std::future::pending::<()>(), |_| {}).await;
    assert_eq!(result, Err(NfcError::TransportUnavailable));
}
