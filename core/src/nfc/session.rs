//! NFC read and broadcast sessions.
//!
//! The manager owns two independent `Idle ⇄ Active` sessions:
//!
//! - **read**: tag discovery; every tapped tag is decoded and handed to the
//!   caller's callbacks.
//! - **broadcast**: host card emulation, so another phone can read this
//!   device's ticket. Android only.
//!
//! Platform callbacks arrive on OS threads. They are queued through a
//! [`TagSink`] and only processed when the owning context calls
//! [`NfcSessionManager::dispatch_next`] or
//! [`NfcSessionManager::dispatch_pending`], so callbacks never run
//! concurrently with the caller's own work.
//!
//! ```text
//!   OS thread                          owning context
//!  ┌───────────┐  TagEvent   ┌──────────────────────────────┐
//!  │ platform  │ ──────────▶ │ dispatch_next()              │
//!  │ TagSink   │  (channel)  │   decode_tag → on_tag_read   │
//!  └───────────┘             │   rejected   → on_error      │
//!                            │   failure    → on_error, Idle│
//!                            └──────────────────────────────┘
//! ```

use super::ndef::{NdefMessage, broadcast_message, decode_tag};
use super::payload::{PayloadCodec, TicketNfcPayload};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported to the read session's error callback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NfcError {
    /// NFC hardware is missing or disabled
    #[error("NFC is not available on this device")]
    TransportUnavailable,

    /// A tag was read but carried no ticket payload
    #[error("Tag does not carry a ticket payload")]
    PayloadRejected,

    /// The platform reported a failure
    #[error("NFC platform error: {0}")]
    Platform(String),
}

/// Error returned by platform bindings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

/// Operating system family of the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OsFamily {
    /// Android (supports host card emulation)
    Android,
    /// iOS (read only)
    Ios,
    /// Anything else
    Other,
}

/// Capability signals reported by the platform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Operating system family
    pub os: OsFamily,
    /// NFC hardware present and enabled
    pub nfc_available: bool,
    /// Hardware and OS support host card emulation
    pub host_card_emulation: bool,
}

impl Capabilities {
    /// Whether this device can broadcast a ticket to another phone
    #[must_use]
    pub const fn can_broadcast(&self) -> bool {
        matches!(self.os, OsFamily::Android) && self.nfc_available && self.host_card_emulation
    }
}

/// Event delivered from the platform to the read session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagEvent {
    /// A tag was tapped
    Discovered(NdefMessage),
    /// The platform aborted the read session
    Failed(String),
}

/// Handle given to the platform for delivering read-session events.
///
/// Cheap to clone and safe to use from any thread.
#[derive(Clone, Debug)]
pub struct TagSink {
    tx: mpsc::UnboundedSender<TagEvent>,
}

impl TagSink {
    /// Queues a discovered tag. Returns `false` if the session has ended.
    pub fn tag_discovered(&self, message: NdefMessage) -> bool {
        self.tx.send(TagEvent::Discovered(message)).is_ok()
    }

    /// Queues a platform failure. Returns `false` if the session has ended.
    pub fn platform_failed(&self, reason: impl Into<String>) -> bool {
        self.tx.send(TagEvent::Failed(reason.into())).is_ok()
    }
}

/// Device NFC bindings
pub trait NfcPlatform: Send {
    /// Current capability signals
    fn capabilities(&self) -> Capabilities;

    /// Starts tag discovery, delivering events through `sink`
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if discovery cannot start.
    fn begin_discovery(&mut self, sink: TagSink) -> Result<(), PlatformError>;

    /// Stops tag discovery
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the platform reports a failure.
    fn end_discovery(&mut self) -> Result<(), PlatformError>;

    /// Starts emulating a tag holding `message`
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if emulation cannot start.
    fn begin_emulation(&mut self, message: &NdefMessage) -> Result<(), PlatformError>;

    /// Stops tag emulation
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the platform reports a failure.
    fn end_emulation(&mut self) -> Result<(), PlatformError>;
}

type TagCallback = Box<dyn FnMut(TicketNfcPayload) + Send>;
type ErrorCallback = Box<dyn FnMut(NfcError) + Send>;

struct ReadSession {
    events: mpsc::UnboundedReceiver<TagEvent>,
    on_tag_read: TagCallback,
    on_error: ErrorCallback,
}

/// Owns the read and broadcast sessions of one device.
pub struct NfcSessionManager<P: NfcPlatform> {
    platform: P,
    codec: PayloadCodec,
    read: Option<ReadSession>,
    broadcast: Option<TicketNfcPayload>,
}

impl<P: NfcPlatform> NfcSessionManager<P> {
    /// Creates a manager with both sessions idle
    #[must_use]
    pub const fn new(platform: P, codec: PayloadCodec) -> Self {
        Self {
            platform,
            codec,
            read: None,
            broadcast: None,
        }
    }

    /// The platform bindings
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// Whether a read session is active
    #[must_use]
    pub const fn is_reading(&self) -> bool {
        self.read.is_some()
    }

    /// Whether a broadcast session is active
    #[must_use]
    pub const fn is_broadcasting(&self) -> bool {
        self.broadcast.is_some()
    }

    /// Payload currently being broadcast
    #[must_use]
    pub const fn broadcast_payload(&self) -> Option<&TicketNfcPayload> {
        self.broadcast.as_ref()
    }

    /// Starts the read session.
    ///
    /// Returns `true` if a read session is active afterwards. When NFC is
    /// unavailable, or the platform refuses to start, `on_error` is invoked
    /// before returning `false`. Calling this while already reading keeps the
    /// existing session and its callbacks.
    pub fn start_reading<F, E>(&mut self, on_tag_read: F, mut on_error: E) -> bool
    where
        F: FnMut(TicketNfcPayload) + Send + 'static,
        E: FnMut(NfcError) + Send + 'static,
    {
        if self.read.is_some() {
            tracing::debug!("NFC read session already active");
            return true;
        }

        if !self.platform.capabilities().nfc_available {
            tracing::warn!("NFC read requested but hardware is unavailable");
            on_error(NfcError::TransportUnavailable);
            return false;
        }

        let (tx, events) = mpsc::unbounded_channel();
        if let Err(error) = self.platform.begin_discovery(TagSink { tx }) {
            tracing::warn!(error = %error, "NFC discovery failed to start");
            on_error(NfcError::Platform(error.0));
            return false;
        }

        self.read = Some(ReadSession {
            events,
            on_tag_read: Box::new(on_tag_read),
            on_error: Box::new(on_error),
        });
        tracing::info!("NFC read session started");
        true
    }

    /// Stops the read session. Safe to call at any time.
    ///
    /// Events still queued by the stopped session are discarded.
    pub fn stop_reading(&mut self) {
        if self.read.take().is_none() {
            return;
        }
        if let Err(error) = self.platform.end_discovery() {
            tracing::warn!(error = %error, "Ignoring NFC discovery stop failure");
        }
        tracing::info!("NFC read session stopped");
    }

    /// Waits for the next read-session event and handles it.
    ///
    /// Returns `false` once no read session is active.
    pub async fn dispatch_next(&mut self) -> bool {
        let Some(session) = self.read.as_mut() else {
            return false;
        };

        match session.events.recv().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => {
                // Platform dropped every sink
                self.stop_reading();
                false
            }
        }
    }

    /// Handles every event already queued, without waiting.
    ///
    /// Returns the number of events handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self
            .read
            .as_mut()
            .and_then(|session| session.events.try_recv().ok())
        {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    fn handle(&mut self, event: TagEvent) {
        let Some(session) = self.read.as_mut() else {
            return;
        };

        match event {
            TagEvent::Discovered(message) => {
                if let Some(payload) = decode_tag(&message, &self.codec) {
                    crate::metrics::record_nfc_tag(true);
                    tracing::debug!(ticket_id = %payload.ticket_id, "NFC tag accepted");
                    (session.on_tag_read)(payload);
                } else {
                    crate::metrics::record_nfc_tag(false);
                    tracing::warn!(records = message.records.len(), "NFC tag rejected");
                    (session.on_error)(NfcError::PayloadRejected);
                }
            }
            TagEvent::Failed(reason) => {
                tracing::warn!(reason = %reason, "NFC read session failed");
                (session.on_error)(NfcError::Platform(reason));
                self.stop_reading();
            }
        }
    }

    /// Starts (or replaces) the broadcast session for `payload`.
    ///
    /// Returns `false` without changing state when the device cannot
    /// broadcast or the platform refuses.
    pub fn start_broadcasting(&mut self, payload: TicketNfcPayload) -> bool {
        if !self.platform.capabilities().can_broadcast() {
            tracing::debug!("Host card emulation unavailable; not broadcasting");
            return false;
        }

        let message = broadcast_message(&payload, &self.codec);
        if let Err(error) = self.platform.begin_emulation(&message) {
            tracing::warn!(error = %error, "NFC emulation failed to start");
            return false;
        }

        tracing::info!(
            ticket_id = %payload.ticket_id,
            replaced = self.broadcast.is_some(),
            "NFC broadcast started"
        );
        self.broadcast = Some(payload);
        true
    }

    /// Stops the broadcast session. Safe to call at any time.
    pub fn stop_broadcasting(&mut self) {
        if self.broadcast.take().is_none() {
            return;
        }
        if let Err(error) = self.platform.end_emulation() {
            tracing::warn!(error = %error, "Ignoring NFC emulation stop failure");
        }
        tracing::info!("NFC broadcast stopped");
    }
}

impl<P: NfcPlatform> std::fmt::Debug for NfcSessionManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NfcSessionManager")
            .field("codec", &self.codec)
            .field("reading", &self.is_reading())
            .field("broadcast", &self.broadcast)
            .finish_non_exhaustive()
    }
}
