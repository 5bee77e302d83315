//! Scriptable NFC platform bindings.
//!
//! [`MockNfcPlatform`] is handed to an `NfcSessionManager`; the paired
//! [`MockNfcHandle`] stays with the test to tap tags, inject failures and
//! inspect what the manager asked the platform to do.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use gatecheck_core::nfc::{
    Capabilities, NdefMessage, NfcPlatform, OsFamily, PlatformError, TagSink,
};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct MockNfcState {
    capabilities: Capabilities,
    sink: Option<TagSink>,
    emulating: Option<NdefMessage>,
    discovery_starts: usize,
    emulation_starts: usize,
    fail_next_discovery: Option<String>,
    fail_next_emulation: Option<String>,
    fail_next_end_discovery: Option<String>,
    fail_next_end_emulation: Option<String>,
}

/// NFC platform double.
///
/// # Example
///
/// ```
/// use gatecheck_core::nfc::{NfcSessionManager, PayloadCodec};
/// use gatecheck_testing::MockNfcPlatform;
///
/// let platform = MockNfcPlatform::android();
/// let handle = platform.handle();
/// let mut manager = NfcSessionManager::new(platform, PayloadCodec::default());
///
/// assert!(manager.start_reading(|_| {}, |_| {}));
/// assert!(handle.is_discovering());
/// ```
#[derive(Debug)]
pub struct MockNfcPlatform {
    state: Arc<Mutex<MockNfcState>>,
}

/// Test-side handle to a [`MockNfcPlatform`]
#[derive(Clone, Debug)]
pub struct MockNfcHandle {
    state: Arc<Mutex<MockNfcState>>,
}

impl MockNfcPlatform {
    /// Platform reporting `capabilities`
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockNfcState {
                capabilities,
                sink: None,
                emulating: None,
                discovery_starts: 0,
                emulation_starts: 0,
                fail_next_discovery: None,
                fail_next_emulation: None,
                fail_next_end_discovery: None,
                fail_next_end_emulation: None,
            })),
        }
    }

    /// Android device with NFC and host card emulation
    #[must_use]
    pub fn android() -> Self {
        Self::new(Capabilities {
            os: OsFamily::Android,
            nfc_available: true,
            host_card_emulation: true,
        })
    }

    /// iOS device: reads tags, cannot emulate them
    #[must_use]
    pub fn ios() -> Self {
        Self::new(Capabilities {
            os: OsFamily::Ios,
            nfc_available: true,
            host_card_emulation: false,
        })
    }

    /// Device without usable NFC hardware
    #[must_use]
    pub fn without_nfc() -> Self {
        Self::new(Capabilities {
            os: OsFamily::Android,
            nfc_available: false,
            host_card_emulation: false,
        })
    }

    /// Handle for driving this platform from a test
    #[must_use]
    pub fn handle(&self) -> MockNfcHandle {
        MockNfcHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl NfcPlatform for MockNfcPlatform {
    fn capabilities(&self) -> Capabilities {
        self.state.lock().unwrap().capabilities
    }

    fn begin_discovery(&mut self, sink: TagSink) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.fail_next_discovery.take() {
            return Err(PlatformError(reason));
        }
        state.sink = Some(sink);
        state.discovery_starts += 1;
        Ok(())
    }

    fn end_discovery(&mut self) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.fail_next_end_discovery.take() {
            return Err(PlatformError(reason));
        }
        state.sink = None;
        Ok(())
    }

    fn begin_emulation(&mut self, message: &NdefMessage) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.fail_next_emulation.take() {
            return Err(PlatformError(reason));
        }
        state.emulating = Some(message.clone());
        state.emulation_starts += 1;
        Ok(())
    }

    fn end_emulation(&mut self) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.fail_next_end_emulation.take() {
            return Err(PlatformError(reason));
        }
        state.emulating = None;
        Ok(())
    }
}

impl MockNfcHandle {
    /// Taps a tag carrying `message`. Returns `false` if nothing is listening.
    pub fn tap(&self, message: NdefMessage) -> bool {
        let sink = self.state.lock().unwrap().sink.clone();
        sink.is_some_and(|sink| sink.tag_discovered(message))
    }

    /// Aborts the read session from the platform side
    pub fn fail(&self, reason: &str) -> bool {
        let sink = self.state.lock().unwrap().sink.clone();
        sink.is_some_and(|sink| sink.platform_failed(reason))
    }

    /// Drops the platform's sink, as an OS tearing down the session would
    pub fn disconnect(&self) {
        self.state.lock().unwrap().sink = None;
    }

    /// Replaces the reported capabilities
    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.state.lock().unwrap().capabilities = capabilities;
    }

    /// Makes the next `begin_discovery` fail with `reason`
    pub fn fail_next_discovery(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_discovery = Some(reason.to_string());
    }

    /// Makes the next `begin_emulation` fail with `reason`
    pub fn fail_next_emulation(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_emulation = Some(reason.to_string());
    }

    /// Makes the next `end_discovery` fail with `reason`, leaving discovery running
    pub fn fail_next_end_discovery(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_end_discovery = Some(reason.to_string());
    }

    /// Makes the next `end_emulation` fail with `reason`, leaving emulation running
    pub fn fail_next_end_emulation(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_end_emulation = Some(reason.to_string());
    }

    /// Whether tag discovery is running
    #[must_use]
    pub fn is_discovering(&self) -> bool {
        self.state.lock().unwrap().sink.is_some()
    }

    /// How many times discovery was started
    #[must_use]
    pub fn discovery_starts(&self) -> usize {
        self.state.lock().unwrap().discovery_starts
    }

    /// How many times emulation was started
    #[must_use]
    pub fn emulation_starts(&self) -> usize {
        self.state.lock().unwrap().emulation_starts
    }

    /// Message currently emulated, if any
    #[must_use]
    pub fn emulated_message(&self) -> Option<NdefMessage> {
        self.state.lock().unwrap().emulating.clone()
    }
}
