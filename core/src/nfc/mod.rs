//! NFC transport: payload links, NDEF framing and device sessions.

pub mod ndef;
pub mod payload;
pub mod session;

pub use ndef::{NdefError, NdefMessage, NdefRecord, Tnf, decode_tag};
pub use payload::{PayloadCodec, TicketNfcPayload};
pub use session::{
    Capabilities, NfcError, NfcPlatform, NfcSessionManager, OsFamily, PlatformError, TagEvent,
    TagSink,
};
