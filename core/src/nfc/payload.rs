//! Ticket descriptor exchanged over NFC.
//!
//! Wire format:
//!
//! ```text
//! https://<domain>/scan#{"t":"<ticketId>","n":"<ticketNumber>","e":"<eventId>"}
//! ```
//!
//! The link part makes a tapped phone without the app open the web scanner;
//! the fragment carries the descriptor and never reaches a server.

use serde::Serialize;
use serde_json::{Map, Value};

/// Domain used in broadcast links unless configured otherwise
pub const DEFAULT_DOMAIN: &str = "tickety.app";

/// Compact ticket descriptor carried by an NFC tap
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TicketNfcPayload {
    /// Ticket identifier
    pub ticket_id: String,
    /// Human-facing ticket number
    pub ticket_number: String,
    /// Event the ticket admits to
    pub event_id: String,
}

impl TicketNfcPayload {
    /// Creates a payload
    #[must_use]
    pub fn new(
        ticket_id: impl Into<String>,
        ticket_number: impl Into<String>,
        event_id: impl Into<String>,
    ) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            ticket_number: ticket_number.into(),
            event_id: event_id.into(),
        }
    }

    /// Decodes a payload from a scan link.
    ///
    /// Everything after the first `#` must be a JSON object with string
    /// fields `t`, `n` and `e`. Other keys are ignored. Returns `None` for
    /// anything else.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (_, fragment) = uri.split_once('#')?;
        let Value::Object(object) = serde_json::from_str::<Value>(fragment).ok()? else {
            return None;
        };

        Some(Self {
            ticket_id: string_field(&object, "t")?,
            ticket_number: string_field(&object, "n")?,
            event_id: string_field(&object, "e")?,
        })
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[derive(Serialize)]
struct WirePayload<'a> {
    t: &'a str,
    n: &'a str,
    e: &'a str,
}

/// Encodes and recognises scan links for one domain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadCodec {
    domain: String,
    marker: String,
}

impl PayloadCodec {
    /// Creates a codec for links on `domain` (host only, no scheme)
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let marker = format!("{domain}/scan");
        Self { domain, marker }
    }

    /// Domain links are built on
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `"<domain>/scan"`, present in every link this codec produces
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether `text` carries this codec's marker
    #[must_use]
    pub fn is_scan_link(&self, text: &str) -> bool {
        text.contains(&self.marker)
    }

    /// Builds the scan link for `payload`
    ///
    /// # Panics
    ///
    /// Never in practice: the wire form holds only string fields.
    #[must_use]
    #[allow(clippy::expect_used)] // Serializing string fields to JSON is infallible
    pub fn encode(&self, payload: &TicketNfcPayload) -> String {
        let wire = WirePayload {
            t: &payload.ticket_id,
            n: &payload.ticket_number,
            e: &payload.event_id,
        };
        let json = serde_json::to_string(&wire).expect("string-only wire payload serializes");
        format!("https://{}/scan#{json}", self.domain)
    }

    /// Decodes a scan link; see [`TicketNfcPayload::from_uri`]
    #[must_use]
    pub fn decode(&self, uri: &str) -> Option<TicketNfcPayload> {
        TicketNfcPayload::from_uri(uri)
    }

    /// Decodes `text` only if it is one of this codec's scan links
    #[must_use]
    pub fn decode_scan_link(&self, text: &str) -> Option<TicketNfcPayload> {
        if self.is_scan_link(text) {
            self.decode(text)
        } else {
            None
        }
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN)
    }
}
