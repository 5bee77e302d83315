//! NDEF message codec and tag decoding.
//!
//! Parses and builds binary NFC Data Exchange Format messages, and turns the
//! records of a tapped tag into a [`TicketNfcPayload`].
//!
//! # Record layout
//!
//! ```text
//! ┌──┬──┬──┬──┬──┬─────┐
//! │MB│ME│CF│SR│IL│ TNF │  header byte
//! └──┴──┴──┴──┴──┴─────┘
//! type length      1 byte
//! payload length   1 byte (SR) or 4 bytes big-endian
//! id length        1 byte (only if IL)
//! type, id, payload
//! ```

use super::payload::{PayloadCodec, TicketNfcPayload};
use thiserror::Error;

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// Well-known record type for URIs
pub const RTD_URI: &[u8] = b"U";
/// Well-known record type for text
pub const RTD_TEXT: &[u8] = b"T";

/// NFC Forum URI identifier codes, indexed by the first payload byte of a `U` record.
pub const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// Errors from parsing binary NDEF data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NdefError {
    /// No bytes at all
    #[error("NDEF message is empty")]
    Empty,

    /// A length field points past the end of the buffer
    #[error("NDEF record {index} is truncated")]
    Truncated {
        /// Zero-based record index
        index: usize,
    },

    /// The first record does not carry the message-begin flag
    #[error("First NDEF record is missing the message-begin flag")]
    MissingMessageBegin,

    /// Chunked records are not supported
    #[error("Chunked NDEF record {index} is not supported")]
    Chunked {
        /// Zero-based record index
        index: usize,
    },

    /// Bytes left after the message-end record
    #[error("{0} trailing bytes after NDEF message end")]
    TrailingBytes(usize),
}

/// Type Name Format of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tnf {
    /// Empty record
    Empty,
    /// NFC Forum well-known type (`U`, `T`, ...)
    WellKnown,
    /// RFC 2046 media type
    MimeMedia,
    /// Absolute URI in the type field
    AbsoluteUri,
    /// NFC Forum external type
    External,
    /// Unknown payload type
    Unknown,
    /// Continuation of a chunked record
    Unchanged,
    /// Reserved value 7
    Reserved,
}

impl Tnf {
    const fn from_bits(bits: u8) -> Self {
        match bits & TNF_MASK {
            0 => Self::Empty,
            1 => Self::WellKnown,
            2 => Self::MimeMedia,
            3 => Self::AbsoluteUri,
            4 => Self::External,
            5 => Self::Unknown,
            6 => Self::Unchanged,
            _ => Self::Reserved,
        }
    }

    const fn bits(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::WellKnown => 1,
            Self::MimeMedia => 2,
            Self::AbsoluteUri => 3,
            Self::External => 4,
            Self::Unknown => 5,
            Self::Unchanged => 6,
            Self::Reserved => 7,
        }
    }
}

/// A single NDEF record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NdefRecord {
    /// Type Name Format
    pub tnf: Tnf,
    /// Record type (e.g. `b"U"`)
    pub record_type: Vec<u8>,
    /// Optional record identifier
    pub id: Vec<u8>,
    /// Record payload
    pub payload: Vec<u8>,
}

impl NdefRecord {
    /// Creates a record from its parts
    #[must_use]
    pub const fn new(tnf: Tnf, record_type: Vec<u8>, id: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            tnf,
            record_type,
            id,
            payload,
        }
    }

    /// Builds a well-known URI record, abbreviating the longest matching prefix.
    #[must_use]
    pub fn uri(uri: &str) -> Self {
        let (code, prefix) = URI_PREFIXES
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, prefix)| uri.starts_with(*prefix))
            .max_by_key(|(_, prefix)| prefix.len())
            .map_or((0, ""), |(code, prefix)| (code, *prefix));

        let mut payload = Vec::with_capacity(1 + uri.len() - prefix.len());
        // URI_PREFIXES has 36 entries, so the code fits in a byte
        payload.push(u8::try_from(code).unwrap_or(0));
        payload.extend_from_slice(&uri.as_bytes()[prefix.len()..]);

        Self::new(Tnf::WellKnown, RTD_URI.to_vec(), Vec::new(), payload)
    }

    /// Builds a UTF-8 well-known text record.
    ///
    /// Language codes longer than 63 bytes are cut to fit the status byte.
    #[must_use]
    pub fn text(language: &str, text: &str) -> Self {
        let language = &language.as_bytes()[..language.len().min(0x3F)];
        let mut payload = Vec::with_capacity(1 + language.len() + text.len());
        payload.push(u8::try_from(language.len()).unwrap_or(0));
        payload.extend_from_slice(language);
        payload.extend_from_slice(text.as_bytes());

        Self::new(Tnf::WellKnown, RTD_TEXT.to_vec(), Vec::new(), payload)
    }

    fn is_well_known(&self, record_type: &[u8]) -> bool {
        self.tnf == Tnf::WellKnown && self.record_type == record_type
    }

    /// Decodes a well-known `U` record to its full URI.
    ///
    /// Returns `None` for other records, unknown prefix codes or invalid UTF-8.
    #[must_use]
    pub fn as_uri(&self) -> Option<String> {
        if !self.is_well_known(RTD_URI) {
            return None;
        }
        let (&code, rest) = self.payload.split_first()?;
        let prefix = URI_PREFIXES.get(usize::from(code))?;
        let rest = std::str::from_utf8(rest).ok()?;
        Some(format!("{prefix}{rest}"))
    }

    /// Decodes a well-known `T` record to its text, dropping the language code.
    ///
    /// Returns `None` for other records or undecodable text.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        if !self.is_well_known(RTD_TEXT) {
            return None;
        }
        let (&status, rest) = self.payload.split_first()?;
        let language_len = usize::from(status & 0x3F);
        let body = rest.get(language_len..)?;

        if status & 0x80 == 0 {
            String::from_utf8(body.to_vec()).ok()
        } else {
            decode_utf16(body)
        }
    }

    /// URI held in the type field of an absolute-URI record
    #[must_use]
    pub fn as_absolute_uri(&self) -> Option<String> {
        if self.tnf != Tnf::AbsoluteUri {
            return None;
        }
        String::from_utf8(self.record_type.clone()).ok()
    }
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let little_endian = bytes.starts_with(&[0xFF, 0xFE]);
    let body = if little_endian || bytes.starts_with(&[0xFE, 0xFF]) {
        &bytes[2..]
    } else {
        bytes
    };

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();

    String::from_utf16(&units).ok()
}

/// An ordered list of NDEF records
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NdefMessage {
    /// Records in message order
    pub records: Vec<NdefRecord>,
}

impl NdefMessage {
    /// Creates a message from records
    #[must_use]
    pub const fn new(records: Vec<NdefRecord>) -> Self {
        Self { records }
    }

    /// Parses a binary NDEF message.
    ///
    /// # Errors
    ///
    /// Returns [`NdefError`] for empty, truncated or chunked input, a first
    /// record without the message-begin flag, or bytes after the message end.
    pub fn parse(bytes: &[u8]) -> Result<Self, NdefError> {
        if bytes.is_empty() {
            return Err(NdefError::Empty);
        }

        let mut reader = Reader { bytes, pos: 0 };
        let mut records = Vec::new();

        loop {
            let index = records.len();
            let truncated = NdefError::Truncated { index };

            let header = reader.u8().ok_or(truncated.clone())?;
            if index == 0 && header & FLAG_MB == 0 {
                return Err(NdefError::MissingMessageBegin);
            }
            if header & FLAG_CF != 0 {
                return Err(NdefError::Chunked { index });
            }

            let type_len = usize::from(reader.u8().ok_or(truncated.clone())?);
            let payload_len = if header & FLAG_SR != 0 {
                usize::from(reader.u8().ok_or(truncated.clone())?)
            } else {
                let raw = reader.take(4).ok_or(truncated.clone())?;
                let len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
                usize::try_from(len).map_err(|_| truncated.clone())?
            };
            let id_len = if header & FLAG_IL != 0 {
                usize::from(reader.u8().ok_or(truncated.clone())?)
            } else {
                0
            };

            let record_type = reader.take(type_len).ok_or(truncated.clone())?.to_vec();
            let id = reader.take(id_len).ok_or(truncated.clone())?.to_vec();
            let payload = reader.take(payload_len).ok_or(truncated)?.to_vec();

            records.push(NdefRecord::new(
                Tnf::from_bits(header),
                record_type,
                id,
                payload,
            ));

            if header & FLAG_ME != 0 {
                break;
            }
        }

        match reader.remaining() {
            0 => Ok(Self { records }),
            n => Err(NdefError::TrailingBytes(n)),
        }
    }

    /// Serializes the message, using short records where the payload fits.
    ///
    /// Type and id fields longer than 255 bytes are truncated.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let last = self.records.len().saturating_sub(1);

        for (index, record) in self.records.iter().enumerate() {
            let record_type = &record.record_type[..record.record_type.len().min(255)];
            let id = &record.id[..record.id.len().min(255)];
            let short = record.payload.len() <= 255;

            let mut header = record.tnf.bits();
            if index == 0 {
                header |= FLAG_MB;
            }
            if index == last {
                header |= FLAG_ME;
            }
            if short {
                header |= FLAG_SR;
            }
            if !id.is_empty() {
                header |= FLAG_IL;
            }

            out.push(header);
            out.push(u8::try_from(record_type.len()).unwrap_or(u8::MAX));
            if short {
                out.push(u8::try_from(record.payload.len()).unwrap_or(u8::MAX));
            } else {
                let len = u32::try_from(record.payload.len()).unwrap_or(u32::MAX);
                out.extend_from_slice(&len.to_be_bytes());
            }
            if !id.is_empty() {
                out.push(u8::try_from(id.len()).unwrap_or(u8::MAX));
            }
            out.extend_from_slice(record_type);
            out.extend_from_slice(id);
            out.extend_from_slice(&record.payload);
        }

        out
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

/// Candidate link text carried by a record, if any.
fn record_text(record: &NdefRecord, codec: &PayloadCodec) -> Option<String> {
    if record.is_well_known(RTD_URI) {
        return record.as_uri();
    }
    if record.is_well_known(RTD_TEXT) {
        return record.as_text();
    }
    if let Some(uri) = record.as_absolute_uri() {
        return Some(uri);
    }

    String::from_utf8(record.payload.clone())
        .ok()
        .filter(|text| codec.is_scan_link(text))
}

/// Finds the first record of a tapped tag that carries a ticket payload.
///
/// A tag with no such record is rejected with `None`; this is not an error.
#[must_use]
pub fn decode_tag(message: &NdefMessage, codec: &PayloadCodec) -> Option<TicketNfcPayload> {
    message.records.iter().find_map(|record| {
        record_text(record, codec).and_then(|text| codec.decode_scan_link(&text))
    })
}

/// Builds the single-record message broadcast for `payload`.
#[must_use]
pub fn broadcast_message(payload: &TicketNfcPayload, codec: &PayloadCodec) -> NdefMessage {
    NdefMessage::new(vec![NdefRecord::uri(&codec.encode(payload))])
}
