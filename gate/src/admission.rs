//! Admission desk: one gate's operator commands and NFC admission loop.

use crate::presentation::render_outcome;
use gatecheck_core::checkin::{CheckInError, CheckInService, EventGate};
use gatecheck_core::nfc::{NfcError, NfcPlatform, NfcSessionManager, TicketNfcPayload};
use gatecheck_core::store::StoreError;
use gatecheck_core::ticket::{OperatorId, Ticket, TicketId};
use std::future::Future;
use tokio::sync::mpsc;

const USAGE: &str = "Scan a ticket, or type `undo <ticket-id>` or `quit`";

/// A line typed or scanned at the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateCommand {
    /// Raw scanner text to check in
    Scan(String),
    /// Revert a check-in
    Undo(TicketId),
    /// `undo` without a ticket id
    Usage,
    /// Leave the admission loop
    Quit,
}

impl GateCommand {
    /// Parse one input line. Blank lines yield `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let command = match word {
            "quit" | "exit" if rest.is_empty() => Self::Quit,
            "undo" if rest.is_empty() => Self::Usage,
            "undo" => Self::Undo(TicketId::new(rest)),
            _ => Self::Scan(line.to_string()),
        };
        Some(command)
    }
}

/// Tally of an NFC admission run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionSummary {
    /// Tickets admitted
    pub admitted: usize,
    /// Tickets rejected or not checked in because of a store failure
    pub rejected: usize,
    /// Taps that did not yield a ticket payload
    pub unreadable: usize,
}

/// Check-in service bound to one gate and operator.
#[derive(Debug, Clone)]
pub struct AdmissionDesk {
    service: CheckInService,
    gate: EventGate,
    operator: OperatorId,
}

impl AdmissionDesk {
    /// Creates a new `AdmissionDesk`
    #[must_use]
    pub const fn new(service: CheckInService, gate: EventGate, operator: OperatorId) -> Self {
        Self {
            service,
            gate,
            operator,
        }
    }

    /// The gate this desk admits to
    #[must_use]
    pub const fn gate(&self) -> &EventGate {
        &self.gate
    }

    /// Checks in raw scanner text.
    ///
    /// # Errors
    ///
    /// See [`CheckInService::check_in_scan`].
    pub async fn scan(&self, raw: &str) -> Result<Ticket, CheckInError> {
        self.service
            .check_in_scan(raw, &self.gate, &self.operator)
            .await
    }

    /// Checks in a tapped NFC payload.
    ///
    /// # Errors
    ///
    /// See [`CheckInService::check_in_payload`].
    pub async fn admit_payload(&self, payload: &TicketNfcPayload) -> Result<Ticket, CheckInError> {
        self.service
            .check_in_payload(payload, &self.gate, &self.operator)
            .await
    }

    /// Reverts a check-in.
    ///
    /// # Errors
    ///
    /// See [`CheckInService::undo_check_in`].
    pub async fn undo(&self, ticket_id: &TicketId) -> Result<Ticket, StoreError> {
        self.service.undo_check_in(ticket_id).await
    }

    /// Executes `command` and returns the line to show the operator, or
    /// `None` when the operator asked to quit.
    pub async fn handle_command(&self, command: GateCommand) -> Option<String> {
        let reply = match command {
            GateCommand::Quit => return None,
            GateCommand::Usage => USAGE.to_string(),
            GateCommand::Scan(raw) => render_outcome(&self.scan(&raw).await),
            GateCommand::Undo(ticket_id) => match self.undo(&ticket_id).await {
                Ok(ticket) => format!("UNDO {} is valid again", ticket.ticket_number),
                Err(StoreError::NotFound(id)) => format!("UNDO failed: no ticket {id}"),
                Err(error) => format!("UNDO failed: {error}"),
            },
        };
        Some(reply)
    }
}

/// Runs an NFC read session and checks in every tapped ticket.
///
/// Payloads are admitted on the calling task, one at a time, in tap order.
/// A read session that is already active is stopped first so that every tap
/// reaches this loop. Returns when the platform ends the session or `shutdown` completes.
///
/// # Errors
///
/// Returns the [`NfcError`] reported when the read session cannot start.
pub async fn run_nfc_admission<P, S, F>(
    manager: &mut NfcSessionManager<P>,
    desk: &AdmissionDesk,
    shutdown: S,
    mut on_outcome: F,
) -> Result<AdmissionSummary, NfcError>
where
    P: NfcPlatform,
    S: Future<Output = ()>,
    F: FnMut(&Result<Ticket, CheckInError>),
{
    if manager.is_reading() {
        tracing::warn!("Replacing the active NFC read session for admission");
        manager.stop_reading();
    }

    let (tx, mut reads) = mpsc::unbounded_channel::<Result<TicketNfcPayload, NfcError>>();
    let tag_tx = tx.clone();
    let started = manager.start_reading(
        move |payload| {
            let _ = tag_tx.send(Ok(payload));
        },
        move |error| {
            let _ = tx.send(Err(error));
        },
    );
    if !started {
        let error = reads
            .try_recv()
            .ok()
            .and_then(Result::err)
            .unwrap_or(NfcError::TransportUnavailable);
        return Err(error);
    }

    tracing::info!(event_id = %desk.gate().event_id, "NFC admission started");
    let mut summary = AdmissionSummary::default();
    tokio::pin!(shutdown);

    loop {
        let active = tokio::select! {
            active = manager.dispatch_next() => active,
            () = &mut shutdown => false,
        };

        while let Ok(read) = reads.try_recv() {
            match read {
                Ok(payload) => {
                    let outcome = desk.admit_payload(&payload).await;
                    if outcome.is_ok() {
                        summary.admitted += 1;
                    } else {
                        summary.rejected += 1;
                    }
                    on_outcome(&outcome);
                }
                Err(error) => {
                    summary.unreadable += 1;
                    tracing::warn!(error = %error, "NFC tap not admitted");
                }
            }
        }

        if !active {
            break;
        }
    }

    manager.stop_reading();
    tracing::info!(
        admitted = summary.admitted,
        rejected = summary.rejected,
        unreadable = summary.unreadable,
        "NFC admission stopped"
    );
    Ok(summary)
}
