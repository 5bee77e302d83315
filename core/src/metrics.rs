//! Admission metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.
//!
//! ## Counters
//! - `gatecheck_checkins_total{source, outcome}` - Check-in attempts by source
//!   (`qr`, `nfc`, `manual`) and outcome
//! - `gatecheck_checkin_undos_total` - Check-ins reverted by an operator
//! - `gatecheck_nfc_tags_total{result}` - Tapped tags by decode result

/// Record a check-in attempt.
///
/// # Arguments
///
/// * `source` - `"qr"`, `"nfc"` or `"manual"`
/// * `outcome` - `"admitted"` or the rejection reason
pub fn record_check_in(source: &'static str, outcome: &'static str) {
    metrics::counter!("gatecheck_checkins_total", "source" => source, "outcome" => outcome)
        .increment(1);
    tracing::debug!(source, outcome, "Recorded check_in metric");
}

/// Record an undone check-in.
pub fn record_undo() {
    metrics::counter!("gatecheck_checkin_undos_total").increment(1);
    tracing::debug!("Recorded checkin_undo metric");
}

/// Record a tapped tag.
pub fn record_nfc_tag(accepted: bool) {
    let result = if accepted { "accepted" } else { "rejected" };
    metrics::counter!("gatecheck_nfc_tags_total", "result" => result).increment(1);
}
