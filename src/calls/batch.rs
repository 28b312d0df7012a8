//! Batch-call dispatch.
//!
//! A batch targets either the selected upload id or a filename, never
//! both: the upload id wins when a selection exists. A dispatch that
//! attempted zero calls produces a descriptive message and must not start
//! any polling; a dispatch with attempts seeds the active-call tracker
//! from the calls the backend reports as sent.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::poller::PollContext;
use crate::api::{ApiError, BatchScope};
use crate::models::BatchCallReport;

/// Outcome of a batch dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchDispatch {
    /// Zero attempts: show `message`, do not poll.
    NothingToCall { message: String, report: BatchCallReport },
    /// Calls went out; the tracker now holds `seeded` entries.
    Dispatched { report: BatchCallReport, seeded: usize },
}

impl BatchDispatch {
    pub fn should_poll(&self) -> bool {
        matches!(self, Self::Dispatched { .. })
    }
}

/// Resolve which population a batch call targets. Upload id takes
/// precedence over a remembered filename.
pub fn resolve_batch_scope(
    upload_id: Option<i64>,
    filename: Option<&str>,
) -> Option<BatchScope> {
    if let Some(id) = upload_id {
        return Some(BatchScope::Upload(id));
    }
    filename
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| BatchScope::Filename(f.to_string()))
}

/// Trigger a batch call and, when anything was attempted, seed the
/// tracker by matching each dispatched call to a known patient on
/// (phone, first, last), falling back to the raw phone number.
pub fn dispatch_batch(
    ctx: &dyn PollContext,
    scope: &BatchScope,
    now: DateTime<Utc>,
) -> Result<BatchDispatch, ApiError> {
    let report = ctx.api().trigger_batch(scope)?;

    if report.total_attempted == 0 {
        let message = zero_attempt_message(&report);
        tracing::info!(
            total = report.total_patients,
            filtered = report.filtered_out_count,
            "Batch dispatch attempted nothing"
        );
        return Ok(BatchDispatch::NothingToCall { message, report });
    }

    let patients = ctx.patients().snapshot();
    let seeded = ctx.tracker().seed_from_batch(&report.calls, &patients, now);
    tracing::info!(
        attempted = report.total_attempted,
        seeded,
        "Batch calls dispatched"
    );
    Ok(BatchDispatch::Dispatched { report, seeded })
}

/// Explain a zero-attempt batch, distinguishing "no patients at all",
/// "filtered out by billing rules" and "already called". The filtered
/// message always carries both the total and the filtered count.
fn zero_attempt_message(report: &BatchCallReport) -> String {
    if report.total_patients == 0 {
        return "No patients found for this selection — nothing to call.".to_string();
    }
    if report.filtered_out_count > 0 {
        if report.filtered_out_count >= report.total_patients {
            return format!(
                "No calls placed: all {} patients were filtered out by billing rules \
                 (nothing outstanding or estimated date in the future).",
                report.total_patients
            );
        }
        return format!(
            "No calls placed: of {} patients, {} were filtered out by billing rules \
             and the rest have already been called.",
            report.total_patients, report.filtered_out_count
        );
    }
    format!(
        "No calls placed: all {} patients have already been called.",
        report.total_patients
    )
}
