//! Single-call trigger and its dedicated watch loop.
//!
//! The watch loop is distinct from the batch auto-refresh poller: it
//! follows exactly one call, re-fetching every 2 seconds for at most 60
//! iterations, and stops as soon as the record reaches a terminal status.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::poller::{interruptible_sleep, PollContext, PollWorker, POLL_INTERVAL_MS};
use super::tracker::ActiveCall;
use super::validate::{validate_call_preconditions, ValidationError};
use crate::api::ApiError;
use crate::models::{CallResult, CallStatus, PatientRecord};

/// Tick budget for the watch loop (~2 minutes at 2s per tick).
pub const WATCH_MAX_ITERATIONS: u32 = 60;

/// Errors from a single-call trigger.
#[derive(Debug, thiserror::Error)]
pub enum SingleCallError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A successfully dispatched single call.
#[derive(Debug, Clone, Serialize)]
pub struct SingleDispatch {
    /// Composite identity the tracker entry is keyed by.
    pub identity_key: String,
    pub result: CallResult,
}

/// Validate, dispatch and track one call.
///
/// Validation failures return before any network traffic. On success the
/// tracker gets an entry and the patient data is refreshed optimistically
/// (silently — a refresh failure does not undo the dispatch).
pub fn dispatch_single(
    ctx: &dyn PollContext,
    patient: &PatientRecord,
    now: DateTime<Utc>,
) -> Result<SingleDispatch, SingleCallError> {
    validate_call_preconditions(patient)?;

    let result = ctx.api().trigger_call(patient)?;
    let key = patient.identity_key();
    ctx.tracker().insert(
        &key,
        ActiveCall {
            phone: patient.phone.clone(),
            started_at: now,
            call_session_id: result.call_session_id.clone(),
        },
    );

    if let Err(e) = ctx.patients().load(ctx.api(), &ctx.refresh_scope(), true) {
        tracing::debug!(error = %e, "Optimistic refresh after dispatch failed");
    } else {
        ctx.notify_refreshed();
    }

    tracing::info!(
        phone = %patient.phone,
        invoice = %patient.invoice_number,
        "Single call dispatched"
    );

    Ok(SingleDispatch { identity_key: key, result })
}

/// One watch tick: silent refresh, tracker upkeep, then report the
/// record's status if it turned terminal.
pub fn watch_tick(
    ctx: &dyn PollContext,
    identity_key: &str,
    now: DateTime<Utc>,
) -> Option<CallStatus> {
    match ctx.patients().load(ctx.api(), &ctx.refresh_scope(), true) {
        Ok(_) => ctx.notify_refreshed(),
        Err(e) => tracing::debug!(error = %e, "Watch refresh failed, will retry next tick"),
    }

    let snapshot = ctx.patients().snapshot();
    ctx.tracker().reconcile(&snapshot);
    ctx.tracker().prune(now);

    ctx.patients()
        .status_of(identity_key)
        .filter(CallStatus::is_terminal)
}

/// Spawn the dedicated watch worker for one dispatched call.
pub fn spawn_call_watch(ctx: Arc<dyn PollContext>, identity_key: String) -> PollWorker {
    PollWorker::spawn("single-call-watch", move |stop| {
        tracing::debug!(key = %identity_key, "Call watch started");
        for _ in 0..WATCH_MAX_ITERATIONS {
            if !interruptible_sleep(stop, POLL_INTERVAL_MS) {
                tracing::debug!(key = %identity_key, "Call watch cancelled");
                return;
            }
            if stop.load(Ordering::Relaxed) {
                return;
            }
            if let Some(status) = watch_tick(ctx.as_ref(), &identity_key, Utc::now()) {
                tracing::info!(key = %identity_key, status = status.as_str(), "Call reached terminal status");
                return;
            }
        }
        // Budget exhausted: the entry stays for the 10-minute prune.
        tracing::debug!(key = %identity_key, "Call watch gave up after budget");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BackendApi, MockBackend, PatientScope};
    use crate::calls::tracker::ActiveCallTracker;
    use crate::patients::PatientStore;

    struct TestCtx {
        api: MockBackend,
        patients: PatientStore,
        tracker: ActiveCallTracker,
    }

    impl PollContext for TestCtx {
        fn api(&self) -> &dyn BackendApi {
            &self.api
        }
        fn patients(&self) -> &PatientStore {
            &self.patients
        }
        fn tracker(&self) -> &ActiveCallTracker {
            &self.tracker
        }
        fn calling_in_progress(&self) -> bool {
            false
        }
        fn clear_calling_flag(&self) {}
        fn on_upload_view(&self) -> bool {
            true
        }
        fn refresh_scope(&self) -> PatientScope {
            PatientScope::All
        }
    }

    fn patient(phone: &str, invoice: &str, status: CallStatus) -> PatientRecord {
        PatientRecord {
            first_name: "Maria".into(),
            last_name: "Lopez".into(),
            phone: phone.into(),
            invoice_number: invoice.into(),
            outstanding_amount: 60.0,
            estimated_date: None,
            call_status: status,
            notes: None,
            call_history: vec![],
            upload_id: None,
        }
    }

    fn success_result(phone: &str) -> CallResult {
        CallResult {
            phone: phone.into(),
            first_name: "Maria".into(),
            last_name: "Lopez".into(),
            status: "success".into(),
            message: None,
            call_session_id: Some("sess-1".into()),
        }
    }

    #[test]
    fn short_phone_never_reaches_the_network() {
        let ctx = TestCtx {
            api: MockBackend::new(),
            patients: PatientStore::new(),
            tracker: ActiveCallTracker::new(),
        };
        let bad = patient("123", "INV-1", CallStatus::None);

        let err = dispatch_single(&ctx, &bad, Utc::now()).unwrap_err();
        assert!(matches!(err, SingleCallError::Validation(ValidationError::PhoneTooShort(3))));
        assert_eq!(ctx.api.trigger_count.load(Ordering::Relaxed), 0);
        assert!(ctx.tracker.is_empty());
    }

    #[test]
    fn empty_invoice_never_reaches_the_network() {
        let ctx = TestCtx {
            api: MockBackend::new(),
            patients: PatientStore::new(),
            tracker: ActiveCallTracker::new(),
        };
        let bad = patient("5551234567", "", CallStatus::None);

        let err = dispatch_single(&ctx, &bad, Utc::now()).unwrap_err();
        assert!(matches!(err, SingleCallError::Validation(ValidationError::InvoiceMissing)));
        assert_eq!(ctx.api.trigger_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn dispatch_tracks_and_optimistically_refreshes() {
        let rec = patient("5551234567", "INV-1", CallStatus::Sent);
        let ctx = TestCtx {
            api: MockBackend::new()
                .with_single_result(success_result("5551234567"))
                .with_patients(vec![rec.clone()]),
            patients: PatientStore::new(),
            tracker: ActiveCallTracker::new(),
        };

        let dispatch = dispatch_single(&ctx, &rec, Utc::now()).unwrap();
        assert_eq!(dispatch.identity_key, rec.identity_key());
        assert!(ctx.tracker.contains(&dispatch.identity_key));
        assert_eq!(ctx.api.fetches(), 1, "optimistic refresh happened");
        assert_eq!(ctx.patients.snapshot().len(), 1);
    }

    #[test]
    fn api_failure_leaves_tracker_empty() {
        let rec = patient("5551234567", "INV-1", CallStatus::None);
        let ctx = TestCtx {
            // No scripted single result: trigger_call errors.
            api: MockBackend::new(),
            patients: PatientStore::new(),
            tracker: ActiveCallTracker::new(),
        };

        let err = dispatch_single(&ctx, &rec, Utc::now()).unwrap_err();
        assert!(matches!(err, SingleCallError::Api(_)));
        assert!(ctx.tracker.is_empty());
    }

    #[test]
    fn watch_tick_reports_terminal_status() {
        let pending = patient("5551234567", "INV-1", CallStatus::Pending);
        let key = pending.identity_key();
        let ctx = TestCtx {
            api: MockBackend::new().with_patients(vec![pending.clone()]),
            patients: PatientStore::new(),
            tracker: ActiveCallTracker::new(),
        };
        ctx.tracker.insert(
            &key,
            ActiveCall { phone: pending.phone.clone(), started_at: Utc::now(), call_session_id: None },
        );

        assert!(watch_tick(&ctx, &key, Utc::now()).is_none());

        // Next fetch shows the call completed.
        ctx.api.push_patients(vec![patient("5551234567", "INV-1", CallStatus::Completed)]);
        assert_eq!(watch_tick(&ctx, &key, Utc::now()), Some(CallStatus::Completed));
        assert!(ctx.tracker.is_empty(), "reconcile dropped the terminal entry");
    }

    #[test]
    fn watch_worker_cancels_promptly() {
        let ctx = Arc::new(TestCtx {
            api: MockBackend::new(),
            patients: PatientStore::new(),
            tracker: ActiveCallTracker::new(),
        });
        let worker = spawn_call_watch(ctx, "some|key|maria|lopez".into());
        worker.stop();
        drop(worker); // join must not hang
    }
}
