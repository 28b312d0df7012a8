//! Call trigger commands: single call, batch campaign, in-flight probes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tauri::State;

use crate::calls::{
    dispatch_batch, dispatch_single, resolve_batch_scope, ActiveCall, BatchDispatch,
    SingleDispatch,
};
use crate::core_state::{CoreState, EVENT_CALL_PROGRESS};
use crate::models::PatientRecord;

/// Trigger one automated call. Validation failures come back as strings
/// before any network traffic; on success a dedicated watch worker follows
/// the call until it turns terminal.
#[tauri::command]
pub fn trigger_call(
    patient: PatientRecord,
    state: State<'_, Arc<CoreState>>,
) -> Result<SingleDispatch, String> {
    state.require_session().map_err(|e| e.to_string())?;

    let dispatch =
        dispatch_single(state.inner().as_ref(), &patient, Utc::now()).map_err(|e| e.to_string())?;

    state.start_call_watch(dispatch.identity_key.clone());
    state.emit(
        EVENT_CALL_PROGRESS,
        serde_json::json!({
            "kind": "single_dispatched",
            "identity_key": dispatch.identity_key,
        }),
    );

    Ok(dispatch)
}

/// Trigger batch calls for the current upload selection. A dispatch that
/// attempted anything starts the auto-refresh poller; a zero-attempt
/// dispatch only returns its explanation.
#[tauri::command]
pub fn trigger_batch_calls(
    state: State<'_, Arc<CoreState>>,
) -> Result<BatchDispatch, String> {
    state.require_session().map_err(|e| e.to_string())?;

    let scope = resolve_batch_scope(
        state.view.selected_upload_id(),
        state.view.selected_filename().as_deref(),
    )
    .ok_or("Select an upload before starting batch calls")?;

    let dispatch = dispatch_batch(state.inner().as_ref(), &scope, Utc::now())
        .map_err(|e| e.to_string())?;

    if dispatch.should_poll() {
        state.start_poller();
        state.emit(
            EVENT_CALL_PROGRESS,
            serde_json::json!({ "kind": "batch_dispatched" }),
        );
    }

    Ok(dispatch)
}

/// Snapshot of calls believed in flight, keyed by patient identity.
#[tauri::command]
pub fn active_calls(state: State<'_, Arc<CoreState>>) -> HashMap<String, ActiveCall> {
    state.tracker.snapshot().as_ref().clone()
}

/// Whether a batch campaign is in progress.
#[tauri::command]
pub fn calling_in_progress(state: State<'_, Arc<CoreState>>) -> bool {
    state.calling()
}
