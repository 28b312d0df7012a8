//! Patient data commands.

use std::sync::Arc;

use tauri::State;

use crate::calls::PollContext;
use crate::core_state::CoreState;
use crate::models::PatientRecord;

/// Fetch patient records for the current selection (loud: the loading
/// flag is visible and a failure clears the table).
#[tauri::command]
pub fn get_patients(
    state: State<'_, Arc<CoreState>>,
) -> Result<Vec<PatientRecord>, String> {
    state.require_session().map_err(|e| e.to_string())?;

    let scope = state.view.refresh_scope();
    state
        .patients
        .load(state.api(), &scope, false)
        .map_err(|e| e.to_string())?;

    Ok(state.patients.snapshot().as_ref().clone())
}

/// Silent refresh: keeps the current table on failure, emits
/// `patients-refreshed` on success. Returns the record count.
#[tauri::command]
pub fn refresh_patients(state: State<'_, Arc<CoreState>>) -> Result<usize, String> {
    state.require_session().map_err(|e| e.to_string())?;

    let scope = state.view.refresh_scope();
    let count = state
        .patients
        .load(state.api(), &scope, true)
        .map_err(|e| e.to_string())?;
    state.notify_refreshed();
    Ok(count)
}

/// Whether a loud patient fetch is in flight.
#[tauri::command]
pub fn patients_loading(state: State<'_, Arc<CoreState>>) -> bool {
    state.patients.is_loading()
}
