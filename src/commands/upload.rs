//! Spreadsheet upload and upload-history commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tauri::State;

use crate::core_state::{CoreState, EVENT_UPLOAD_NOTICE};
use crate::models::UploadDescriptor;
use crate::upload::{submit_spreadsheet, UploadOutcome};

/// Upload a billing spreadsheet. On success the new upload becomes the
/// active selection and patient data is reloaded scoped to it; row-error
/// summaries are emitted as a delayed `upload-notice` event so they do
/// not collide with the success toast.
#[tauri::command]
pub fn upload_spreadsheet(
    path: String,
    state: State<'_, Arc<CoreState>>,
) -> Result<UploadOutcome, String> {
    state.require_session().map_err(|e| e.to_string())?;
    if path.trim().is_empty() {
        return Err("No file selected".into());
    }

    let outcome =
        submit_spreadsheet(state.api(), &PathBuf::from(path)).map_err(|e| e.to_string())?;

    state
        .finish_upload(outcome.upload_id)
        .map_err(|e| e.to_string())?;

    if let Some(notice) = outcome.row_error_notice.clone() {
        let core = Arc::clone(state.inner());
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(notice.delay_ms));
            core.emit(
                EVENT_UPLOAD_NOTICE,
                serde_json::json!({ "lines": notice.lines }),
            );
        });
    }

    Ok(outcome)
}

/// Upload history, most recent first as the backend reports it.
#[tauri::command]
pub fn list_uploads(
    state: State<'_, Arc<CoreState>>,
) -> Result<Vec<UploadDescriptor>, String> {
    state.require_session().map_err(|e| e.to_string())?;
    state.api().fetch_uploads().map_err(|e| e.to_string())
}

/// Scope the data views to one upload by id.
#[tauri::command]
pub fn select_upload(id: i64, state: State<'_, Arc<CoreState>>) -> Result<(), String> {
    state.select_upload(id).map_err(|e| e.to_string())
}

/// Scope the data views to the most recent upload of a filename.
#[tauri::command]
pub fn select_filename(
    filename: String,
    state: State<'_, Arc<CoreState>>,
) -> Result<(), String> {
    if filename.trim().is_empty() {
        return Err("Filename is required".into());
    }
    state.select_filename(filename.trim()).map_err(|e| e.to_string())
}
