//! File upload controller.
//!
//! Normalizes the spreadsheet filename, submits it to the backend and
//! shapes the result for the UI. Per-row import errors are non-fatal: the
//! upload still counts as successful and the row errors become a delayed
//! notice so they don't visually collide with the success message.

use std::path::Path;

use serde::Serialize;

use crate::api::types::RowError;
use crate::api::{ApiError, BackendApi};

/// How long the UI waits before showing row-error summaries.
pub const ROW_ERROR_DELAY_MS: u64 = 1000;

/// At most this many row errors are summarized.
const MAX_ERROR_LINES: usize = 3;

/// Each summary line is cut to this many characters.
const MAX_LINE_CHARS: usize = 50;

/// Errors from the upload flow.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Selected path has no usable filename")]
    MissingFilename,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A notice the UI should display after `delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayedNotice {
    pub delay_ms: u64,
    pub lines: Vec<String>,
}

/// Result of a successful spreadsheet upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub upload_id: i64,
    /// Filename as the server recorded it.
    pub server_filename: String,
    pub total_rows: u32,
    pub imported_count: u32,
    /// Delayed row-error summary, when the backend reported any.
    pub row_error_notice: Option<DelayedNotice>,
}

/// Submit a spreadsheet. The caller is expected to reload the files list
/// and patient data scoped to the returned upload id afterwards.
pub fn submit_spreadsheet(
    api: &dyn BackendApi,
    path: &Path,
) -> Result<UploadOutcome, UploadError> {
    let raw_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(UploadError::MissingFilename)?;
    let filename = sanitize_filename(raw_name);
    if filename.is_empty() {
        return Err(UploadError::MissingFilename);
    }

    let response = api.upload_spreadsheet(path, &filename)?;

    let row_error_notice = if response.errors.is_empty() {
        None
    } else {
        Some(DelayedNotice {
            delay_ms: ROW_ERROR_DELAY_MS,
            lines: summarize_row_errors(&response.errors),
        })
    };

    tracing::info!(
        upload_id = response.upload_id,
        filename = %response.filename,
        imported = response.imported_count,
        row_errors = response.errors.len(),
        "Spreadsheet uploaded"
    );

    Ok(UploadOutcome {
        upload_id: response.upload_id,
        server_filename: response.filename,
        total_rows: response.total_rows,
        imported_count: response.imported_count,
        row_error_notice,
    })
}

/// Normalize a filename for upload: trim, collapse whitespace runs, strip
/// trailing duplicate counters like `(1)` before the extension, preserve
/// the extension.
pub fn sanitize_filename(name: &str) -> String {
    let (stem, ext) = match name.rfind('.') {
        // A leading dot is a hidden file, not an extension separator.
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx..])),
        _ => (name, None),
    };

    let mut stem = collapse_whitespace(stem);
    loop {
        let stripped = strip_trailing_counter(&stem);
        if stripped == stem {
            break;
        }
        stem = stripped;
    }

    match ext {
        Some(ext) => format!("{}{}", stem, ext.trim()),
        None => stem,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove one trailing `(N)` counter, e.g. `report (2)` -> `report`.
fn strip_trailing_counter(stem: &str) -> String {
    let trimmed = stem.trim_end();
    if !trimmed.ends_with(')') {
        return trimmed.to_string();
    }
    let Some(open) = trimmed.rfind('(') else {
        return trimmed.to_string();
    };
    let inner = &trimmed[open + 1..trimmed.len() - 1];
    if inner.is_empty() || !inner.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }
    trimmed[..open].trim_end().to_string()
}

/// First few row errors, each cut to a displayable length.
pub fn summarize_row_errors(errors: &[RowError]) -> Vec<String> {
    errors
        .iter()
        .take(MAX_ERROR_LINES)
        .map(|e| {
            let line = match e.row {
                Some(row) => format!("Row {}: {}", row, e.message),
                None => e.message.clone(),
            };
            truncate_chars(&line, MAX_LINE_CHARS)
        })
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}
