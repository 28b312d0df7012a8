use serde::{Deserialize, Serialize};

use crate::models::{BatchCallReport, CallResult, CallStatusEntry, PatientRecord, UploadDescriptor};
use crate::session::UserAccount;

/// Which patient set to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientScope {
    /// Every patient the backend knows about.
    All,
    /// Patients belonging to one numeric upload.
    Upload(i64),
    /// Patients for the most recent upload of a filename (superseded path,
    /// kept for backends that predate numeric upload ids).
    Filename(String),
}

/// Which population a batch call targets. Upload id and filename are
/// mutually exclusive; callers resolve precedence before building this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchScope {
    Upload(i64),
    Filename(String),
}

/// Response from the auth endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserAccount,
}

/// One row the backend could not import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    #[serde(default)]
    pub row: Option<u32>,
    pub message: String,
}

/// Response from the spreadsheet upload endpoint. Per-row errors are
/// non-fatal: the upload as a whole still succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub upload_id: i64,
    pub filename: String,
    #[serde(default)]
    pub total_rows: u32,
    #[serde(default)]
    pub imported_count: u32,
    #[serde(default)]
    pub errors: Vec<RowError>,
}

// ── Wire envelopes ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PatientsEnvelope {
    #[serde(default)]
    pub patients: Vec<PatientRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FilesEnvelope {
    #[serde(default)]
    pub files: Vec<UploadDescriptor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchEnvelope {
    #[serde(default)]
    pub results: BatchCallReport,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusesEnvelope {
    #[serde(default)]
    pub statuses: Vec<CallStatusEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SingleCallEnvelope {
    pub result: CallResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patients_envelope_decodes() {
        let env: PatientsEnvelope = serde_json::from_str(
            r#"{"patients":[{"first_name":"Ana","last_name":"Ruiz","phone":"5551112222","invoice_number":"B-14"}]}"#,
        )
        .unwrap();
        assert_eq!(env.patients.len(), 1);
        assert_eq!(env.patients[0].first_name, "Ana");
    }

    #[test]
    fn batch_envelope_defaults_when_results_missing() {
        let env: BatchEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(env.results.total_attempted, 0);
    }

    #[test]
    fn upload_response_tolerates_missing_errors() {
        let resp: UploadResponse = serde_json::from_str(
            r#"{"upload_id":7,"filename":"march.csv","total_rows":40,"imported_count":40}"#,
        )
        .unwrap();
        assert!(resp.errors.is_empty());
    }
}
