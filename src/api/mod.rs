//! Backend REST client.
//!
//! The dashboard owns no real work — upload parsing, persistence and
//! telephony all live in the backend service. This module is the typed
//! boundary to it: a blocking reqwest client behind the [`BackendApi`]
//! trait so stores, triggers and pollers can be tested against a
//! scripted mock.

pub mod client;
pub mod error;
pub mod types;

pub use client::{BackendClient, MockBackend};
pub use error::ApiError;
pub use types::{BatchScope, LoginResponse, PatientScope, UploadResponse};

use std::path::Path;

use crate::models::{BatchCallReport, CallResult, CallStatusEntry, PatientRecord, UploadDescriptor};

/// Seam between the application core and the billing backend.
pub trait BackendApi: Send + Sync {
    /// Exchange credentials for tokens and the user object.
    fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// Install (or clear) the bearer token used on subsequent requests.
    /// Mocks ignore this.
    fn set_auth_token(&self, _token: Option<String>) {}

    /// Fetch patient records: all, by upload id, or by filename.
    fn fetch_patients(&self, scope: &PatientScope) -> Result<Vec<PatientRecord>, ApiError>;

    /// Fetch the upload history.
    fn fetch_uploads(&self) -> Result<Vec<UploadDescriptor>, ApiError>;

    /// Submit a billing spreadsheet (multipart).
    fn upload_spreadsheet(&self, path: &Path, filename: &str) -> Result<UploadResponse, ApiError>;

    /// Trigger one automated call for a patient.
    fn trigger_call(&self, patient: &PatientRecord) -> Result<CallResult, ApiError>;

    /// Trigger a batch of calls scoped to an upload or a filename.
    fn trigger_batch(&self, scope: &BatchScope) -> Result<BatchCallReport, ApiError>;

    /// Lightweight status check for a set of phone numbers.
    fn check_call_statuses(&self, phones: &[String]) -> Result<Vec<CallStatusEntry>, ApiError>;
}
