use std::path::Path;
use std::sync::RwLock;

use serde::Serialize;

use super::error::ApiError;
use super::types::*;
use super::BackendApi;
use crate::models::{BatchCallReport, CallResult, CallStatusEntry, PatientRecord, UploadDescriptor};

/// Request timeout for ordinary API calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Uploads get a longer window — spreadsheet parsing happens server-side.
const UPLOAD_TIMEOUT_SECS: u64 = 120;

// ═══════════════════════════════════════════════════════════
// BackendClient
// ═══════════════════════════════════════════════════════════

/// Blocking HTTP client for the billing backend.
pub struct BackendClient {
    base_url: String,
    client: reqwest::blocking::Client,
    upload_client: reqwest::blocking::Client,
    /// Bearer token, set after login and cleared on logout.
    token: RwLock<Option<String>>,
}

impl BackendClient {
    /// Create a client against `base_url`.
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        let upload_client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            upload_client,
            token: RwLock::new(None),
        }
    }

    /// Client against the configured backend (env override or local default).
    pub fn from_env() -> Self {
        Self::new(&crate::config::backend_base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Install the bearer token used on subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_connect() {
            ApiError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            ApiError::Timeout(REQUEST_TIMEOUT_SECS)
        } else {
            ApiError::Decode(e.to_string())
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::blocking::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Http { status: status.as_u16(), body });
        }
        response.json().map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut req = self.client.get(self.url(path)).query(query);
        if let Some(token) = self.bearer() {
            req = req.bearer_auth(token);
        }
        let response = req.send().map_err(|e| self.send_error(e))?;
        Self::decode(response)
    }

    fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let mut req = self.client.post(self.url(path)).json(body);
        if let Some(token) = self.bearer() {
            req = req.bearer_auth(token);
        }
        let response = req.send().map_err(|e| self.send_error(e))?;
        Self::decode(response)
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SingleCallRequest<'a> {
    phone: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    invoice_number: &'a str,
}

#[derive(Serialize)]
struct BatchCallRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    upload_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
}

#[derive(Serialize)]
struct StatusCheckRequest<'a> {
    phones: &'a [String],
}

impl BackendApi for BackendClient {
    fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.post("/api/auth/login", &LoginRequest { email, password })
    }

    fn set_auth_token(&self, token: Option<String>) {
        self.set_token(token);
    }

    fn fetch_patients(&self, scope: &PatientScope) -> Result<Vec<PatientRecord>, ApiError> {
        let query: Vec<(&str, String)> = match scope {
            PatientScope::All => vec![],
            PatientScope::Upload(id) => vec![("upload_id", id.to_string())],
            PatientScope::Filename(name) => vec![("filename", name.clone())],
        };
        let envelope: PatientsEnvelope = self.get("/api/patients", &query)?;
        Ok(envelope.patients)
    }

    fn fetch_uploads(&self) -> Result<Vec<UploadDescriptor>, ApiError> {
        let envelope: FilesEnvelope = self.get("/api/uploads", &[])?;
        Ok(envelope.files)
    }

    fn upload_spreadsheet(&self, path: &Path, filename: &str) -> Result<UploadResponse, ApiError> {
        let bytes = std::fs::read(path)?;
        let part = reqwest::blocking::multipart::Part::bytes(bytes)
            .file_name(filename.to_string());
        let form = reqwest::blocking::multipart::Form::new().part("file", part);

        let mut req = self.upload_client.post(self.url("/api/uploads")).multipart(form);
        if let Some(token) = self.bearer() {
            req = req.bearer_auth(token);
        }
        let response = req.send().map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(UPLOAD_TIMEOUT_SECS)
            } else {
                self.send_error(e)
            }
        })?;
        Self::decode(response)
    }

    fn trigger_call(&self, patient: &PatientRecord) -> Result<CallResult, ApiError> {
        let envelope: SingleCallEnvelope = self.post(
            "/api/calls",
            &SingleCallRequest {
                phone: &patient.phone,
                first_name: &patient.first_name,
                last_name: &patient.last_name,
                invoice_number: &patient.invoice_number,
            },
        )?;
        Ok(envelope.result)
    }

    fn trigger_batch(&self, scope: &BatchScope) -> Result<BatchCallReport, ApiError> {
        let body = match scope {
            BatchScope::Upload(id) => BatchCallRequest { upload_id: Some(*id), filename: None },
            BatchScope::Filename(name) => {
                BatchCallRequest { upload_id: None, filename: Some(name) }
            }
        };
        let envelope: BatchEnvelope = self.post("/api/calls/batch", &body)?;
        Ok(envelope.results)
    }

    fn check_call_statuses(&self, phones: &[String]) -> Result<Vec<CallStatusEntry>, ApiError> {
        let envelope: StatusesEnvelope =
            self.post("/api/calls/status", &StatusCheckRequest { phones })?;
        Ok(envelope.statuses)
    }
}

// ═══════════════════════════════════════════════════════════
// MockBackend — scripted backend for tests
// ═══════════════════════════════════════════════════════════

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted backend for tests. Successive patient fetches and status checks
/// walk a script, repeating the final snapshot once exhausted; counters
/// record how many calls were made.
#[derive(Default)]
pub struct MockBackend {
    login_response: Mutex<Option<LoginResponse>>,
    patients_script: Mutex<VecDeque<Vec<PatientRecord>>>,
    last_patients: Mutex<Vec<PatientRecord>>,
    uploads: Mutex<Vec<UploadDescriptor>>,
    upload_response: Mutex<Option<UploadResponse>>,
    single_result: Mutex<Option<CallResult>>,
    batch_report: Mutex<BatchCallReport>,
    statuses_script: Mutex<VecDeque<Vec<CallStatusEntry>>>,
    last_statuses: Mutex<Vec<CallStatusEntry>>,
    fail_fetches: AtomicBool,
    pub fetch_count: AtomicUsize,
    pub status_check_count: AtomicUsize,
    pub trigger_count: AtomicUsize,
    pub batch_count: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_login(self, response: LoginResponse) -> Self {
        *self.login_response.lock().unwrap() = Some(response);
        self
    }

    pub fn with_patients(self, patients: Vec<PatientRecord>) -> Self {
        *self.last_patients.lock().unwrap() = patients;
        self
    }

    /// Queue a snapshot returned by one future fetch.
    pub fn push_patients(&self, patients: Vec<PatientRecord>) {
        self.patients_script.lock().unwrap().push_back(patients);
    }

    pub fn with_uploads(self, uploads: Vec<UploadDescriptor>) -> Self {
        *self.uploads.lock().unwrap() = uploads;
        self
    }

    pub fn with_upload_response(self, response: UploadResponse) -> Self {
        *self.upload_response.lock().unwrap() = Some(response);
        self
    }

    pub fn with_single_result(self, result: CallResult) -> Self {
        *self.single_result.lock().unwrap() = Some(result);
        self
    }

    pub fn with_batch_report(self, report: BatchCallReport) -> Self {
        *self.batch_report.lock().unwrap() = report;
        self
    }

    pub fn push_statuses(&self, statuses: Vec<CallStatusEntry>) {
        self.statuses_script.lock().unwrap().push_back(statuses);
    }

    /// Make every subsequent fetch fail with a connection error.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::Relaxed);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }
}

impl BackendApi for MockBackend {
    fn login(&self, _email: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        self.login_response
            .lock()
            .unwrap()
            .clone()
            .ok_or(ApiError::Unauthorized)
    }

    fn fetch_patients(&self, _scope: &PatientScope) -> Result<Vec<PatientRecord>, ApiError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_fetches.load(Ordering::Relaxed) {
            return Err(ApiError::Connection("mock".into()));
        }
        if let Some(next) = self.patients_script.lock().unwrap().pop_front() {
            *self.last_patients.lock().unwrap() = next.clone();
            return Ok(next);
        }
        Ok(self.last_patients.lock().unwrap().clone())
    }

    fn fetch_uploads(&self) -> Result<Vec<UploadDescriptor>, ApiError> {
        Ok(self.uploads.lock().unwrap().clone())
    }

    fn upload_spreadsheet(
        &self,
        _path: &Path,
        filename: &str,
    ) -> Result<UploadResponse, ApiError> {
        self.upload_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Http {
                status: 400,
                body: format!("no upload scripted for {filename}"),
            })
    }

    fn trigger_call(&self, patient: &PatientRecord) -> Result<CallResult, ApiError> {
        self.trigger_count.fetch_add(1, Ordering::Relaxed);
        self.single_result
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Http {
                status: 500,
                body: format!("no call scripted for {}", patient.phone),
            })
    }

    fn trigger_batch(&self, _scope: &BatchScope) -> Result<BatchCallReport, ApiError> {
        self.batch_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.batch_report.lock().unwrap().clone())
    }

    fn check_call_statuses(&self, _phones: &[String]) -> Result<Vec<CallStatusEntry>, ApiError> {
        self.status_check_count.fetch_add(1, Ordering::Relaxed);
        if let Some(next) = self.statuses_script.lock().unwrap().pop_front() {
            *self.last_statuses.lock().unwrap() = next.clone();
            return Ok(next);
        }
        Ok(self.last_statuses.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = BackendClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn token_can_be_set_and_cleared() {
        let client = BackendClient::new("http://localhost:8000");
        assert!(client.bearer().is_none());
        client.set_token(Some("tok".into()));
        assert_eq!(client.bearer().as_deref(), Some("tok"));
        client.set_token(None);
        assert!(client.bearer().is_none());
    }

    #[test]
    fn mock_walks_patient_script_then_repeats_last() {
        let mock = MockBackend::new();
        mock.push_patients(vec![]);
        mock.push_patients(vec![crate::models::PatientRecord {
            first_name: "Ana".into(),
            last_name: "Ruiz".into(),
            phone: "5551112222".into(),
            invoice_number: "B-14".into(),
            outstanding_amount: 50.0,
            estimated_date: None,
            call_status: crate::models::CallStatus::Completed,
            notes: None,
            call_history: vec![],
            upload_id: None,
        }]);

        assert!(mock.fetch_patients(&PatientScope::All).unwrap().is_empty());
        assert_eq!(mock.fetch_patients(&PatientScope::All).unwrap().len(), 1);
        // Script exhausted: the last snapshot repeats
        assert_eq!(mock.fetch_patients(&PatientScope::All).unwrap().len(), 1);
        assert_eq!(mock.fetches(), 3);
    }

    #[test]
    fn mock_fetch_failure_still_counts() {
        let mock = MockBackend::new();
        mock.set_fail_fetches(true);
        assert!(mock.fetch_patients(&PatientScope::All).is_err());
        assert_eq!(mock.fetches(), 1);
    }
}
