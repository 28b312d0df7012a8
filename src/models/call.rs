use serde::{Deserialize, Serialize};

use super::patient::CallStatus;

/// One dispatched call as reported by the batch-call endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub phone: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Telephony session id, when the provider returned one.
    #[serde(default)]
    pub call_session_id: Option<String>,
}

impl CallResult {
    /// The backend marks dispatched calls "success"; anything else was
    /// rejected before the telephony provider was reached.
    pub fn dispatched(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// Summary envelope of a batch-call dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchCallReport {
    #[serde(default)]
    pub total_attempted: u32,
    #[serde(default)]
    pub total_patients: u32,
    /// Rows excluded by business rule: outstanding ≤ $0.01 or estimated
    /// date in the future.
    #[serde(default)]
    pub filtered_out_count: u32,
    #[serde(default)]
    pub calls: Vec<CallResult>,
}

/// One row from the lightweight call-status endpoint.
///
/// Older backend builds report `recent_call_status` instead of
/// `call_status`; either field satisfies the status check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStatusEntry {
    pub phone: String,
    #[serde(default)]
    pub call_status: Option<CallStatus>,
    #[serde(default)]
    pub recent_call_status: Option<CallStatus>,
}

impl CallStatusEntry {
    /// Effective status, preferring the canonical field.
    pub fn effective_status(&self) -> CallStatus {
        self.call_status
            .or(self.recent_call_status)
            .unwrap_or(CallStatus::None)
    }

    pub fn is_terminal(&self) -> bool {
        self.effective_status().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatched_matches_success_case_insensitive() {
        let mut call = CallResult {
            phone: "5551234567".into(),
            first_name: "Maria".into(),
            last_name: "Lopez".into(),
            status: "Success".into(),
            message: None,
            call_session_id: None,
        };
        assert!(call.dispatched());
        call.status = "validation_failed".into();
        assert!(!call.dispatched());
    }

    #[test]
    fn effective_status_prefers_canonical_field() {
        let entry = CallStatusEntry {
            phone: "5551234567".into(),
            call_status: Some(CallStatus::Completed),
            recent_call_status: Some(CallStatus::Pending),
        };
        assert_eq!(entry.effective_status(), CallStatus::Completed);
        assert!(entry.is_terminal());
    }

    #[test]
    fn effective_status_falls_back_to_recent() {
        let entry = CallStatusEntry {
            phone: "5551234567".into(),
            call_status: None,
            recent_call_status: Some(CallStatus::Failed),
        };
        assert_eq!(entry.effective_status(), CallStatus::Failed);
    }

    #[test]
    fn missing_both_fields_is_none() {
        let entry: CallStatusEntry =
            serde_json::from_str(r#"{"phone":"5551234567"}"#).unwrap();
        assert_eq!(entry.effective_status(), CallStatus::None);
        assert!(!entry.is_terminal());
    }

    #[test]
    fn batch_report_decodes_with_defaults() {
        let report: BatchCallReport = serde_json::from_str("{}").unwrap();
        assert_eq!(report.total_attempted, 0);
        assert!(report.calls.is_empty());
    }
}
