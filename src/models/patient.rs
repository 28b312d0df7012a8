use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Call lifecycle status reported by the backend for a patient record.
///
/// Unknown strings decode as `None` — older backend builds emitted ad-hoc
/// values and the dashboard must not reject a whole patient list over one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    None,
    Sent,
    Pending,
    Completed,
    Failed,
}

impl<'de> Deserialize<'de> for CallStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "sent" => Self::Sent,
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::None,
        })
    }
}

impl CallStatus {
    /// A terminal status means the call finished and will not change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sent => "sent",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One patient/invoice row as displayed in the dashboard tables.
///
/// There is no stable client-visible primary key on every backend path, so
/// matching identity is the (phone, invoice, first, last) tuple — see
/// [`PatientRecord::identity_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub invoice_number: String,
    /// Outstanding balance in dollars.
    #[serde(default)]
    pub outstanding_amount: f64,
    /// Estimated payment date, when the spreadsheet carried one.
    #[serde(default)]
    pub estimated_date: Option<NaiveDate>,
    #[serde(default)]
    pub call_status: CallStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub call_history: Vec<String>,
    /// Numeric upload this row came from, when scoped.
    #[serde(default)]
    pub upload_id: Option<i64>,
}

impl PatientRecord {
    /// Composite identity string: phone | invoice | first | last,
    /// trimmed and lowercased so cosmetic differences don't split identities.
    pub fn identity_key(&self) -> String {
        identity_key(&self.phone, &self.invoice_number, &self.first_name, &self.last_name)
    }

    /// Match on (phone, first name, last name) — the tuple batch-call
    /// results report. Invoice is deliberately excluded here.
    pub fn matches_call(&self, phone: &str, first: &str, last: &str) -> bool {
        norm(&self.phone) == norm(phone)
            && norm(&self.first_name) == norm(first)
            && norm(&self.last_name) == norm(last)
    }
}

/// Build the composite identity key from raw parts.
pub fn identity_key(phone: &str, invoice: &str, first: &str, last: &str) -> String {
    format!("{}|{}|{}|{}", norm(phone), norm(invoice), norm(first), norm(last))
}

fn norm(s: &str) -> String {
    s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(phone: &str, invoice: &str, first: &str, last: &str) -> PatientRecord {
        PatientRecord {
            first_name: first.into(),
            last_name: last.into(),
            phone: phone.into(),
            invoice_number: invoice.into(),
            outstanding_amount: 120.50,
            estimated_date: None,
            call_status: CallStatus::None,
            notes: None,
            call_history: vec![],
            upload_id: None,
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(!CallStatus::Sent.is_terminal());
        assert!(!CallStatus::Pending.is_terminal());
        assert!(!CallStatus::None.is_terminal());
    }

    #[test]
    fn unknown_status_decodes_as_none() {
        let status: CallStatus = serde_json::from_str("\"in_flight\"").unwrap();
        assert_eq!(status, CallStatus::None);
    }

    #[test]
    fn known_statuses_roundtrip() {
        for (s, expected) in [
            ("\"sent\"", CallStatus::Sent),
            ("\"pending\"", CallStatus::Pending),
            ("\"completed\"", CallStatus::Completed),
            ("\"failed\"", CallStatus::Failed),
        ] {
            let status: CallStatus = serde_json::from_str(s).unwrap();
            assert_eq!(status, expected);
            assert_eq!(serde_json::to_string(&status).unwrap(), s);
        }
    }

    #[test]
    fn identity_key_normalizes_case_and_whitespace() {
        let a = record("5551234567", "INV-9", " Maria ", "Lopez");
        let b = record(" 5551234567", "inv-9", "maria", " LOPEZ ");
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn identity_key_distinguishes_invoices() {
        let a = record("5551234567", "INV-1", "Maria", "Lopez");
        let b = record("5551234567", "INV-2", "Maria", "Lopez");
        assert_ne!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn matches_call_ignores_invoice() {
        let rec = record("5551234567", "INV-1", "Maria", "Lopez");
        assert!(rec.matches_call("5551234567", "maria", "LOPEZ"));
        assert!(!rec.matches_call("5550000000", "Maria", "Lopez"));
    }

    #[test]
    fn record_decodes_with_missing_optional_fields() {
        let rec: PatientRecord = serde_json::from_str(
            r#"{"first_name":"Ana","last_name":"Ruiz","phone":"5551112222","invoice_number":"B-14"}"#,
        )
        .unwrap();
        assert_eq!(rec.call_status, CallStatus::None);
        assert_eq!(rec.outstanding_amount, 0.0);
        assert!(rec.call_history.is_empty());
        assert!(rec.upload_id.is_none());
    }
}
