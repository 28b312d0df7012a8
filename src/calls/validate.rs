//! Client-side preconditions for call dispatch.
//!
//! These are hard gates: a call is never sent to the backend unless the
//! phone and invoice pass. Spreadsheets frequently carry the literal
//! string "nan" where a cell was empty, so that placeholder counts as
//! missing, not as a value.

use crate::models::PatientRecord;

/// Minimum digit count for a dialable phone number.
const MIN_PHONE_DIGITS: usize = 10;

/// Placeholder that spreadsheet tooling writes into empty cells.
const NAN_PLACEHOLDER: &str = "nan";

/// Validation failures, phrased for direct display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No phone number on file for this patient")]
    PhoneMissing,
    #[error("Phone number has only {0} digits — at least 10 required")]
    PhoneTooShort(usize),
    #[error("No invoice number on file for this patient")]
    InvoiceMissing,
}

/// Validate a raw phone value: present, not the "nan" placeholder, and at
/// least 10 digits after stripping everything that isn't a digit.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let trimmed = phone.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NAN_PLACEHOLDER) {
        return Err(ValidationError::PhoneMissing);
    }
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    if digits < MIN_PHONE_DIGITS {
        return Err(ValidationError::PhoneTooShort(digits));
    }
    Ok(())
}

/// Validate an invoice number: present and not the "nan" placeholder.
pub fn validate_invoice(invoice: &str) -> Result<(), ValidationError> {
    let trimmed = invoice.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NAN_PLACEHOLDER) {
        return Err(ValidationError::InvoiceMissing);
    }
    Ok(())
}

/// Both preconditions for a single-call trigger.
pub fn validate_call_preconditions(patient: &PatientRecord) -> Result<(), ValidationError> {
    validate_phone(&patient.phone)?;
    validate_invoice(&patient.invoice_number)?;
    Ok(())
}
