//! Core data model: patient/invoice records, upload descriptors and the
//! call wire types exchanged with the billing backend.

pub mod call;
pub mod patient;
pub mod upload;

pub use call::{BatchCallReport, CallResult, CallStatusEntry};
pub use patient::{CallStatus, PatientRecord};
pub use upload::{most_recent_for_filename, UploadDescriptor};
