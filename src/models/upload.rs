use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One spreadsheet upload as reported by the backend history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadDescriptor {
    pub id: i64,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub patient_count: u32,
}

/// Resolve the most recent upload sharing `filename`.
///
/// Multiple uploads may carry the same filename; the winner is the maximum
/// `uploaded_at`. The sort is stable, so timestamp ties keep the backend's
/// original order deterministic.
pub fn most_recent_for_filename<'a>(
    uploads: &'a [UploadDescriptor],
    filename: &str,
) -> Option<&'a UploadDescriptor> {
    let mut matching: Vec<&UploadDescriptor> =
        uploads.iter().filter(|u| u.filename == filename).collect();
    matching.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    matching.first().copied()
}
