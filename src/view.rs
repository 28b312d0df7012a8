//! Navigation and upload-selection state.
//!
//! Tracks which top-level section the frontend is showing and which
//! upload (by numeric id and/or filename) the data views are scoped to.
//! The two selection fields stay consistent: selecting an upload id
//! derives its filename from the known upload history, and selecting a
//! filename resolves to that filename's most recent upload id.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::api::PatientScope;
use crate::local_store::{LocalStore, KEY_NAV_SECTION, KEY_SELECTED_FILENAME};
use crate::models::{most_recent_for_filename, UploadDescriptor};

/// Top-level sections of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavSection {
    #[default]
    Dashboard,
    Upload,
    Invoices,
    Users,
}

impl NavSection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Upload => "upload",
            Self::Invoices => "invoices",
            Self::Users => "users",
        }
    }

    /// Parse a stored section name. Unknown values fall back to the
    /// dashboard rather than erroring: the store is our own write, but a
    /// renamed section between versions should not break startup.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "upload" => Self::Upload,
            "invoices" => Self::Invoices,
            "users" => Self::Users,
            _ => Self::Dashboard,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Selection {
    nav: NavSection,
    upload_id: Option<i64>,
    filename: Option<String>,
}

/// Shared view state. Interior mutability so IPC commands can update it
/// through a shared reference, like the other core stores.
pub struct ViewState {
    inner: RwLock<Selection>,
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Selection::default()),
        }
    }

    pub fn nav(&self) -> NavSection {
        self.read().nav
    }

    pub fn set_nav(&self, section: NavSection) {
        if let Ok(mut guard) = self.inner.write() {
            guard.nav = section;
        }
    }

    /// Whether the upload section is the one currently showing. The
    /// auto-refresh poller only keeps running on this view.
    pub fn on_upload_view(&self) -> bool {
        self.nav() == NavSection::Upload
    }

    pub fn selected_upload_id(&self) -> Option<i64> {
        self.read().upload_id
    }

    pub fn selected_filename(&self) -> Option<String> {
        self.read().filename.clone()
    }

    /// Select an upload by id, deriving the filename from the known
    /// history. An id with no descriptor clears the filename so the two
    /// fields never disagree.
    pub fn select_upload(&self, id: i64, uploads: &[UploadDescriptor]) {
        let filename = uploads
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.filename.clone());
        if let Ok(mut guard) = self.inner.write() {
            guard.upload_id = Some(id);
            guard.filename = filename;
        }
    }

    /// Select by filename, resolving to that filename's most recent
    /// upload id. A filename absent from the history leaves the id empty.
    pub fn select_filename(&self, filename: &str, uploads: &[UploadDescriptor]) {
        let id = most_recent_for_filename(uploads, filename).map(|u| u.id);
        if let Ok(mut guard) = self.inner.write() {
            guard.filename = Some(filename.to_string());
            guard.upload_id = id;
        }
    }

    pub fn clear_selection(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.upload_id = None;
            guard.filename = None;
        }
    }

    /// Which population patient fetches should target: the selected
    /// upload id, else the selected filename, else everything.
    pub fn refresh_scope(&self) -> PatientScope {
        let guard = self.read();
        if let Some(id) = guard.upload_id {
            return PatientScope::Upload(id);
        }
        match &guard.filename {
            Some(f) => PatientScope::Filename(f.clone()),
            None => PatientScope::All,
        }
    }

    /// Restore nav section and filename selection from the local store.
    /// The upload id is not persisted; it is re-derived once the upload
    /// history is fetched.
    pub fn hydrate(&self, store: &LocalStore) {
        if let Ok(mut guard) = self.inner.write() {
            if let Some(raw) = store.get(KEY_NAV_SECTION) {
                guard.nav = NavSection::parse(raw);
            }
            guard.filename = store.get(KEY_SELECTED_FILENAME).map(str::to_string);
        }
    }

    /// Persist nav section and filename selection.
    pub fn persist(&self, store: &mut LocalStore) -> Result<(), crate::local_store::StoreError> {
        let (nav, filename) = {
            let guard = self.read();
            (guard.nav, guard.filename.clone())
        };
        store.set(KEY_NAV_SECTION, nav.as_str())?;
        match filename {
            Some(f) => store.set(KEY_SELECTED_FILENAME, &f)?,
            None => store.remove(KEY_SELECTED_FILENAME)?,
        }
        Ok(())
    }

    fn read(&self) -> Selection {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn upload(id: i64, filename: &str, ts: &str) -> UploadDescriptor {
        UploadDescriptor {
            id,
            filename: filename.into(),
            uploaded_at: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
                .unwrap()
                .and_utc(),
            patient_count: 5,
        }
    }

    #[test]
    fn nav_round_trips_through_strings() {
        for section in [
            NavSection::Dashboard,
            NavSection::Upload,
            NavSection::Invoices,
            NavSection::Users,
        ] {
            assert_eq!(NavSection::parse(section.as_str()), section);
        }
        assert_eq!(NavSection::parse("bogus"), NavSection::Dashboard);
    }

    #[test]
    fn selecting_upload_derives_filename() {
        let view = ViewState::new();
        let uploads = vec![upload(3, "march.csv", "2026-03-01 09:00:00")];

        view.select_upload(3, &uploads);
        assert_eq!(view.selected_upload_id(), Some(3));
        assert_eq!(view.selected_filename().as_deref(), Some("march.csv"));
    }

    #[test]
    fn selecting_unknown_upload_clears_filename() {
        let view = ViewState::new();
        let uploads = vec![upload(3, "march.csv", "2026-03-01 09:00:00")];
        view.select_upload(3, &uploads);

        view.select_upload(99, &uploads);
        assert_eq!(view.selected_upload_id(), Some(99));
        assert!(view.selected_filename().is_none());
    }

    #[test]
    fn selecting_filename_resolves_most_recent_id() {
        let view = ViewState::new();
        let uploads = vec![
            upload(1, "march.csv", "2026-03-01 09:00:00"),
            upload(2, "march.csv", "2026-03-04 09:00:00"),
        ];

        view.select_filename("march.csv", &uploads);
        assert_eq!(view.selected_upload_id(), Some(2));
    }

    #[test]
    fn refresh_scope_prefers_upload_id() {
        let view = ViewState::new();
        assert_eq!(view.refresh_scope(), PatientScope::All);

        let uploads = vec![upload(4, "a.csv", "2026-03-01 09:00:00")];
        view.select_filename("a.csv", &uploads);
        assert_eq!(view.refresh_scope(), PatientScope::Upload(4));

        view.clear_selection();
        assert_eq!(view.refresh_scope(), PatientScope::All);
    }

    #[test]
    fn filename_without_history_scopes_by_filename() {
        let view = ViewState::new();
        view.select_filename("orphan.csv", &[]);
        assert!(view.selected_upload_id().is_none());
        assert_eq!(
            view.refresh_scope(),
            PatientScope::Filename("orphan.csv".into())
        );
    }

    #[test]
    fn hydrate_and_persist_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("state.json"));

        let view = ViewState::new();
        view.set_nav(NavSection::Upload);
        view.select_filename("march.csv", &[]);
        view.persist(&mut store).unwrap();

        let restored = ViewState::new();
        restored.hydrate(&store);
        assert_eq!(restored.nav(), NavSection::Upload);
        assert_eq!(restored.selected_filename().as_deref(), Some("march.csv"));
        assert!(restored.selected_upload_id().is_none());
    }
}
