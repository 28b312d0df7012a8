//! Patient data store.
//!
//! Holds the currently displayed patient/invoice records as a copy-on-write
//! snapshot. Both user actions and poll workers read and replace the
//! snapshot; nobody mutates it in place, so interleaved callbacks can never
//! lose updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::api::{ApiError, BackendApi, PatientScope};
use crate::models::{CallStatus, PatientRecord};

/// Shared store of displayed patient records plus a loading flag.
pub struct PatientStore {
    records: RwLock<Arc<Vec<PatientRecord>>>,
    loading: AtomicBool,
}

impl PatientStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Arc::new(Vec::new())),
            loading: AtomicBool::new(false),
        }
    }

    /// Current snapshot. Cheap to clone; never mutated in place.
    pub fn snapshot(&self) -> Arc<Vec<PatientRecord>> {
        self.records
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_default()
    }

    /// Whether a non-silent load is in flight (drives the table spinner).
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    /// Replace the record set wholesale.
    pub fn replace(&self, records: Vec<PatientRecord>) {
        if let Ok(mut guard) = self.records.write() {
            *guard = Arc::new(records);
        }
    }

    /// Empty the record set (loud-load failure path).
    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    /// Fetch and replace the record set.
    ///
    /// `silent = true` (background polling): no loading flag; a fetch
    /// failure propagates to the caller and the current records stay put.
    ///
    /// `silent = false` (user action): the loading flag is held for the
    /// duration; a fetch failure clears the record set — no retry, the
    /// display simply empties — and the error still returns so the command
    /// boundary can surface a message.
    pub fn load(
        &self,
        api: &dyn BackendApi,
        scope: &PatientScope,
        silent: bool,
    ) -> Result<usize, ApiError> {
        if !silent {
            self.loading.store(true, Ordering::Relaxed);
        }
        let result = api.fetch_patients(scope);
        if !silent {
            self.loading.store(false, Ordering::Relaxed);
        }

        match result {
            Ok(records) => {
                let count = records.len();
                self.replace(records);
                Ok(count)
            }
            Err(e) => {
                if !silent {
                    tracing::warn!(error = %e, "Patient load failed, clearing display");
                    self.clear();
                }
                Err(e)
            }
        }
    }

    /// Find a record by composite identity key in the current snapshot.
    pub fn find_by_identity(&self, key: &str) -> Option<PatientRecord> {
        self.snapshot()
            .iter()
            .find(|r| r.identity_key() == key)
            .cloned()
    }

    /// Last-known call status for a composite identity, if the record is
    /// currently displayed.
    pub fn status_of(&self, key: &str) -> Option<CallStatus> {
        self.find_by_identity(key).map(|r| r.call_status)
    }
}

impl Default for PatientStore {
    fn default() -> Self {
        Self::new()
    }
}
