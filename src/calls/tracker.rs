//! Active-call tracker.
//!
//! Maps a composite patient identity to the moment its call was
//! dispatched. Entries leave the map when the record's status turns
//! terminal or after a 10-minute absolute timeout, whichever comes first.
//! The map is a copy-on-write snapshot: writers clone-and-swap under a
//! short lock so a timer callback and a user action can never lose each
//! other's updates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{patient::identity_key, CallResult, PatientRecord};

/// Absolute timeout for an in-flight call entry.
pub const CALL_TIMEOUT_MINUTES: i64 = 10;

/// One call believed to be in flight.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCall {
    pub phone: String,
    pub started_at: DateTime<Utc>,
    /// Telephony session id, when the backend reported one.
    pub call_session_id: Option<String>,
}

/// Copy-on-write map of in-flight calls keyed by composite identity
/// (falling back to the raw phone number for unmatched batch results).
pub struct ActiveCallTracker {
    entries: RwLock<Arc<HashMap<String, ActiveCall>>>,
}

impl ActiveCallTracker {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Current snapshot of tracked calls.
    pub fn snapshot(&self) -> Arc<HashMap<String, ActiveCall>> {
        self.entries
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshot().contains_key(key)
    }

    /// Phone numbers of all tracked calls (for the status endpoint).
    pub fn phones(&self) -> Vec<String> {
        let mut phones: Vec<String> =
            self.snapshot().values().map(|c| c.phone.clone()).collect();
        phones.sort();
        phones.dedup();
        phones
    }

    /// Track a dispatched call. Re-dispatching the same identity replaces
    /// the entry (keys are unique per identity).
    pub fn insert(&self, key: &str, call: ActiveCall) {
        self.mutate(|map| {
            map.insert(key.to_string(), call);
        });
    }

    pub fn remove(&self, key: &str) {
        self.mutate(|map| {
            map.remove(key);
        });
    }

    /// Drop everything (poller exit, logout).
    pub fn clear(&self) {
        self.mutate(HashMap::clear);
    }

    /// Drop every entry whose matching record now shows a terminal status.
    /// Entries match their record by composite identity key, or by phone
    /// for entries seeded without a known patient. Returns how many were
    /// removed.
    pub fn reconcile(&self, records: &[PatientRecord]) -> usize {
        let before = self.len();
        self.mutate(|map| {
            map.retain(|key, call| {
                let record = records
                    .iter()
                    .find(|r| &r.identity_key() == key || phone_eq(&r.phone, &call.phone));
                match record {
                    Some(r) => !r.call_status.is_terminal(),
                    None => true,
                }
            });
        });
        before - self.len()
    }

    /// Drop entries older than the absolute timeout. Returns how many
    /// were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::minutes(CALL_TIMEOUT_MINUTES);
        let before = self.len();
        self.mutate(|map| {
            map.retain(|_, call| call.started_at > cutoff);
        });
        let removed = before - self.len();
        if removed > 0 {
            tracing::debug!(removed, "Pruned timed-out call entries");
        }
        removed
    }

    /// Seed the tracker from a batch dispatch: every call the backend
    /// reports as successfully dispatched gets an entry, keyed by the
    /// matching patient's composite identity where one is known, else by
    /// the raw phone number.
    pub fn seed_from_batch(
        &self,
        calls: &[CallResult],
        patients: &[PatientRecord],
        now: DateTime<Utc>,
    ) -> usize {
        let mut seeded = 0;
        self.mutate(|map| {
            for call in calls.iter().filter(|c| c.dispatched()) {
                let key = patients
                    .iter()
                    .find(|p| p.matches_call(&call.phone, &call.first_name, &call.last_name))
                    .map(|p| p.identity_key())
                    .unwrap_or_else(|| {
                        identity_key(&call.phone, "", &call.first_name, &call.last_name)
                    });
                map.insert(
                    key,
                    ActiveCall {
                        phone: call.phone.clone(),
                        started_at: now,
                        call_session_id: call.call_session_id.clone(),
                    },
                );
                seeded += 1;
            }
        });
        seeded
    }

    fn mutate(&self, f: impl FnOnce(&mut HashMap<String, ActiveCall>)) {
        if let Ok(mut guard) = self.entries.write() {
            let mut next = (**guard).clone();
            f(&mut next);
            *guard = Arc::new(next);
        }
    }
}

impl Default for ActiveCallTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn phone_eq(a: &str, b: &str) -> bool {
    a.trim() == b.trim() && !a.trim().is_empty()
}
