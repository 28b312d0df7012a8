//! Shared application state.
//!
//! One `CoreState` lives for the whole app, managed by the Tauri runtime
//! and handed to every IPC command. It owns the session, the persisted
//! store, the patient and active-call stores, the navigation state, the
//! calling-in-progress flag and the worker slots for the background
//! pollers. At most one auto-refresh worker and one call-watch worker
//! exist at a time; installing a new one stops and joins the old one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::api::{ApiError, BackendApi, BackendClient, PatientScope};
use crate::calls::{
    spawn_auto_refresh, spawn_call_watch, ActiveCallTracker, PollContext, PollWorker,
};
use crate::local_store::{LocalStore, StoreError};
use crate::patients::PatientStore;
use crate::session::{Session, UserAccount};
use crate::view::{NavSection, ViewState};

// ── Events emitted to the webview ───────────────────────────

pub const EVENT_PATIENTS_REFRESHED: &str = "patients-refreshed";
pub const EVENT_UPLOAD_NOTICE: &str = "upload-notice";
pub const EVENT_CALL_PROGRESS: &str = "call-progress";

/// Outbound event channel to the webview. Abstracted so the core can be
/// tested without a running Tauri app.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

/// Errors surfaced by state-level operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Not logged in")]
    NotLoggedIn,
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    api: Arc<dyn BackendApi>,
    session: RwLock<Option<Session>>,
    store: Mutex<LocalStore>,
    pub patients: PatientStore,
    pub tracker: ActiveCallTracker,
    pub view: ViewState,
    calling: AtomicBool,
    poller: Mutex<Option<PollWorker>>,
    call_watch: Mutex<Option<PollWorker>>,
    events: RwLock<Option<Arc<dyn EventSink>>>,
}

impl CoreState {
    pub fn new(api: Arc<dyn BackendApi>, store: LocalStore) -> Self {
        Self {
            api,
            session: RwLock::new(None),
            store: Mutex::new(store),
            patients: PatientStore::new(),
            tracker: ActiveCallTracker::new(),
            view: ViewState::new(),
            calling: AtomicBool::new(false),
            poller: Mutex::new(None),
            call_watch: Mutex::new(None),
            events: RwLock::new(None),
        }
    }

    /// State against the configured backend and the default store location.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(BackendClient::from_env()), LocalStore::open_default())
    }

    /// Install the webview event channel (done once during app setup).
    pub fn install_event_sink(&self, sink: Arc<dyn EventSink>) {
        if let Ok(mut guard) = self.events.write() {
            *guard = Some(sink);
        }
    }

    pub fn emit(&self, event: &str, payload: serde_json::Value) {
        if let Ok(guard) = self.events.read() {
            if let Some(sink) = guard.as_ref() {
                sink.emit(event, payload);
            }
        }
    }

    // ── Session ─────────────────────────────────────────────

    /// Authenticate, persist the session and install the bearer token.
    pub fn login(&self, email: &str, password: &str) -> Result<UserAccount, CoreError> {
        let response = self.api.login(email, password)?;
        self.api.set_auth_token(Some(response.access_token.clone()));

        let session = Session {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user: response.user.clone(),
        };
        self.with_store(|store| session.persist(store))?;
        if let Ok(mut guard) = self.session.write() {
            *guard = Some(session);
        }

        tracing::info!(email = %response.user.email, "Logged in");
        Ok(response.user)
    }

    /// Full logout teardown: cancel both workers, drop all call tracking,
    /// clear the flag, the token, the in-memory session and every
    /// session-scoped store key.
    pub fn logout(&self) -> Result<(), CoreError> {
        self.cancel_poller();
        self.cancel_call_watch();
        self.tracker.clear();
        self.set_calling(false);
        self.patients.clear();

        self.api.set_auth_token(None);
        if let Ok(mut guard) = self.session.write() {
            *guard = None;
        }
        self.view.set_nav(NavSection::Dashboard);
        self.view.clear_selection();
        self.with_store(LocalStore::clear_session_keys)?;

        tracing::info!("Logged out");
        Ok(())
    }

    /// Rebuild the session from the persisted store on app start. Also
    /// restores the last nav section and upload selection.
    pub fn restore_session(&self) -> Option<UserAccount> {
        let session = {
            let store = self.store.lock().ok()?;
            let session = Session::hydrate(&store)?;
            self.view.hydrate(&store);
            session
        };
        self.api.set_auth_token(Some(session.access_token.clone()));
        let user = session.user.clone();
        if let Ok(mut guard) = self.session.write() {
            *guard = Some(session);
        }
        tracing::info!(email = %user.email, "Session restored");
        Some(user)
    }

    pub fn current_user(&self) -> Option<UserAccount> {
        self.session
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.user.clone()))
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user().is_some()
    }

    /// Guard for commands that require a session.
    pub fn require_session(&self) -> Result<UserAccount, CoreError> {
        self.current_user().ok_or(CoreError::NotLoggedIn)
    }

    // ── Navigation / selection ──────────────────────────────

    /// Change the active section. Moving off the upload view cancels the
    /// auto-refresh poller unconditionally (tracked calls stay; the flag
    /// does too). Re-entering the upload view while calls are believed in
    /// flight resumes polling.
    pub fn set_nav(self: &Arc<Self>, section: NavSection) -> Result<(), CoreError> {
        let was_upload = self.view.on_upload_view();
        if was_upload && section != NavSection::Upload {
            // Stop and join the worker before the view flips: a final tick
            // that observed the change would exit through the machine's
            // off-view teardown and empty the tracker.
            self.cancel_poller();
        }
        self.view.set_nav(section);
        if section == NavSection::Upload
            && self.calling()
            && !self.tracker.is_empty()
            && !self.poller_active()
        {
            self.start_poller();
        }
        self.persist_view()
    }

    pub fn select_upload(&self, id: i64) -> Result<(), CoreError> {
        let uploads = self.api.fetch_uploads()?;
        self.view.select_upload(id, &uploads);
        self.persist_view()
    }

    pub fn select_filename(&self, filename: &str) -> Result<(), CoreError> {
        let uploads = self.api.fetch_uploads()?;
        self.view.select_filename(filename, &uploads);
        self.persist_view()
    }

    /// Post-upload bookkeeping: make the new upload the active selection,
    /// then reload patient data scoped to it. The reload is optimistic —
    /// the upload already succeeded, so a fetch failure only logs and the
    /// webview keeps the previous table until the next refresh.
    pub fn finish_upload(&self, upload_id: i64) -> Result<(), CoreError> {
        self.select_upload(upload_id)?;
        match self.patients.load(self.api.as_ref(), &self.view.refresh_scope(), true) {
            Ok(_) => self.notify_refreshed(),
            Err(e) => tracing::debug!(error = %e, "Post-upload refresh failed"),
        }
        Ok(())
    }

    fn persist_view(&self) -> Result<(), CoreError> {
        self.with_store(|store| self.view.persist(store))?;
        Ok(())
    }

    // ── Calling flag / workers ──────────────────────────────

    pub fn calling(&self) -> bool {
        self.calling.load(Ordering::Relaxed)
    }

    pub fn set_calling(&self, value: bool) {
        self.calling.store(value, Ordering::Relaxed);
    }

    /// Start (or restart) the auto-refresh poller. Sets the calling flag
    /// first so the machine's opening guard passes.
    pub fn start_poller(self: &Arc<Self>) {
        self.set_calling(true);
        let mut slot = match self.poller.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Stop and join the previous worker before spawning its successor.
        slot.take();
        *slot = Some(spawn_auto_refresh(Arc::clone(self) as Arc<dyn PollContext>));
    }

    pub fn cancel_poller(&self) {
        if let Ok(mut slot) = self.poller.lock() {
            slot.take();
        }
    }

    pub fn poller_active(&self) -> bool {
        self.poller
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Start the dedicated watch worker for one dispatched call.
    pub fn start_call_watch(self: &Arc<Self>, identity_key: String) {
        let mut slot = match self.call_watch.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.take();
        *slot = Some(spawn_call_watch(
            Arc::clone(self) as Arc<dyn PollContext>,
            identity_key,
        ));
    }

    pub fn cancel_call_watch(&self) {
        if let Ok(mut slot) = self.call_watch.lock() {
            slot.take();
        }
    }

    /// Run a closure against the persisted store.
    pub fn with_store<T>(
        &self,
        f: impl FnOnce(&mut LocalStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn api(&self) -> &dyn BackendApi {
        self.api.as_ref()
    }
}

impl PollContext for CoreState {
    fn api(&self) -> &dyn BackendApi {
        self.api.as_ref()
    }

    fn patients(&self) -> &PatientStore {
        &self.patients
    }

    fn tracker(&self) -> &ActiveCallTracker {
        &self.tracker
    }

    fn calling_in_progress(&self) -> bool {
        self.calling()
    }

    fn clear_calling_flag(&self) {
        self.set_calling(false);
    }

    fn on_upload_view(&self) -> bool {
        self.view.on_upload_view()
    }

    fn refresh_scope(&self) -> PatientScope {
        self.view.refresh_scope()
    }

    fn notify_refreshed(&self) {
        self.emit(EVENT_PATIENTS_REFRESHED, serde_json::Value::Null);
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
