//! Auto-refresh poller.
//!
//! An explicit two-state machine (Idle / Polling) that re-fetches patient
//! data every 2 seconds while batch calls are believed in flight. Each
//! named guard below used to be a branch of a nested timer callback in the
//! original dashboard; here they are first-class so every exit path is
//! testable without threads or network.
//!
//! The worker thread driving the machine follows the background-scheduler
//! pattern: cooperative `AtomicBool` stop flag, fine-grained sleep for
//! responsive cancellation, join on drop. At most one worker exists
//! process-wide — installing a new one always stops the previous one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::tracker::ActiveCallTracker;
use crate::api::{BackendApi, PatientScope};
use crate::patients::PatientStore;

/// Time between polling ticks.
pub const POLL_INTERVAL_MS: u64 = 2000;

/// Hard cap on polling ticks (~2 minutes).
pub const MAX_ITERATIONS: u32 = 60;

/// Consecutive all-terminal status checks required before exiting early.
pub const TERMINAL_CONFIRMATIONS: u32 = 3;

/// Sleep slice so a stop request is honored promptly.
const SLEEP_GRANULARITY_MS: u64 = 100;

/// Everything a polling tick needs from the application.
pub trait PollContext: Send + Sync {
    fn api(&self) -> &dyn BackendApi;
    fn patients(&self) -> &PatientStore;
    fn tracker(&self) -> &ActiveCallTracker;
    /// The external "calling in progress" flag.
    fn calling_in_progress(&self) -> bool;
    fn clear_calling_flag(&self);
    /// Whether the upload view is the active section.
    fn on_upload_view(&self) -> bool;
    /// Scope for background refreshes (current upload selection or all).
    fn refresh_scope(&self) -> PatientScope;
    /// Hook for the UI layer; background refreshes notify through this.
    fn notify_refreshed(&self) {}
}

/// Poller state. `Polling` carries the tick budget and the streak of
/// all-terminal status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling {
        iterations: u32,
        consecutive_terminal: u32,
    },
}

/// Named transition guards that move the machine back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitGuard {
    /// The external calling-in-progress flag was cleared.
    CallingFlagCleared,
    /// The user is no longer on the upload view; one refresh was done.
    LeftUploadView,
    /// The 60-tick budget ran out.
    IterationBudgetExhausted,
    /// Every tracked call reported terminal for 3 consecutive checks.
    AllCallsTerminal,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Exited(ExitGuard),
}

/// The Idle/Polling state machine. Pure apart from the fetches it runs
/// through the [`PollContext`].
pub struct AutoRefreshPoller {
    state: PollerState,
}

impl AutoRefreshPoller {
    pub fn new() -> Self {
        Self { state: PollerState::Idle }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.state, PollerState::Polling { .. })
    }

    /// Enter Polling. A no-op when already polling (the tick budget is
    /// not reset by re-entry).
    pub fn start(&mut self) {
        if !self.is_polling() {
            self.state = PollerState::Polling { iterations: 0, consecutive_terminal: 0 };
        }
    }

    /// Run one polling tick against `ctx`. In Idle this does nothing.
    ///
    /// On every exit path the tracker is emptied and the calling flag
    /// cleared, so a later poll cycle starts from a clean slate.
    pub fn tick(&mut self, ctx: &dyn PollContext, now: DateTime<Utc>) -> Tick {
        let PollerState::Polling { iterations, consecutive_terminal } = self.state else {
            return Tick::Continue;
        };

        if !ctx.calling_in_progress() {
            return self.exit(ctx, ExitGuard::CallingFlagCleared);
        }

        if !ctx.on_upload_view() {
            // One refresh for whatever view is showing, then stand down.
            if ctx.patients().load(ctx.api(), &ctx.refresh_scope(), true).is_ok() {
                ctx.notify_refreshed();
            }
            return self.exit(ctx, ExitGuard::LeftUploadView);
        }

        // Refresh silently; a failed fetch is not an exit condition, the
        // next tick is a fresh status read.
        match ctx.patients().load(ctx.api(), &ctx.refresh_scope(), true) {
            Ok(_) => ctx.notify_refreshed(),
            Err(e) => tracing::debug!(error = %e, "Background refresh failed, will retry next tick"),
        }

        let snapshot = ctx.patients().snapshot();
        ctx.tracker().reconcile(&snapshot);
        ctx.tracker().prune(now);

        let iterations = iterations + 1;
        if iterations >= MAX_ITERATIONS {
            return self.exit(ctx, ExitGuard::IterationBudgetExhausted);
        }

        let consecutive_terminal = match self.all_tracked_terminal(ctx) {
            true => consecutive_terminal + 1,
            false => 0,
        };
        if consecutive_terminal >= TERMINAL_CONFIRMATIONS {
            return self.exit(ctx, ExitGuard::AllCallsTerminal);
        }

        self.state = PollerState::Polling { iterations, consecutive_terminal };
        Tick::Continue
    }

    /// Status probe: vacuously true once the tracker has drained.
    fn all_tracked_terminal(&self, ctx: &dyn PollContext) -> bool {
        let phones = ctx.tracker().phones();
        if phones.is_empty() {
            return true;
        }
        match ctx.api().check_call_statuses(&phones) {
            Ok(statuses) => {
                !statuses.is_empty() && statuses.iter().all(|s| s.is_terminal())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Status check failed, not counting as terminal");
                false
            }
        }
    }

    fn exit(&mut self, ctx: &dyn PollContext, guard: ExitGuard) -> Tick {
        tracing::info!(guard = ?guard, "Auto-refresh poller exiting to idle");
        ctx.tracker().clear();
        ctx.clear_calling_flag();
        self.state = PollerState::Idle;
        Tick::Exited(guard)
    }
}

impl Default for AutoRefreshPoller {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// PollWorker — cancellable worker thread
// ═══════════════════════════════════════════════════════════

/// Handle for a cancellable polling thread. `stop()` requests cooperative
/// shutdown; dropping the handle stops and joins.
pub struct PollWorker {
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PollWorker {
    /// Spawn a worker running `body`. The body must check the flag between
    /// units of work and return when it is set.
    pub fn spawn(
        name: &str,
        body: impl FnOnce(&AtomicBool) + Send + 'static,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(&flag))
            .expect("Failed to spawn poll worker");
        Self { stop, handle: Some(handle) }
    }

    /// Request cooperative shutdown.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        self.stop();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Sleep `total_ms` in small slices, returning early when `stop` is set.
/// Returns false when interrupted.
pub(crate) fn interruptible_sleep(stop: &AtomicBool, total_ms: u64) -> bool {
    let mut remaining = total_ms;
    while remaining > 0 {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(SLEEP_GRANULARITY_MS);
        std::thread::sleep(Duration::from_millis(slice));
        remaining -= slice;
    }
    !stop.load(Ordering::Relaxed)
}

/// Drive the auto-refresh machine until it exits or the worker is stopped.
pub fn spawn_auto_refresh(ctx: Arc<dyn PollContext>) -> PollWorker {
    PollWorker::spawn("auto-refresh-poller", move |stop| {
        let mut machine = AutoRefreshPoller::new();
        machine.start();
        tracing::info!("Auto-refresh poller started");

        while !stop.load(Ordering::Relaxed) {
            match machine.tick(ctx.as_ref(), Utc::now()) {
                Tick::Exited(_) => break,
                Tick::Continue => {}
            }
            if !interruptible_sleep(stop, POLL_INTERVAL_MS) {
                break;
            }
        }
        tracing::info!("Auto-refresh poller stopped");
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBackend;
    use crate::models::{CallStatus, CallStatusEntry, PatientRecord};

    struct TestCtx {
        api: MockBackend,
        patients: PatientStore,
        tracker: ActiveCallTracker,
        calling: AtomicBool,
        upload_view: AtomicBool,
        notified: std::sync::atomic::AtomicUsize,
    }

    impl TestCtx {
        fn new(api: MockBackend) -> Self {
            Self {
                api,
                patients: PatientStore::new(),
                tracker: ActiveCallTracker::new(),
                calling: AtomicBool::new(true),
                upload_view: AtomicBool::new(true),
                notified: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn notifications(&self) -> usize {
            self.notified.load(Ordering::Relaxed)
        }
    }

    impl PollContext for TestCtx {
        fn api(&self) -> &dyn BackendApi {
            &self.api
        }
        fn patients(&self) -> &PatientStore {
            &self.patients
        }
        fn tracker(&self) -> &ActiveCallTracker {
            &self.tracker
        }
        fn calling_in_progress(&self) -> bool {
            self.calling.load(Ordering::Relaxed)
        }
        fn clear_calling_flag(&self) {
            self.calling.store(false, Ordering::Relaxed);
        }
        fn on_upload_view(&self) -> bool {
            self.upload_view.load(Ordering::Relaxed)
        }
        fn refresh_scope(&self) -> PatientScope {
            PatientScope::All
        }
        fn notify_refreshed(&self) {
            self.notified.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn patient(phone: &str, status: CallStatus) -> PatientRecord {
        PatientRecord {
            first_name: "Maria".into(),
            last_name: "Lopez".into(),
            phone: phone.into(),
            invoice_number: "INV-1".into(),
            outstanding_amount: 80.0,
            estimated_date: None,
            call_status: status,
            notes: None,
            call_history: vec![],
            upload_id: None,
        }
    }

    fn tracked(ctx: &TestCtx, phone: &str) {
        ctx.tracker.insert(
            phone,
            crate::calls::tracker::ActiveCall {
                phone: phone.into(),
                started_at: Utc::now(),
                call_session_id: None,
            },
        );
    }

    fn status(phone: &str, status: CallStatus) -> CallStatusEntry {
        CallStatusEntry {
            phone: phone.into(),
            call_status: Some(status),
            recent_call_status: None,
        }
    }

    #[test]
    fn idle_tick_is_a_noop() {
        let ctx = TestCtx::new(MockBackend::new());
        let mut machine = AutoRefreshPoller::new();
        assert_eq!(machine.tick(&ctx, Utc::now()), Tick::Continue);
        assert_eq!(ctx.api.fetches(), 0);
    }

    #[test]
    fn cleared_calling_flag_exits_immediately() {
        let ctx = TestCtx::new(MockBackend::new());
        ctx.calling.store(false, Ordering::Relaxed);
        tracked(&ctx, "5551111111");

        let mut machine = AutoRefreshPoller::new();
        machine.start();
        assert_eq!(
            machine.tick(&ctx, Utc::now()),
            Tick::Exited(ExitGuard::CallingFlagCleared)
        );
        assert!(ctx.tracker.is_empty(), "exit clears the tracker");
        assert_eq!(ctx.api.fetches(), 0, "no fetch before the flag guard");
    }

    #[test]
    fn leaving_upload_view_does_one_refresh_then_idles() {
        let ctx = TestCtx::new(MockBackend::new());
        ctx.upload_view.store(false, Ordering::Relaxed);

        let mut machine = AutoRefreshPoller::new();
        machine.start();
        assert_eq!(
            machine.tick(&ctx, Utc::now()),
            Tick::Exited(ExitGuard::LeftUploadView)
        );
        assert_eq!(ctx.api.fetches(), 1, "exactly one refresh for the other view");
        assert_eq!(ctx.notifications(), 1);
        assert_eq!(machine.state(), PollerState::Idle);
        assert!(!ctx.calling_in_progress());
    }

    #[test]
    fn leaving_upload_view_with_failed_refresh_does_not_notify() {
        let ctx = TestCtx::new(MockBackend::new());
        ctx.upload_view.store(false, Ordering::Relaxed);
        ctx.api.set_fail_fetches(true);

        let mut machine = AutoRefreshPoller::new();
        machine.start();
        assert_eq!(
            machine.tick(&ctx, Utc::now()),
            Tick::Exited(ExitGuard::LeftUploadView)
        );
        assert_eq!(ctx.notifications(), 0, "a failed refresh must not report success");
    }

    #[test]
    fn terminal_record_leaves_tracker_within_one_tick() {
        let mock = MockBackend::new()
            .with_patients(vec![patient("5551111111", CallStatus::Completed)]);
        let ctx = TestCtx::new(mock);
        tracked(&ctx, "5551111111");

        let mut machine = AutoRefreshPoller::new();
        machine.start();
        machine.tick(&ctx, Utc::now());
        assert!(ctx.tracker.is_empty(), "reconcile removes terminal entries");
    }

    #[test]
    fn iteration_budget_exhausts_at_sixty() {
        let mock = MockBackend::new().with_patients(vec![patient("5551111111", CallStatus::Pending)]);
        let ctx = TestCtx::new(mock);
        tracked(&ctx, "5551111111");
        // Status endpoint keeps reporting pending so the streak never builds.
        ctx.api.push_statuses(vec![status("5551111111", CallStatus::Pending)]);

        let mut machine = AutoRefreshPoller::new();
        machine.start();
        let mut result = Tick::Continue;
        for _ in 0..MAX_ITERATIONS {
            result = machine.tick(&ctx, Utc::now());
            if let Tick::Exited(_) = result {
                break;
            }
        }
        assert_eq!(result, Tick::Exited(ExitGuard::IterationBudgetExhausted));
        assert!(ctx.tracker.is_empty());
        assert!(!ctx.calling_in_progress());
    }

    #[test]
    fn three_consecutive_terminal_checks_exit_early() {
        // Record stays pending in the table (so reconcile keeps the entry)
        // but the status endpoint reports completed.
        let mock = MockBackend::new().with_patients(vec![patient("5551111111", CallStatus::Pending)]);
        let ctx = TestCtx::new(mock);
        tracked(&ctx, "5551111111");
        for _ in 0..3 {
            ctx.api.push_statuses(vec![status("5551111111", CallStatus::Completed)]);
        }

        let mut machine = AutoRefreshPoller::new();
        machine.start();
        let mut exits = Tick::Continue;
        for _ in 0..5 {
            exits = machine.tick(&ctx, Utc::now());
            if let Tick::Exited(_) = exits {
                break;
            }
        }
        assert_eq!(exits, Tick::Exited(ExitGuard::AllCallsTerminal));
    }

    #[test]
    fn non_terminal_check_resets_the_streak() {
        let mock = MockBackend::new().with_patients(vec![patient("5551111111", CallStatus::Pending)]);
        let ctx = TestCtx::new(mock);
        tracked(&ctx, "5551111111");
        ctx.api.push_statuses(vec![status("5551111111", CallStatus::Completed)]);
        ctx.api.push_statuses(vec![status("5551111111", CallStatus::Completed)]);
        ctx.api.push_statuses(vec![status("5551111111", CallStatus::Pending)]);

        let mut machine = AutoRefreshPoller::new();
        machine.start();
        for _ in 0..3 {
            assert_eq!(machine.tick(&ctx, Utc::now()), Tick::Continue);
        }
        match machine.state() {
            PollerState::Polling { consecutive_terminal, .. } => {
                assert_eq!(consecutive_terminal, 0, "pending check resets the streak");
            }
            PollerState::Idle => panic!("machine should still be polling"),
        }
    }

    #[test]
    fn failed_refresh_is_not_an_exit() {
        let ctx = TestCtx::new(MockBackend::new());
        tracked(&ctx, "5551111111");
        ctx.api.set_fail_fetches(true);
        ctx.api.push_statuses(vec![status("5551111111", CallStatus::Pending)]);

        let mut machine = AutoRefreshPoller::new();
        machine.start();
        assert_eq!(machine.tick(&ctx, Utc::now()), Tick::Continue);
        assert!(machine.is_polling());
    }

    #[test]
    fn worker_stops_on_request() {
        let worker = PollWorker::spawn("test-worker", |stop| {
            while interruptible_sleep(stop, 50) {}
        });
        assert!(!worker.is_stopped());
        worker.stop();
        // Drop joins; reaching the end of the test without hanging is the assertion.
        drop(worker);
    }

    #[test]
    fn interruptible_sleep_honors_stop_flag() {
        let stop = AtomicBool::new(true);
        assert!(!interruptible_sleep(&stop, 10_000));
    }
}
