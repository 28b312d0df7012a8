//! Call dispatch and in-flight call tracking.
//!
//! A single call and a batch campaign share the same bookkeeping: every
//! dispatched call gets an entry in the [`tracker::ActiveCallTracker`],
//! and a poll worker re-fetches patient data until the tracked calls
//! reach a terminal status, time out, or the user leaves the upload view.

pub mod batch;
pub mod poller;
pub mod single;
pub mod tracker;
pub mod validate;

pub use batch::{dispatch_batch, resolve_batch_scope, BatchDispatch};
pub use poller::{spawn_auto_refresh, AutoRefreshPoller, PollContext, PollWorker, PollerState};
pub use single::{dispatch_single, spawn_call_watch, SingleCallError, SingleDispatch};
pub use tracker::{ActiveCall, ActiveCallTracker};
pub use validate::{validate_call_preconditions, ValidationError};
