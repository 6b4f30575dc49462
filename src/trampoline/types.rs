//! Values exchanged between a task and its trampoline

use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use crate::error::{panic_message, Error};
use crate::executor::Payload;

/// What a task body fails with.
pub type Failure = anyhow::Error;

/// Value or failure injected into a task when it is resumed.
pub type Handoff = Result<Payload, Failure>;

/* ===================== Pending Call ===================== */

/// A call requested by a suspended task, to be run on the driving context.
///
/// The callable owns its arguments. It is consumed by [`PendingCall::invoke`].
pub struct PendingCall {
    label: Cow<'static, str>,
    call: Box<dyn FnOnce() -> Handoff + Send>,
}

impl PendingCall {
    pub fn new<F>(label: impl Into<Cow<'static, str>>, call: F) -> Self
    where
        F: FnOnce() -> Handoff + Send + 'static,
    {
        PendingCall {
            label: label.into(),
            call: Box::new(call),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the call on the current thread.
    ///
    /// A panic inside the call is captured as an [`Error::Panicked`] failure
    /// so it can be relayed into the task like any other error.
    pub fn invoke(self) -> Handoff {
        let PendingCall { label, call } = self;
        match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(handoff) => handoff,
            Err(payload) => Err(Error::Panicked {
                context: format!("pending call `{}`", label),
                message: panic_message(&*payload),
            }
            .into()),
        }
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/* ===================== Yield ===================== */

/// What a task hands back each time it stops running.
pub enum Yield {
    /// Suspended, asking the driver to run a call.
    Call(PendingCall),
    /// Suspended only to let the privileged context breathe.
    Idle,
    /// Finished, with the body's return value or failure.
    Complete(Handoff),
}

impl Yield {
    pub fn is_complete(&self) -> bool {
        matches!(self, Yield::Complete(_))
    }
}

impl fmt::Debug for Yield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yield::Call(call) => f.debug_tuple("Call").field(call).finish(),
            Yield::Idle => f.write_str("Idle"),
            Yield::Complete(Ok(_)) => f.write_str("Complete(Ok(..))"),
            Yield::Complete(Err(err)) => f.debug_tuple("Complete").field(err).finish(),
        }
    }
}

/* ===================== Task State ===================== */

/// Lifecycle of a [`SuspendableTask`](super::SuspendableTask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    NotStarted,
    RunningOnPrivileged,
    SuspendedAwaitingDriver,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/* ===================== Run Stats ===================== */

/// Counters for one trampoline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Jobs sent to the executor (the start plus every resume).
    pub executor_calls: usize,
    /// Pending calls run directly on the driving context.
    pub direct_calls: usize,
    /// Resumes that injected a failure instead of a value.
    pub relayed_failures: usize,
    /// No-call suspensions.
    pub idle_yields: usize,
}
