//! Suspend points
//!
//! [`suspend`] may be called from any depth of a task body's call tree: the
//! task runs on its own stack, so helpers do not need to know they are being
//! trampolined.

use std::any::type_name;
use std::borrow::Cow;
use std::cell::Cell;

use super::types::{Handoff, PendingCall, Yield};
use crate::error::Error;
use crate::executor::Payload;

thread_local! {
    /// Task segments currently executing on this thread.
    static SEGMENTS: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as running a task segment while alive.
pub(crate) struct SegmentGuard(());

impl SegmentGuard {
    pub(crate) fn enter() -> Self {
        SEGMENTS.with(|n| n.set(n.get() + 1));
        SegmentGuard(())
    }
}

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        SEGMENTS.with(|n| n.set(n.get() - 1));
    }
}

/// Whether the caller is running inside a trampolined task body.
pub fn in_task() -> bool {
    SEGMENTS.with(|n| n.get() > 0)
}

/// Run `f` on the driving context and return its result here.
///
/// The task is suspended until `f` has run. A failure from `f` comes back
/// as `Err` at this call site, where the body may handle it.
pub fn suspend<R, F>(f: F) -> anyhow::Result<R>
where
    F: FnOnce() -> anyhow::Result<R> + Send + 'static,
    R: Send + 'static,
{
    suspend_named(type_name::<F>(), f)
}

/// [`suspend`] with a label for the trace.
pub fn suspend_named<R, F>(label: impl Into<Cow<'static, str>>, f: F) -> anyhow::Result<R>
where
    F: FnOnce() -> anyhow::Result<R> + Send + 'static,
    R: Send + 'static,
{
    let call = PendingCall::new(label, move || f().map(|value| Box::new(value) as Payload));
    tracing::trace!(call = call.label(), "bouncing to driver");

    let payload = switch_to_driver(Yield::Call(call))?;
    tracing::trace!("bounce landed");

    payload
        .downcast::<R>()
        .map(|value| *value)
        .map_err(|_| {
            Error::PayloadType {
                expected: type_name::<R>(),
            }
            .into()
        })
}

/// Give the privileged context back for one round trip without requesting
/// any call. Resumes with `()`.
pub fn yield_now() -> anyhow::Result<()> {
    switch_to_driver(Yield::Idle).map(|_| ())
}

// The scoped yield only reaches the generator's own closure; suspend points
// live at arbitrary depth, so the context-based free function is required.
#[allow(deprecated)]
fn switch_to_driver(yielded: Yield) -> Handoff {
    if !in_task() {
        return Err(Error::NotInTask.into());
    }

    match generator::yield_::<Handoff, Yield>(yielded) {
        Some(handoff) => handoff,
        None => Err(Error::MissingHandoff.into()),
    }
}
