//! # Privileged-context executors
//!
//! A [`MainThreadExecutor`] takes a job, runs it on the privileged context
//! (a UI or event-loop thread) and hands the job's result back to the caller
//! synchronously, whatever thread the caller is on.
//!
//! The trampoline only ever talks to this trait. Two implementations ship
//! with the crate:
//!
//! - [`Inline`]: runs the job right away on the calling thread
//! - [`MainThreadHandle`]: posts the job to a [`MainLoop`] pumped by the
//!   privileged thread and blocks until it has run
//!
//! Any `Fn(Job) -> Result<Payload, ExecutorFault>` closure is an executor
//! too, which is how host toolkits plug in their own dispatch.

use std::any::{type_name, Any};

use thiserror::Error;

pub mod main_loop;

pub use main_loop::{MainLoop, MainThreadHandle};

/// Type-erased value crossing between contexts.
pub type Payload = Box<dyn Any + Send>;

/// A unit of work for the privileged context.
pub type Job = Box<dyn FnOnce() -> Payload + Send>;

/// Failure of the executor itself, as opposed to the job it was given.
#[derive(Debug, Error)]
pub enum ExecutorFault {
    #[error("privileged context is no longer accepting jobs")]
    Disconnected,

    #[error("job was dropped before it produced a result")]
    Dropped,

    #[error("job panicked on the privileged context: {0}")]
    Panicked(String),

    #[error("executor returned a payload that is not a {expected}")]
    ForeignPayload { expected: &'static str },

    #[error("{0}")]
    Other(String),
}

/// Capability to run a job on the privileged context and wait for it.
pub trait MainThreadExecutor {
    fn execute(&self, job: Job) -> Result<Payload, ExecutorFault>;
}

impl<F> MainThreadExecutor for F
where
    F: Fn(Job) -> Result<Payload, ExecutorFault>,
{
    fn execute(&self, job: Job) -> Result<Payload, ExecutorFault> {
        self(job)
    }
}

/// Runs every job immediately on the calling thread.
///
/// Useful when the caller already is the privileged context, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl MainThreadExecutor for Inline {
    fn execute(&self, job: Job) -> Result<Payload, ExecutorFault> {
        Ok(job())
    }
}

/// Run `f` through `executor` and recover its typed result.
pub fn call_in_main_thread<E, R, F>(executor: &E, f: F) -> Result<R, ExecutorFault>
where
    E: MainThreadExecutor + ?Sized,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let payload = executor.execute(Box::new(move || Box::new(f()) as Payload))?;
    payload
        .downcast::<R>()
        .map(|value| *value)
        .map_err(|_| ExecutorFault::ForeignPayload {
            expected: type_name::<R>(),
        })
}
