//! Error types
//!
//! Task bodies and pending calls fail with [`anyhow::Error`]; the trampoline
//! only wraps those payloads, it never rewrites them. Everything the crate
//! itself can go wrong with is an [`Error`] variant.

use std::any::Any;

use thiserror::Error;

use crate::executor::ExecutorFault;
use crate::trampoline::TaskState;

#[derive(Debug, Error)]
pub enum Error {
    /// The task body returned an error that nothing inside it handled.
    #[error("task failed: {0}")]
    Task(#[source] anyhow::Error),

    /// The executor could not run a job on the privileged context.
    #[error("executor fault: {0}")]
    Executor(#[from] ExecutorFault),

    /// A task body or a pending call panicked.
    #[error("{context} panicked: {message}")]
    Panicked { context: String, message: String },

    /// `poll_query` ran out of time in strict mode.
    #[error("could not resolve query: {query:?}")]
    NotFound { query: String },

    /// `suspend` was called from code that is not running inside a task.
    #[error("suspend called outside of a trampolined task")]
    NotInTask,

    /// The task was resumed without a handoff value.
    #[error("task resumed without a handoff")]
    MissingHandoff,

    #[error("cannot {operation} a task that is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: TaskState,
    },

    #[error("handoff payload is not a {expected}")]
    PayloadType { expected: &'static str },
}

impl Error {
    /// The failure the task body ended with, if this is a task failure.
    pub fn task_failure(&self) -> Option<&anyhow::Error> {
        match self {
            Error::Task(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn into_task_failure(self) -> Option<anyhow::Error> {
        match self {
            Error::Task(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
