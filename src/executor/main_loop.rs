//! Channel-backed privileged thread
//!
//! [`MainLoop`] is the receiving end, owned and pumped by the privileged
//! thread. [`MainThreadHandle`] is the sending end; it implements
//! [`MainThreadExecutor`] by posting the job and blocking on a reply.
//!
//! Jobs run strictly one at a time in posting order, so independent
//! trampolines sharing a handle are serialized on the privileged thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use tokio::sync::{mpsc, oneshot};

use super::{ExecutorFault, Job, MainThreadExecutor, Payload};
use crate::error::panic_message;

struct Envelope {
    job: Job,
    reply: oneshot::Sender<Result<Payload, ExecutorFault>>,
}

/// Job queue pumped by the privileged thread.
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<Envelope>,
    owner: Arc<OnceLock<ThreadId>>,
}

/// Executor posting jobs to a [`MainLoop`].
#[derive(Clone)]
pub struct MainThreadHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    owner: Arc<OnceLock<ThreadId>>,
}

impl MainLoop {
    /// Create a loop and a first handle to it.
    ///
    /// The loop belongs to whichever thread first calls [`MainLoop::run`] or
    /// [`MainLoop::pump`].
    pub fn new() -> (MainLoop, MainThreadHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let owner = Arc::new(OnceLock::new());
        (
            MainLoop {
                rx,
                owner: Arc::clone(&owner),
            },
            MainThreadHandle { tx, owner },
        )
    }

    /// Run jobs until every handle has been dropped.
    ///
    /// Returns the number of jobs run. Must not be called from inside an
    /// async runtime worker.
    pub fn run(mut self) -> usize {
        self.claim();
        let mut ran = 0;
        while let Some(envelope) = self.rx.blocking_recv() {
            dispatch(envelope);
            ran += 1;
        }
        tracing::debug!(jobs = ran, "main loop drained");
        ran
    }

    /// Run whatever jobs are queued right now, without blocking.
    ///
    /// Meant to be called from a host event loop's idle callback.
    pub fn pump(&mut self) -> usize {
        self.claim();
        let mut ran = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            dispatch(envelope);
            ran += 1;
        }
        ran
    }

    /// The thread this loop belongs to, once claimed.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.get().copied()
    }

    fn claim(&self) {
        let current = thread::current().id();
        let owner = *self.owner.get_or_init(|| current);
        if owner != current {
            tracing::warn!(?owner, ?current, "main loop pumped from a foreign thread");
        }
    }
}

impl MainThreadHandle {
    /// Whether the calling thread is the loop's privileged thread.
    pub fn is_main_thread(&self) -> bool {
        self.owner.get() == Some(&thread::current().id())
    }
}

impl MainThreadExecutor for MainThreadHandle {
    fn execute(&self, job: Job) -> Result<Payload, ExecutorFault> {
        // Posting to ourselves would deadlock.
        if self.is_main_thread() {
            return run_job(job);
        }

        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { job, reply })
            .map_err(|_| ExecutorFault::Disconnected)?;

        response.blocking_recv().map_err(|_| ExecutorFault::Dropped)?
    }
}

fn dispatch(envelope: Envelope) {
    let outcome = run_job(envelope.job);
    if envelope.reply.send(outcome).is_err() {
        tracing::warn!("job finished after its caller went away");
    }
}

fn run_job(job: Job) -> Result<Payload, ExecutorFault> {
    panic::catch_unwind(AssertUnwindSafe(job))
        .map_err(|payload| ExecutorFault::Panicked(panic_message(&*payload)))
}

#[cfg(test)]
#[path = "main_loop_tests.rs"]
mod tests;
