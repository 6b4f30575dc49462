//! Test helpers for trampoline tests
//!
//! Counting executors, a real privileged thread, and a shared event log.

use crate::executor::{ExecutorFault, Job, MainLoop, MainThreadExecutor, MainThreadHandle, Payload};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

/// Runs jobs inline and counts them.
#[derive(Default)]
pub struct CountingExecutor {
    jobs: AtomicUsize,
}

impl CountingExecutor {
    pub fn jobs(&self) -> usize {
        self.jobs.load(Ordering::SeqCst)
    }
}

impl MainThreadExecutor for CountingExecutor {
    fn execute(&self, job: Job) -> Result<Payload, ExecutorFault> {
        self.jobs.fetch_add(1, Ordering::SeqCst);
        Ok(job())
    }
}

/// Ordered record of what happened where.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// A privileged thread pumping a [`MainLoop`] until every handle is gone.
pub struct PrivilegedThread {
    pub handle: MainThreadHandle,
    pub thread_id: ThreadId,
    join: JoinHandle<usize>,
}

impl PrivilegedThread {
    pub fn spawn() -> Self {
        let (main_loop, handle) = MainLoop::new();
        let join = thread::spawn(move || main_loop.run());
        let thread_id = join.thread().id();
        PrivilegedThread {
            handle,
            thread_id,
            join,
        }
    }

    /// Drop the handle and wait for the loop to drain; returns jobs run.
    pub fn shutdown(self) -> usize {
        drop(self.handle);
        self.join.join().unwrap()
    }
}

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
