//! # Trampoline - main-thread execution with background bounces
//!
//! A task body runs on the privileged context (through a
//! [`MainThreadExecutor`]) but may call [`suspend`] at any depth to have a
//! function run on the driving context instead. The trampoline loop moves
//! control back and forth:
//!
//! 1. Start the task through the executor; it runs until it suspends or ends
//! 2. Run the pending call directly on the driving context
//! 3. Resume the task through the executor with the call's value or failure
//! 4. Repeat until the task is terminal
//!
//! ```ignore
//! use trampoline_core::{run, sleep, Inline};
//! use std::time::Duration;
//!
//! let out = run(&Inline, |name: &str| {
//!     sleep(Duration::from_millis(100))?; // off the privileged context
//!     Ok(format!("hello {name}"))
//! }, "world")?;
//! ```

pub mod suspend;
pub mod task;
pub mod trace;
pub mod types;

#[cfg(test)]
mod tests;

use std::any::type_name;

use crate::config::Config;
use crate::error::Error;
use crate::executor::{call_in_main_thread, MainThreadExecutor, Payload};

pub use suspend::{in_task, suspend, suspend_named, yield_now};
pub use task::SuspendableTask;
pub use trace::{TraceContext, TraceScope};
pub use types::{Failure, Handoff, PendingCall, RunStats, TaskState, Yield};

/// Default coroutine stack size, in machine words.
pub const DEFAULT_STACK_SIZE: usize = 0x1_0000;

/// Smallest coroutine stack a task gets, in machine words. Smaller requests
/// are raised to this.
pub const MIN_STACK_SIZE: usize = 0x1000;

/* ===================== Public API ===================== */

/// Run `body(args)` on the privileged context of `executor`, servicing its
/// suspend points from the calling thread.
pub fn run<E, A, T, F>(executor: &E, body: F, args: A) -> Result<T, Error>
where
    E: MainThreadExecutor + ?Sized,
    F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    Trampoline::new(executor).run(body, args)
}

/// One trampoline run bound to an executor.
pub struct Trampoline<'e, E: ?Sized> {
    executor: &'e E,
    stack_size: usize,
    trace: TraceContext,
}

impl<'e, E> Trampoline<'e, E>
where
    E: MainThreadExecutor + ?Sized,
{
    pub fn new(executor: &'e E) -> Self {
        Trampoline {
            executor,
            stack_size: DEFAULT_STACK_SIZE,
            trace: TraceContext::default(),
        }
    }

    /// Take stack size and tracing from `config`.
    pub fn with_config(executor: &'e E, config: &Config) -> Self {
        Trampoline {
            executor,
            stack_size: config.trampoline.stack_size,
            trace: TraceContext::new(config.trampoline.trace),
        }
    }

    /// Coroutine stack size in machine words, at least [`MIN_STACK_SIZE`].
    pub fn stack_size(mut self, words: usize) -> Self {
        self.stack_size = words.max(MIN_STACK_SIZE);
        self
    }

    pub fn trace(mut self, trace: TraceContext) -> Self {
        self.trace = trace;
        self
    }

    pub fn run<A, T, F>(self, body: F, args: A) -> Result<T, Error>
    where
        F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
    {
        self.run_with_stats(body, args).0
    }

    /// [`run`](Self::run), also reporting what the loop did.
    pub fn run_with_stats<A, T, F>(self, body: F, args: A) -> (Result<T, Error>, RunStats)
    where
        F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
    {
        let span = tracing::debug_span!("trampoline", run_id = %self.trace.run_id());
        let _entered = span.enter();

        let mut stats = RunStats::default();
        let result = self.drive(body, args, &mut stats);

        tracing::debug!(
            executor_calls = stats.executor_calls,
            direct_calls = stats.direct_calls,
            relayed_failures = stats.relayed_failures,
            idle_yields = stats.idle_yields,
            ok = result.is_ok(),
            "trampoline finished"
        );
        (result, stats)
    }

    /* ===================== Loop ===================== */

    fn drive<A, T, F>(&self, body: F, args: A, stats: &mut RunStats) -> Result<T, Error>
    where
        F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
    {
        let trace = &self.trace;
        let _run = trace.scope("trampoline");

        let task = SuspendableTask::new(body, self.stack_size);
        let (mut task, mut yielded) = {
            let _s = trace.scope("starting task");
            self.on_privileged(task, stats, move |task| task.start(args))?
        };

        let outcome = loop {
            trace.line("top of loop");

            let handoff = match yielded {
                Yield::Complete(outcome) => break outcome,
                Yield::Idle => {
                    stats.idle_yields += 1;
                    Ok(Box::new(()) as Payload)
                }
                Yield::Call(call) => {
                    stats.direct_calls += 1;
                    let _s = trace.scope(format_args!("calling {}", call.label()));
                    call.invoke()
                }
            };

            (task, yielded) = match handoff {
                Ok(value) => {
                    let _s = trace.scope("sending value to privileged context");
                    self.on_privileged(task, stats, move |task| task.resume_with_value(value))?
                }
                Err(failure) => {
                    stats.relayed_failures += 1;
                    let _s = trace.scope(format_args!("raising in privileged context: {failure}"));
                    self.on_privileged(task, stats, move |task| {
                        task.resume_with_failure(failure)
                    })?
                }
            };
        };
        debug_assert!(task.is_terminal());

        match outcome {
            Ok(payload) => payload.downcast::<T>().map(|value| *value).map_err(|_| {
                Error::PayloadType {
                    expected: type_name::<T>(),
                }
            }),
            Err(failure) => Err(Error::Task(failure)),
        }
    }

    /// Hand the task to the privileged context for one step and take it back.
    fn on_privileged<A, G>(
        &self,
        mut task: SuspendableTask<A>,
        stats: &mut RunStats,
        step: G,
    ) -> Result<(SuspendableTask<A>, Yield), Error>
    where
        A: Send + 'static,
        G: FnOnce(&mut SuspendableTask<A>) -> Result<Yield, Error> + Send + 'static,
    {
        stats.executor_calls += 1;
        let (task, yielded) = call_in_main_thread(self.executor, move || {
            let yielded = step(&mut task);
            (task, yielded)
        })?;
        Ok((task, yielded?))
    }
}
