//! Suspendable task
//!
//! A stackful coroutine around the user body. Every method here runs the
//! body on the calling thread, so the trampoline only ever calls them from
//! inside an executor job.

use std::panic::{self, AssertUnwindSafe};

use generator::{Generator, Gn};

use super::suspend::SegmentGuard;
use super::types::{Handoff, TaskState, Yield};
use super::MIN_STACK_SIZE;
use crate::error::{panic_message, Error};
use crate::executor::Payload;

type Body<A> = Box<dyn FnOnce(A) -> Handoff + Send>;

pub struct SuspendableTask<A> {
    body: Option<Body<A>>,
    coroutine: Option<Generator<'static, Handoff, Yield>>,
    state: TaskState,
    stack_size: usize,
}

impl<A: Send + 'static> SuspendableTask<A> {
    /// Wrap `body`. Nothing runs until [`start`](Self::start).
    ///
    /// `stack_size` is the coroutine stack size in machine words; anything
    /// below [`MIN_STACK_SIZE`] is raised to it.
    pub fn new<T, F>(body: F, stack_size: usize) -> Self
    where
        F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        SuspendableTask {
            body: Some(Box::new(move |args| {
                body(args).map(|value| Box::new(value) as Payload)
            })),
            coroutine: None,
            state: TaskState::NotStarted,
            stack_size: stack_size.max(MIN_STACK_SIZE),
        }
    }

    /// Start the body with `args` and run it until it first stops.
    pub fn start(&mut self, args: A) -> Result<Yield, Error> {
        let body = match (self.state, self.body.take()) {
            (TaskState::NotStarted, Some(body)) => body,
            (state, _) => {
                return Err(Error::InvalidState {
                    operation: "start",
                    state,
                })
            }
        };

        let coroutine = Gn::<Handoff>::new_opt(self.stack_size, move || {
            Yield::Complete(body(args))
        });
        self.coroutine = Some(coroutine);
        self.step(None)
    }

    /// Resume a suspended body; its suspend point returns `value`.
    pub fn resume_with_value(&mut self, value: Payload) -> Result<Yield, Error> {
        self.resume("resume", Ok(value))
    }

    /// Resume a suspended body; its suspend point returns `Err(failure)`.
    pub fn resume_with_failure(&mut self, failure: anyhow::Error) -> Result<Yield, Error> {
        self.resume("fail", Err(failure))
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    fn resume(&mut self, operation: &'static str, handoff: Handoff) -> Result<Yield, Error> {
        if self.state != TaskState::SuspendedAwaitingDriver {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        self.step(Some(handoff))
    }

    fn step(&mut self, handoff: Option<Handoff>) -> Result<Yield, Error> {
        let Some(coroutine) = self.coroutine.as_mut() else {
            return Err(Error::InvalidState {
                operation: "step",
                state: self.state,
            });
        };

        if let Some(handoff) = handoff {
            coroutine.set_para(handoff);
        }

        self.state = TaskState::RunningOnPrivileged;
        let outcome = {
            let _segment = SegmentGuard::enter();
            panic::catch_unwind(AssertUnwindSafe(|| coroutine.resume()))
        };

        match outcome {
            Ok(Some(yielded)) => {
                self.state = match &yielded {
                    Yield::Call(_) | Yield::Idle => TaskState::SuspendedAwaitingDriver,
                    Yield::Complete(Ok(_)) => TaskState::Completed,
                    Yield::Complete(Err(_)) => TaskState::Failed,
                };
                if self.state.is_terminal() {
                    self.coroutine = None;
                }
                Ok(yielded)
            }
            Ok(None) => {
                self.fail();
                Err(Error::InvalidState {
                    operation: "resume",
                    state: TaskState::Completed,
                })
            }
            Err(payload) => {
                self.fail();
                Err(Error::Panicked {
                    context: "task body".to_string(),
                    message: panic_message(&*payload),
                })
            }
        }
    }

    fn fail(&mut self) {
        self.state = TaskState::Failed;
        self.coroutine = None;
    }
}
