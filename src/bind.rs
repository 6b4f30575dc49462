//! Binding a body to an executor once and calling it many times

use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::executor::MainThreadExecutor;
use crate::trampoline::{Trampoline, TraceContext, DEFAULT_STACK_SIZE};

/// Bind `executor` so bodies can be wrapped with [`Binder::wrap`].
pub fn bind<E: MainThreadExecutor>(executor: E) -> Binder<E> {
    Binder {
        executor: Arc::new(executor),
        stack_size: DEFAULT_STACK_SIZE,
        trace: true,
    }
}

pub struct Binder<E> {
    executor: Arc<E>,
    stack_size: usize,
    trace: bool,
}

impl<E: MainThreadExecutor> Binder<E> {
    /// Apply the `[trampoline]` settings to every wrapped body.
    pub fn configured(mut self, config: &Config) -> Self {
        self.stack_size = config.trampoline.stack_size;
        self.trace = config.trampoline.trace;
        self
    }

    /// Make `body` run through the trampoline whenever it is called.
    pub fn wrap<A, T, F>(&self, body: F) -> Bound<E, A, T>
    where
        F: Fn(A) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Bound {
            executor: Arc::clone(&self.executor),
            body: Arc::new(body),
            stack_size: self.stack_size,
            trace: self.trace,
        }
    }
}

impl<E> Clone for Binder<E> {
    fn clone(&self) -> Self {
        Binder {
            executor: Arc::clone(&self.executor),
            stack_size: self.stack_size,
            trace: self.trace,
        }
    }
}

/// A body bound to an executor.
pub struct Bound<E, A, T> {
    executor: Arc<E>,
    body: Arc<dyn Fn(A) -> anyhow::Result<T> + Send + Sync>,
    stack_size: usize,
    trace: bool,
}

impl<E, A, T> Bound<E, A, T>
where
    E: MainThreadExecutor,
    A: Send + 'static,
    T: Send + 'static,
{
    /// Run the body with `args`; returns or fails exactly as the trampoline run does.
    pub fn call(&self, args: A) -> Result<T, Error> {
        let body = Arc::clone(&self.body);
        Trampoline::new(&*self.executor)
            .stack_size(self.stack_size)
            .trace(TraceContext::new(self.trace))
            .run(move |args| body(args), args)
    }
}

impl<E, A, T> Clone for Bound<E, A, T> {
    fn clone(&self) -> Self {
        Bound {
            executor: Arc::clone(&self.executor),
            body: Arc::clone(&self.body),
            stack_size: self.stack_size,
            trace: self.trace,
        }
    }
}
