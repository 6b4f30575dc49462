//! Convenience helpers built on [`suspend`](crate::trampoline::suspend)

pub mod poll;

pub use poll::{poll_query, Matcher, PollOptions};

use std::thread;
use std::time::Duration;

use crate::trampoline::suspend_named;

/// Sleep on the driving context, leaving the privileged context free.
pub fn sleep(duration: Duration) -> anyhow::Result<()> {
    suspend_named(format!("sleep({duration:?})"), move || {
        thread::sleep(duration);
        Ok(())
    })
}

/// Fail with `err` from the driving context.
///
/// The failure is relayed back and surfaces here, exercising the same path
/// as any failing background call.
pub fn raise_in_background<E>(err: E) -> anyhow::Result<()>
where
    E: Into<anyhow::Error>,
{
    let err = err.into();
    suspend_named("raise", move || Err(err))
}
