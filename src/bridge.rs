//! Async bridge
//!
//! Lets async code await a trampolined run. The driving loop blocks, so it
//! is hosted on tokio's blocking pool rather than on a runtime worker.

use std::sync::Arc;

use crate::error::{panic_message, Error};
use crate::executor::MainThreadExecutor;
use crate::trampoline::run;

pub async fn run_async<E, A, T, F>(executor: Arc<E>, body: F, args: A) -> Result<T, Error>
where
    E: MainThreadExecutor + Send + Sync + 'static,
    F: FnOnce(A) -> anyhow::Result<T> + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || run(&*executor, body, args))
        .await
        .map_err(|join_err| Error::Panicked {
            context: "driving context".to_string(),
            message: match join_err.try_into_panic() {
                Ok(payload) => panic_message(&*payload),
                Err(join_err) => join_err.to_string(),
            },
        })?
}
