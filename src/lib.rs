pub mod bind;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod helpers;
pub mod trampoline;

// Re-export the everyday API
pub use bind::{bind, Binder, Bound};
pub use bridge::run_async;
pub use config::Config;
pub use error::Error;
pub use executor::{Inline, MainLoop, MainThreadExecutor, MainThreadHandle};
pub use helpers::{poll_query, raise_in_background, sleep, PollOptions};
pub use trampoline::{run, suspend, suspend_named, yield_now, Trampoline};
