//! Per-run diagnostic trace
//!
//! Lines carry the milliseconds since the run started and one `"  | "` per
//! open scope. Scopes are guards, so the indentation unwinds with them.

use std::cell::Cell;
use std::fmt::Display;
use std::time::Instant;

use uuid::Uuid;

pub const TRACE_TARGET: &str = "trampoline_core::trace";

#[derive(Debug)]
pub struct TraceContext {
    run_id: Uuid,
    started: Instant,
    depth: Cell<usize>,
    enabled: bool,
}

impl TraceContext {
    pub fn new(enabled: bool) -> Self {
        TraceContext {
            run_id: Uuid::new_v4(),
            started: Instant::now(),
            depth: Cell::new(0),
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub fn line(&self, msg: impl Display) {
        if self.enabled {
            tracing::debug!(target: TRACE_TARGET, run_id = %self.run_id, "{}", self.render(msg));
        }
    }

    /// Emit `msg` and indent everything until the guard drops.
    pub fn scope(&self, msg: impl Display) -> TraceScope<'_> {
        self.line(msg);
        self.depth.set(self.depth.get() + 1);
        TraceScope { ctx: self }
    }

    pub(crate) fn render(&self, msg: impl Display) -> String {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        format!("{:8.3} {}{}", elapsed_ms, "  | ".repeat(self.depth.get()), msg)
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new(true)
    }
}

#[must_use = "the scope ends when the guard is dropped"]
pub struct TraceScope<'a> {
    ctx: &'a TraceContext,
}

impl Drop for TraceScope<'_> {
    fn drop(&mut self) {
        self.ctx.depth.set(self.ctx.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_nest_and_unwind() {
        let trace = TraceContext::disabled();
        assert_eq!(trace.depth(), 0);
        {
            let _outer = trace.scope("outer");
            assert_eq!(trace.depth(), 1);
            {
                let _inner = trace.scope("inner");
                assert_eq!(trace.depth(), 2);
            }
            assert_eq!(trace.depth(), 1);
        }
        assert_eq!(trace.depth(), 0);
    }

    #[test]
    fn test_render_indents_by_depth() {
        let trace = TraceContext::disabled();
        let _a = trace.scope("a");
        let _b = trace.scope("b");
        let line = trace.render("calling sleep");
        assert!(line.ends_with("  |   | calling sleep"), "got {line:?}");
    }

    #[test]
    fn test_runs_get_distinct_ids() {
        assert_ne!(TraceContext::new(true).run_id(), TraceContext::new(true).run_id());
    }
}
