//! Tests for failure relay and propagation

use super::helpers::init_test_logging;
use crate::error::Error;
use crate::executor::{ExecutorFault, Inline, Job, Payload};
use crate::helpers::{raise_in_background, sleep};
use crate::trampoline::{run, suspend, Trampoline};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq)]
#[error("value error: {0}")]
struct ValueError(String);

#[test]
fn test_background_failure_is_caught_in_body() {
    init_test_logging();

    let result = run(
        &Inline,
        |()| match raise_in_background(ValueError("bad".into())) {
            Err(e) if e.is::<ValueError>() => Ok("caught"),
            Err(e) => Err(e),
            Ok(()) => Ok("not raised"),
        },
        (),
    );

    assert_eq!(result.unwrap(), "caught");
}

#[test]
fn test_uncaught_background_failure_keeps_payload() {
    let err = run(
        &Inline,
        |()| -> anyhow::Result<()> {
            raise_in_background(ValueError("lost".into()))?;
            Ok(())
        },
        (),
    )
    .unwrap_err();

    let failure = err.task_failure().expect("task failure");
    assert_eq!(
        failure.downcast_ref::<ValueError>(),
        Some(&ValueError("lost".into()))
    );
}

#[test]
fn test_body_error_without_suspend() {
    let err = run(
        &Inline,
        |()| -> anyhow::Result<u8> { Err(ValueError("early".into()).into()) },
        (),
    )
    .unwrap_err();

    let failure = err.into_task_failure().expect("task failure");
    assert_eq!(failure.to_string(), "value error: early");
}

#[test]
fn test_loop_survives_relayed_failure() {
    let (result, stats) = Trampoline::new(&Inline).run_with_stats(
        |()| {
            let first: anyhow::Result<u32> = suspend(|| Err(ValueError("first".into()).into()));
            assert!(first.is_err());
            let second = suspend(|| Ok(2u32))?;
            Ok(second)
        },
        (),
    );

    assert_eq!(result.unwrap(), 2);
    assert_eq!(stats.relayed_failures, 1);
    assert_eq!(stats.direct_calls, 2);
}

#[test]
fn test_pending_call_panic_is_relayed() {
    let result = run(
        &Inline,
        |()| {
            let outcome = suspend(|| -> anyhow::Result<()> { panic!("driver side") });
            let err = outcome.unwrap_err();
            match err.downcast_ref::<Error>() {
                Some(Error::Panicked { message, .. }) => Ok(message.clone()),
                _ => Err(err),
            }
        },
        (),
    );

    assert_eq!(result.unwrap(), "driver side");
}

#[test]
fn test_body_panic_is_reported() {
    let err = run(&Inline, |()| -> anyhow::Result<()> { panic!("body side") }, ()).unwrap_err();

    match err {
        Error::Panicked { context, message } => {
            assert_eq!(context, "task body");
            assert_eq!(message, "body side");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_executor_fault_propagates() {
    let offline = |_job: Job| -> Result<Payload, ExecutorFault> { Err(ExecutorFault::Disconnected) };

    let err = run(&offline, |()| Ok(1), ()).unwrap_err();
    assert!(matches!(err, Error::Executor(ExecutorFault::Disconnected)));
}

#[test]
fn test_executor_fault_after_suspend_abandons_task() {
    init_test_logging();
    let jobs = AtomicUsize::new(0);
    let after_sleep = Arc::new(Mutex::new(false));
    let reached = Arc::clone(&after_sleep);

    // Runs the start job, then goes away while the task is suspended.
    let flaky = |job: Job| -> Result<Payload, ExecutorFault> {
        if jobs.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(job())
        } else {
            Err(ExecutorFault::Disconnected)
        }
    };

    let err = run(
        &flaky,
        move |()| {
            sleep(Duration::from_millis(1))?;
            *reached.lock().unwrap() = true;
            Ok("resumed")
        },
        (),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Executor(ExecutorFault::Disconnected)));
    assert_eq!(jobs.load(Ordering::SeqCst), 2);
    assert!(!*after_sleep.lock().unwrap());
}
