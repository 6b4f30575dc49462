//! Tests for suspending from nested calls and for a real privileged thread

use super::helpers::{init_test_logging, EventLog, PrivilegedThread};
use crate::executor::Inline;
use crate::helpers::{poll_query, sleep, PollOptions};
use crate::trampoline::{in_task, run, suspend, Trampoline};
use std::thread;
use std::time::{Duration, Instant};

fn fetch_remote(id: u32) -> anyhow::Result<String> {
    suspend(move || Ok(format!("item-{id}")))
}

fn load_pair(first: u32, second: u32) -> anyhow::Result<(String, String)> {
    Ok((fetch_remote(first)?, fetch_remote(second)?))
}

fn deep(level: u32) -> anyhow::Result<u32> {
    if level == 0 {
        suspend(|| Ok(1))
    } else {
        Ok(deep(level - 1)? + 1)
    }
}

#[test]
fn test_suspend_from_helper_functions() {
    let (result, stats) = Trampoline::new(&Inline).run_with_stats(|()| load_pair(1, 2), ());

    assert_eq!(
        result.unwrap(),
        ("item-1".to_string(), "item-2".to_string())
    );
    assert_eq!(stats.direct_calls, 2);
}

#[test]
fn test_suspend_from_recursion_keeps_locals() {
    let value = run(&Inline, |depth: u32| deep(depth), 32).unwrap();
    assert_eq!(value, 33);
}

#[test]
fn test_in_task_only_inside_body() {
    assert!(!in_task());
    let (inside, in_call) = run(
        &Inline,
        |()| {
            let inside = in_task();
            let in_call = suspend(|| Ok(in_task()))?;
            Ok((inside, in_call))
        },
        (),
    )
    .unwrap();

    assert!(inside);
    assert!(!in_call);
    assert!(!in_task());
}

#[test]
fn test_nested_trampoline_runs_independently() {
    let value = run(
        &Inline,
        |()| {
            let inner = run(&Inline, |()| suspend(|| Ok(10)), ())?;
            let outer = suspend(|| Ok(5))?;
            Ok(inner + outer)
        },
        (),
    )
    .unwrap();

    assert_eq!(value, 15);
}

#[test]
fn test_body_runs_on_privileged_thread() {
    init_test_logging();
    let privileged = PrivilegedThread::spawn();
    let driver = thread::current().id();
    let log = EventLog::default();
    let body_log = log.clone();
    let privileged_id = privileged.thread_id;

    let result = run(
        &privileged.handle,
        move |()| {
            let where_am_i = |tid: thread::ThreadId| {
                if tid == privileged_id {
                    "privileged"
                } else if tid == driver {
                    "driver"
                } else {
                    "elsewhere"
                }
            };

            body_log.push(format!("body start: {}", where_am_i(thread::current().id())));
            let call_tid = suspend(|| Ok(thread::current().id()))?;
            body_log.push(format!("pending call: {}", where_am_i(call_tid)));
            body_log.push(format!("body after: {}", where_am_i(thread::current().id())));
            Ok("done")
        },
        (),
    );

    assert_eq!(result.unwrap(), "done");
    assert_eq!(
        log.events(),
        vec![
            "body start: privileged",
            "pending call: driver",
            "body after: privileged",
        ]
    );
    assert_eq!(privileged.shutdown(), 2);
}

#[test]
fn test_sleep_does_not_block_privileged_thread() {
    let privileged = PrivilegedThread::spawn();
    let handle = privileged.handle.clone();

    // While the task sleeps on this thread, the privileged thread stays free
    // to serve another caller.
    let sleeper = thread::spawn(move || {
        run(
            &handle,
            |()| {
                sleep(Duration::from_millis(300))?;
                Ok(())
            },
            (),
        )
    });

    thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    let quick = run(&privileged.handle, |()| Ok(7), ()).unwrap();
    let waited = started.elapsed();

    assert_eq!(quick, 7);
    assert!(waited < Duration::from_millis(250), "waited {waited:?}");

    sleeper.join().unwrap().unwrap();
    privileged.shutdown();
}

#[test]
fn test_poll_query_from_privileged_thread() {
    let privileged = PrivilegedThread::spawn();
    let ready_at = Instant::now() + Duration::from_millis(60);

    let found = run(
        &privileged.handle,
        move |()| {
            let matcher = move |_root: &str, query: &str| -> Vec<String> {
                if Instant::now() >= ready_at {
                    vec![format!("{query} match")]
                } else {
                    Vec::new()
                }
            };
            let options = PollOptions::default()
                .timeout(Duration::from_secs(2))
                .interval(Duration::from_millis(10));
            poll_query("window", "//QPushButton", &matcher, &options)
        },
        (),
    )
    .unwrap();

    assert_eq!(found, vec!["//QPushButton match".to_string()]);
    privileged.shutdown();
}
