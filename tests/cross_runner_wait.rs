//! Cross-runner continuation waits: a task on one runner suspends on a task
//! living on another runner's thread, with the epoch read racing the remote
//! resolution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tickloop::runner::Runner;
use tickloop::step::{from_fn, from_iter, StepResult};
use tickloop::Sequence;

fn yields(n: usize) -> impl Sequence {
    from_iter(
        std::iter::repeat_with(|| StepResult::Yield)
            .take(n)
            .collect::<Vec<_>>(),
    )
}

#[test]
fn task_waits_on_a_task_from_another_runner() {
    // The remote runner ticks on its own thread until killed.
    let mut remote = Runner::default();
    let remote_handle = remote.handle();
    let remote_task = remote_handle.enqueue(yields(10)).expect("enqueue remote");
    let remote_thread = std::thread::spawn(move || {
        while remote.tick() {
            std::thread::sleep(Duration::from_micros(200));
        }
    });

    // The local task yields the remote task's continuation, then finishes.
    let mut local = Runner::default();
    let continuation = remote_task.continuation();
    let local_task = local
        .enqueue(from_iter(vec![
            StepResult::Continuation(continuation),
            StepResult::value("joined"),
        ]))
        .expect("enqueue local");

    let deadline = Instant::now() + Duration::from_secs(10);
    while local_task.is_running() {
        assert!(local.tick());
        assert!(Instant::now() < deadline, "local task never resumed");
        std::thread::sleep(Duration::from_micros(100));
    }

    assert!(!remote_task.is_running(), "wait resolved after remote completion");
    assert_eq!(
        local_task.take_value().and_then(|v| v.as_text().map(String::from)),
        Some("joined".to_owned())
    );

    remote_handle.kill();
    remote_thread.join().expect("remote join");
}

#[test]
fn handle_wait_timeout_blocks_a_foreign_thread_only() {
    let mut runner = Runner::default();
    let steps = Arc::new(AtomicUsize::new(0));
    let task = {
        let steps = Arc::clone(&steps);
        runner
            .enqueue(from_fn(move || {
                if steps.fetch_add(1, Ordering::Relaxed) < 20 {
                    Some(StepResult::Yield)
                } else {
                    None
                }
            }))
            .expect("enqueue")
    };

    // A foreign thread blocks on the handle while this thread keeps ticking.
    let waiter = {
        let task = task.clone();
        std::thread::spawn(move || task.wait_timeout(Duration::from_secs(10)))
    };
    while task.is_running() {
        assert!(runner.tick());
    }
    waiter
        .join()
        .expect("waiter join")
        .expect("wait succeeds once the task completes");
    assert_eq!(steps.load(Ordering::Relaxed), 21);
}
