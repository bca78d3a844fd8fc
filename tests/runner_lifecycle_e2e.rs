//! End-to-end lifecycle tests for the runner: batch visibility, pause,
//! drain, and kill semantics as seen by producers on other threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tickloop::runner::{Lifecycle, Runner};
use tickloop::step::{from_fn, from_iter, StepResult};
use tickloop::ErrorKind;

fn yields(n: usize) -> impl tickloop::Sequence {
    from_iter(
        std::iter::repeat_with(|| StepResult::Yield)
            .take(n)
            .collect::<Vec<_>>(),
    )
}

#[test]
fn same_tick_registrations_become_visible_as_one_batch() {
    let mut runner = Runner::default();
    let handle = runner.handle();

    // Register from several producer threads before any tick runs.
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            std::thread::spawn(move || handle.enqueue(yields(2)).expect("enqueue"))
        })
        .collect();
    let tasks: Vec<_> = producers
        .into_iter()
        .map(|p| p.join().expect("producer join"))
        .collect();

    // Nothing executed before the tick boundary.
    assert_eq!(runner.live_count(), 0);
    for task in &tasks {
        assert!(task.is_running());
    }

    // The whole batch surfaces at once.
    assert!(runner.tick());
    assert_eq!(runner.live_count(), 4);
}

#[test]
fn step_counts_confirm_no_pre_tick_execution() {
    let mut runner = Runner::default();
    let steps = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let steps = Arc::clone(&steps);
        runner
            .enqueue(from_fn(move || {
                steps.fetch_add(1, Ordering::Relaxed);
                Some(StepResult::Yield)
            }))
            .expect("enqueue");
    }
    assert_eq!(steps.load(Ordering::Relaxed), 0);
    assert!(runner.tick());
    assert_eq!(steps.load(Ordering::Relaxed), 3, "each task stepped once");
}

#[test]
fn pause_freezes_both_execution_and_visibility() {
    let mut runner = Runner::default();
    let handle = runner.handle();
    let steps = Arc::new(AtomicUsize::new(0));
    {
        let steps = Arc::clone(&steps);
        runner
            .enqueue(from_fn(move || {
                steps.fetch_add(1, Ordering::Relaxed);
                Some(StepResult::Yield)
            }))
            .expect("enqueue");
    }
    assert!(runner.tick());
    assert_eq!(steps.load(Ordering::Relaxed), 1);

    handle.pause().expect("pause");
    assert!(handle.is_paused());
    for _ in 0..5 {
        assert!(runner.tick());
    }
    assert_eq!(steps.load(Ordering::Relaxed), 1, "paused ticks advance nothing");

    // Registration stays legal while paused; the task just waits.
    runner.enqueue(yields(1)).expect("enqueue while paused");
    assert_eq!(runner.live_count(), 1);

    handle.resume().expect("resume");
    assert!(runner.tick());
    assert_eq!(runner.live_count(), 2);
    assert!(steps.load(Ordering::Relaxed) > 1);
}

#[test]
fn explicit_task_stop_skips_user_code() {
    let mut runner = Runner::default();
    let steps = Arc::new(AtomicUsize::new(0));
    let task = {
        let steps = Arc::clone(&steps);
        runner
            .enqueue(from_fn(move || {
                steps.fetch_add(1, Ordering::Relaxed);
                Some(StepResult::Yield)
            }))
            .expect("enqueue")
    };
    assert!(runner.tick());
    assert_eq!(steps.load(Ordering::Relaxed), 1);

    task.stop();
    assert!(runner.tick());
    assert!(!task.is_running(), "stop consulted at top of next step");
    assert_eq!(steps.load(Ordering::Relaxed), 1, "user code not resumed");
}

#[test]
fn drain_then_unstop_preserves_queued_tasks() {
    let mut runner = Runner::default();
    let handle = runner.handle();
    runner.enqueue(yields(2)).expect("enqueue");
    assert!(runner.tick());

    handle.stop();
    assert_eq!(handle.lifecycle(), Lifecycle::Stopping);
    let queued = handle.enqueue(yields(1)).expect("enqueue while stopping");
    assert_eq!(
        handle.resume().expect_err("resume while stopping").kind(),
        ErrorKind::RunnerStopping
    );

    // Live task runs to completion under the drain.
    assert!(runner.tick());
    assert!(runner.tick());
    assert!(runner.tick());
    assert_eq!(handle.lifecycle(), Lifecycle::Accepting);
    assert!(queued.is_running());
    assert!(runner.live_count() > 0, "queued task surfaced after unstop");
}

#[test]
fn kill_discards_everything_and_resolves_handles() {
    let mut runner = Runner::default();
    let handle = runner.handle();
    let live = runner.enqueue(yields(100)).expect("enqueue");
    assert!(runner.tick());
    let queued = handle.enqueue(yields(100)).expect("enqueue");

    handle.kill();
    assert!(!runner.tick(), "tick reports the kill to the host loop");
    assert_eq!(handle.lifecycle(), Lifecycle::Killed);

    // Both the live and the never-run task resolve, so nobody waits on a
    // task that will never run.
    assert!(!live.is_running());
    assert!(!queued.is_running());

    // The killed runner rejects further control.
    assert_eq!(
        handle.pause().expect_err("pause after kill").kind(),
        ErrorKind::RunnerKilled
    );
    assert_eq!(
        handle.resume().expect_err("resume after kill").kind(),
        ErrorKind::RunnerKilled
    );
    assert_eq!(
        handle.enqueue(yields(1)).expect_err("enqueue after kill").kind(),
        ErrorKind::RunnerKilled
    );
}

#[test]
fn fault_is_isolated_to_the_faulting_task() {
    let mut runner = Runner::default();
    let hook_fired = Arc::new(AtomicUsize::new(0));
    let survivor_steps = Arc::new(AtomicUsize::new(0));

    {
        let hook_fired = Arc::clone(&hook_fired);
        runner
            .handle()
            .enqueue_supervised(
                from_fn(|| panic!("intentional fault")),
                Box::new(move |error| {
                    assert_eq!(error.kind(), ErrorKind::TaskFault);
                    assert_eq!(error.detail(), Some("intentional fault"));
                    hook_fired.fetch_add(1, Ordering::Relaxed);
                }),
            )
            .expect("enqueue");
    }
    {
        let survivor_steps = Arc::clone(&survivor_steps);
        runner
            .enqueue(from_fn(move || {
                survivor_steps.fetch_add(1, Ordering::Relaxed);
                if survivor_steps.load(Ordering::Relaxed) < 3 {
                    Some(StepResult::Yield)
                } else {
                    None
                }
            }))
            .expect("enqueue");
    }

    for _ in 0..4 {
        assert!(runner.tick(), "runner survives the fault");
    }
    assert_eq!(hook_fired.load(Ordering::Relaxed), 1);
    assert_eq!(survivor_steps.load(Ordering::Relaxed), 3);
    assert_eq!(runner.live_count(), 0);
}

#[test]
fn metrics_are_readable_from_another_thread() {
    let mut runner = Runner::default();
    let handle = runner.handle();
    runner.enqueue(yields(3)).expect("enqueue");
    assert!(runner.tick());

    let observed = std::thread::spawn(move || handle.metrics())
        .join()
        .expect("reader join");
    assert_eq!(observed.ticks, 1);
    assert_eq!(observed.live, 1);
    assert_eq!(observed.lifecycle, Lifecycle::Accepting);
}
