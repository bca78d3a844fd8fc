//! Conformance tests for serial and parallel collections driven through a
//! real runner, including nesting and abort chaining.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tickloop::runner::Runner;
use tickloop::step::{from_fn, from_iter, StepResult, ValueCell};
use tickloop::{BreakMode, ParallelCollection, Sequence, SerialCollection};

fn yields(n: usize) -> impl Sequence {
    from_iter(
        std::iter::repeat_with(|| StepResult::Yield)
            .take(n)
            .collect::<Vec<_>>(),
    )
}

/// Yields once, recording the order in which it ran.
fn ordered(label: usize, log: &Arc<Mutex<Vec<usize>>>) -> impl Sequence {
    let log = Arc::clone(log);
    let mut ran = false;
    from_fn(move || {
        if ran {
            return None;
        }
        ran = true;
        log.lock().unwrap().push(label);
        Some(StepResult::Yield)
    })
}

#[test]
fn serial_collection_runs_in_order_under_a_runner() {
    let mut runner = Runner::default();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut collection = SerialCollection::new();
    for label in 1..=3 {
        collection.add(ordered(label, &log)).expect("add");
    }
    let task = runner.enqueue(collection).expect("enqueue");

    // One collection step per tick: A, B, C, then completion on tick 4.
    for tick in 1..=3 {
        assert!(runner.tick());
        assert_eq!(log.lock().unwrap().len(), tick);
        assert!(task.is_running());
    }
    assert!(runner.tick());
    assert!(!task.is_running());
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn parallel_collection_completes_with_slowest_child() {
    let mut runner = Runner::default();
    let mut collection = ParallelCollection::new();
    collection.add(yields(2)).expect("add");
    collection.add(yields(5)).expect("add");
    collection.add(yields(1)).expect("add");
    let task = runner.enqueue(collection).expect("enqueue");

    // Still running for exactly max(k) = 5 ticks.
    for _ in 0..5 {
        assert!(runner.tick());
        assert!(task.is_running());
    }
    assert!(runner.tick());
    assert!(!task.is_running());
}

#[test]
fn parallel_abort_discards_unfinished_children() {
    let mut runner = Runner::default();
    let long_steps = Arc::new(AtomicUsize::new(0));
    let mut collection = ParallelCollection::new();
    {
        let long_steps = Arc::clone(&long_steps);
        collection
            .add(from_fn(move || {
                long_steps.fetch_add(1, Ordering::Relaxed);
                Some(StepResult::Yield)
            }))
            .expect("add");
    }
    collection
        .add(from_iter(vec![
            StepResult::Yield,
            StepResult::Break(BreakMode::BreakAndStop),
        ]))
        .expect("add");

    let task = runner.enqueue(collection).expect("enqueue");
    assert!(runner.tick()); // both children step
    assert!(runner.tick()); // abort surfaces; collection completes
    assert!(!task.is_running());
    assert_eq!(
        long_steps.load(Ordering::Relaxed),
        2,
        "long child stepped on the abort tick, then discarded"
    );
}

#[test]
fn collections_nest_recursively() {
    let mut runner = Runner::default();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut inner = SerialCollection::new();
    inner.add(ordered(10, &log)).expect("add");
    inner.add(ordered(11, &log)).expect("add");

    let mut outer = ParallelCollection::new();
    outer.add(inner).expect("add");
    outer.add(ordered(20, &log)).expect("add");

    let task = runner.enqueue(outer).expect("enqueue");
    while task.is_running() {
        assert!(runner.tick());
    }
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 3, "every leaf ran exactly once");
    // The serial pair keeps its order regardless of interleaving.
    let pos10 = log.iter().position(|&l| l == 10).unwrap();
    let pos11 = log.iter().position(|&l| l == 11).unwrap();
    assert!(pos10 < pos11);
}

#[test]
fn spawned_child_value_lands_in_cell() {
    let mut runner = Runner::default();
    let cell = ValueCell::new();
    let resumed = Arc::new(AtomicBool::new(false));

    let producer = from_iter(vec![StepResult::Yield, StepResult::value(42i64)]);
    let task = {
        let cell = cell.clone();
        let resumed = Arc::clone(&resumed);
        let mut slot = Some(producer);
        runner
            .enqueue(from_fn(move || match slot.take() {
                Some(child) => Some(StepResult::spawn_into(child, &cell)),
                None => {
                    resumed.store(true, Ordering::Relaxed);
                    None
                }
            }))
            .expect("enqueue")
    };

    let mut guard = 0;
    while task.is_running() {
        assert!(runner.tick());
        guard += 1;
        assert!(guard < 20, "parent must resume after the child completes");
    }
    assert!(resumed.load(Ordering::Relaxed));
    assert!(matches!(cell.take().and_then(|v| v.as_int()), Some(42)));
}

#[test]
fn abort_chains_upward_one_level_per_tick() {
    let mut runner = Runner::default();
    let parent_resumed = Arc::new(AtomicBool::new(false));
    let grandparent_resumed = Arc::new(AtomicBool::new(false));

    let child = from_iter(vec![
        StepResult::Yield,
        StepResult::Break(BreakMode::BreakAndStop),
    ]);

    let parent = {
        let resumed = Arc::clone(&parent_resumed);
        let mut slot = Some(child);
        from_fn(move || match slot.take() {
            Some(seq) => Some(StepResult::spawn(seq)),
            None => {
                resumed.store(true, Ordering::Relaxed);
                None
            }
        })
    };

    let grandparent = {
        let resumed = Arc::clone(&grandparent_resumed);
        let mut slot = Some(parent);
        from_fn(move || match slot.take() {
            Some(seq) => Some(StepResult::spawn(seq)),
            None => {
                resumed.store(true, Ordering::Relaxed);
                None
            }
        })
    };

    let task = runner.enqueue(grandparent).expect("enqueue");
    let mut guard = 0;
    while task.is_running() {
        assert!(runner.tick());
        guard += 1;
        assert!(guard < 20, "abort must unwind the chain");
    }

    assert!(
        !parent_resumed.load(Ordering::Relaxed),
        "parent completed by the abort, not by resuming"
    );
    assert!(
        !grandparent_resumed.load(Ordering::Relaxed),
        "abort propagated through the waiting grandparent too"
    );
}

#[test]
fn detached_spawn_lets_the_parent_finish_first() {
    let mut runner = Runner::default();
    let child_done = Arc::new(AtomicBool::new(false));

    let child = {
        let done = Arc::clone(&child_done);
        let mut remaining = 5;
        from_fn(move || {
            if remaining > 0 {
                remaining -= 1;
                Some(StepResult::Yield)
            } else {
                done.store(true, Ordering::Relaxed);
                None
            }
        })
    };

    let task = {
        let mut slot = Some(child);
        runner
            .enqueue(from_fn(move || {
                slot.take().map(StepResult::spawn_detached)
            }))
            .expect("enqueue")
    };

    assert!(runner.tick());
    assert!(runner.tick());
    assert!(!task.is_running(), "parent did not wait for its child");
    assert!(!child_done.load(Ordering::Relaxed));

    for _ in 0..6 {
        assert!(runner.tick());
    }
    assert!(child_done.load(Ordering::Relaxed), "fire-and-forget child ran on");
}
