//! Integration tests for the full feedback-queue algorithm.
//!
//! These tests validate:
//! 1. Cooperative units run under a real controller thread and terminate
//! 2. Lazy reaping frees identifiers and never starts a dead unit
//! 3. New arrivals preempt long-running units sunk to lower levels
//! 4. Self-lookup and parent derivation work from inside unit bodies

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mlfq_scheduler::builders::{build_scheduler, spawn_controller};
use mlfq_scheduler::config::SchedulerConfig;
use mlfq_scheduler::core::{CooperativeUnit, ExecutableUnit, FeedbackScheduler, TickOutcome, UnitId};

use parking_lot::Mutex;

/// Poll `cond` every few milliseconds until it holds or `deadline` elapses.
fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn fast_scheduler(max_units: usize) -> Arc<FeedbackScheduler> {
    build_scheduler(
        &SchedulerConfig::new()
            .with_quantum_ms(10)
            .with_max_units(max_units),
    )
    .unwrap()
}

#[test]
fn test_units_run_to_completion_and_are_reaped() {
    let scheduler = fast_scheduler(4);
    let controller = spawn_controller(&scheduler).unwrap();

    let mut counters = Vec::new();
    for _ in 0..2 {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_body = Arc::clone(&counter);
        let sched = Arc::clone(&scheduler);
        scheduler
            .register(Arc::new(CooperativeUnit::new(move |gate| {
                for _ in 0..20 {
                    gate.checkpoint();
                    counter_body.fetch_add(1, Ordering::Release);
                    thread::sleep(Duration::from_millis(1));
                }
                assert!(sched.request_termination());
            })))
            .unwrap();
        counters.push(counter);
    }

    assert!(
        wait_until(Duration::from_secs(10), || scheduler.stats().queued_units == 0),
        "units were not reaped in time: {:?}",
        scheduler.stats()
    );
    for counter in &counters {
        assert_eq!(counter.load(Ordering::Acquire), 20);
    }
    let stats = scheduler.stats();
    assert_eq!(stats.reaps, 2);
    assert_eq!(stats.allocated_ids, 0);

    controller.shutdown().unwrap();
}

#[test]
fn test_terminated_before_dispatch_is_never_started() {
    // No controller thread: tick manually for determinism.
    let scheduler = fast_scheduler(1);

    let ran = Arc::new(AtomicBool::new(false));
    let ran_body = Arc::clone(&ran);
    let unit = Arc::new(CooperativeUnit::new(move |_gate| {
        ran_body.store(true, Ordering::Release);
    }));
    let unit_dyn: Arc<dyn ExecutableUnit> = unit.clone();
    let block = scheduler.register(unit_dyn).unwrap();
    block.set_terminated();

    assert_eq!(scheduler.tick(), TickOutcome::Reaped(block.id()));
    assert!(!unit.is_alive());
    assert!(!ran.load(Ordering::Acquire));
    assert_eq!(scheduler.stats().queued_units, 0);
}

#[test]
fn test_new_arrival_outruns_sunk_long_runner() {
    let scheduler = fast_scheduler(2);
    let controller = spawn_controller(&scheduler).unwrap();

    // A long runner that only stops when asked.
    let stop = Arc::new(AtomicBool::new(false));
    let stop_body = Arc::clone(&stop);
    let sched_a = Arc::clone(&scheduler);
    scheduler
        .register(Arc::new(CooperativeUnit::new(move |gate| {
            while !stop_body.load(Ordering::Acquire) {
                gate.checkpoint();
                thread::sleep(Duration::from_millis(1));
            }
            sched_a.request_termination();
        })))
        .unwrap();

    // Let it sink below level 0.
    assert!(wait_until(Duration::from_secs(10), || {
        scheduler.stats().demotions >= 1
    }));

    // A fresh unit arrives at level 0 and completes despite the long
    // runner never yielding the queue voluntarily.
    let done = Arc::new(AtomicBool::new(false));
    let done_body = Arc::clone(&done);
    let sched_b = Arc::clone(&scheduler);
    scheduler
        .register(Arc::new(CooperativeUnit::new(move |gate| {
            for _ in 0..10 {
                gate.checkpoint();
                thread::sleep(Duration::from_millis(1));
            }
            sched_b.request_termination();
            done_body.store(true, Ordering::Release);
        })))
        .unwrap();

    assert!(
        wait_until(Duration::from_secs(10), || done.load(Ordering::Acquire)),
        "fresh unit did not complete: {:?}",
        scheduler.stats()
    );

    // Wind the long runner down.
    stop.store(true, Ordering::Release);
    assert!(wait_until(Duration::from_secs(10), || {
        scheduler.stats().queued_units == 0
    }));
    controller.shutdown().unwrap();
}

#[test]
fn test_unit_body_sees_own_block_and_children_inherit_parent() {
    let scheduler = fast_scheduler(4);
    let controller = spawn_controller(&scheduler).unwrap();

    let observed: Arc<Mutex<Option<(UnitId, Option<UnitId>)>>> = Arc::new(Mutex::new(None));
    let observed_body = Arc::clone(&observed);
    let sched = Arc::clone(&scheduler);

    let parent_block = scheduler
        .register(Arc::new(CooperativeUnit::new(move |gate| {
            gate.checkpoint();
            let own = sched.find_own().expect("body should find its own block");

            // A unit registering another unit becomes its parent.
            let child = sched
                .register(Arc::new(CooperativeUnit::new({
                    let sched = Arc::clone(&sched);
                    move |_gate| {
                        sched.request_termination();
                    }
                })))
                .unwrap();
            *observed_body.lock() = Some((own.id(), child.parent_id()));
            sched.request_termination();
        })))
        .unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        scheduler.stats().queued_units == 0
    }));

    let (own_id, child_parent) = observed.lock().take().expect("body did not run");
    assert_eq!(own_id, parent_block.id());
    assert_eq!(child_parent, Some(parent_block.id()));

    controller.shutdown().unwrap();
}

#[test]
fn test_exhaustion_recovers_after_reap_under_running_controller() {
    let scheduler = fast_scheduler(2);
    let controller = spawn_controller(&scheduler).unwrap();

    let make_unit = |scheduler: &Arc<FeedbackScheduler>| {
        let sched = Arc::clone(scheduler);
        Arc::new(CooperativeUnit::new(move |gate| {
            gate.checkpoint();
            sched.request_termination();
        }))
    };

    scheduler.register(make_unit(&scheduler)).unwrap();
    scheduler.register(make_unit(&scheduler)).unwrap();

    // A third registration may be rejected or admitted depending on how
    // quickly the controller reaps; either way the pool stays bounded.
    let _ = scheduler.register(make_unit(&scheduler));

    // Both units self-terminate, so capacity comes back.
    assert!(wait_until(Duration::from_secs(10), || {
        scheduler.stats().allocated_ids == 0
    }));
    let block = scheduler.register(make_unit(&scheduler)).unwrap();
    assert!(block.id() < 2);

    assert!(wait_until(Duration::from_secs(10), || {
        scheduler.stats().queued_units == 0
    }));
    controller.shutdown().unwrap();
}
