// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests driving a scheduler from several threads.
//!
//! The test thread plays the main thread: it calls the heartbeat while other
//! threads submit, cancel, and wait on call-through futures.

use metronome_core::{CallError, NamedPlugin, PluginHandle, TaskId};
use metronome_scheduler::{Scheduler, SchedulerConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Helper: a scheduler with a small thread pool and a single owner.
fn scheduler() -> (Arc<Scheduler>, PluginHandle) {
    let config = SchedulerConfig {
        worker_threads: 2,
        worker_thread_name: "Test Worker".to_string(),
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(&config).expect("worker pool should start");
    (scheduler, PluginHandle::new(NamedPlugin::new("integration")))
}

/// Helper: heartbeats from `tick` upward until `done` holds or time runs out.
fn pump_until(scheduler: &Scheduler, mut tick: u64, done: impl Fn() -> bool) -> u64 {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        scheduler.main_thread_heartbeat(tick);
        tick += 1;
        thread::sleep(Duration::from_millis(1));
    }
    tick
}

// ─────────────────────────────────────────────────────────────────────────────
// Submission
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_concurrent_producers_keep_per_thread_order() {
    let (scheduler, owner) = scheduler();
    let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::default();

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let scheduler = Arc::clone(&scheduler);
            let owner = owner.clone();
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                for index in 0..100 {
                    let seen = Arc::clone(&seen);
                    scheduler
                        .run_task(&owner, move || {
                            seen.lock().unwrap().push((producer, index));
                            anyhow::Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    scheduler.main_thread_heartbeat(0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 400, "every task runs exactly once");
    let mut last: HashMap<usize, usize> = HashMap::new();
    for &(producer, index) in seen.iter() {
        if let Some(previous) = last.insert(producer, index) {
            assert!(previous < index, "producer {producer} ran out of order");
        }
    }
}

#[test]
fn test_ids_are_unique_across_threads() {
    let (scheduler, owner) = scheduler();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            let owner = owner.clone();
            thread::spawn(move || {
                (0..50)
                    .map(|_| scheduler.run_task_later(&owner, || anyhow::Ok(()), 10).unwrap().id())
                    .collect::<Vec<TaskId>>()
            })
        })
        .collect();

    let mut ids: Vec<TaskId> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
    assert_eq!(scheduler.pending_tasks().len(), 200);
}

// ─────────────────────────────────────────────────────────────────────────────
// Async execution
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_async_tasks_run_on_named_workers() {
    let (scheduler, owner) = scheduler();
    let (tx, rx) = crossbeam_channel::unbounded();
    let main_thread = thread::current().id();

    for _ in 0..3 {
        let tx = tx.clone();
        scheduler
            .run_task_async(&owner, move || {
                let current = thread::current();
                tx.send((current.id(), current.name().map(str::to_owned)))?;
                anyhow::Ok(())
            })
            .unwrap();
    }
    scheduler.main_thread_heartbeat(0);

    for _ in 0..3 {
        let (thread_id, name) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("async task should run");
        assert_ne!(thread_id, main_thread);
        assert!(name.unwrap_or_default().starts_with("Test Worker - "));
    }
}

#[test]
fn test_async_task_leaves_registry_when_done() {
    let (scheduler, owner) = scheduler();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let handle = scheduler
        .run_task_async(&owner, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        })
        .unwrap();

    let id = handle.id();
    pump_until(&scheduler, 0, || {
        runs.load(Ordering::SeqCst) == 1 && !scheduler.is_queued(id)
    });
    assert!(scheduler.active_workers().is_empty());
    assert!(scheduler.pending_tasks().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Call-through
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_call_sync_method_from_worker_thread() {
    let (scheduler, owner) = scheduler();
    let main_thread = thread::current().id();

    let caller = {
        let scheduler = Arc::clone(&scheduler);
        thread::spawn(move || {
            let future = scheduler
                .call_sync_method(&owner, move || Ok(thread::current().id()))
                .unwrap();
            future.wait()
        })
    };

    pump_until(&scheduler, 0, || caller.is_finished());
    let ran_on = caller.join().unwrap().expect("call should complete");
    assert_eq!(ran_on, main_thread);
}

#[test]
fn test_cancelled_call_wakes_waiter() {
    let (scheduler, owner) = scheduler();
    let future = scheduler.call_sync_method(&owner, || Ok(5)).unwrap();
    let id = future.task_id();

    let waiter = thread::spawn(move || future.wait_timeout(Duration::from_secs(5)));
    thread::sleep(Duration::from_millis(10));
    scheduler.cancel_task(id);
    scheduler.main_thread_heartbeat(0);

    let outcome = waiter.join().unwrap();
    assert!(matches!(outcome, Err(CallError::Cancelled)), "got {outcome:?}");
}

#[test]
fn test_failed_call_reports_error() {
    let (scheduler, owner) = scheduler();
    let future = scheduler
        .call_sync_method::<u8, _>(&owner, || Err(anyhow::anyhow!("no such world")))
        .unwrap();

    scheduler.main_thread_heartbeat(0);
    match future.wait() {
        Err(CallError::Failed(err)) => assert!(err.to_string().contains("no such world")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_cross_thread_cancel_stops_periodic_task() {
    let (scheduler, owner) = scheduler();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let handle = scheduler
        .run_task_timer(
            &owner,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            },
            0,
            1,
        )
        .unwrap();

    let tick = pump_until(&scheduler, 0, || runs.load(Ordering::SeqCst) >= 3);
    let canceller = thread::spawn(move || handle.cancel());
    canceller.join().unwrap();

    let before = runs.load(Ordering::SeqCst);
    for extra in 0..5 {
        scheduler.main_thread_heartbeat(tick + extra);
    }
    assert_eq!(runs.load(Ordering::SeqCst), before);
    assert!(scheduler.pending_tasks().is_empty());
}

#[test]
fn test_racing_cancels_never_double_run() {
    let (scheduler, owner) = scheduler();
    let counters: Vec<Arc<AtomicUsize>> = (0..100).map(|_| Arc::default()).collect();
    let mut ids = Vec::new();
    for counter in &counters {
        let counter = Arc::clone(counter);
        let handle = scheduler
            .run_task(&owner, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            })
            .unwrap();
        ids.push(handle.id());
    }

    let cancelled: Vec<TaskId> = ids.iter().copied().step_by(2).collect();
    let canceller = {
        let scheduler = Arc::clone(&scheduler);
        let cancelled = cancelled.clone();
        thread::spawn(move || {
            for id in cancelled {
                scheduler.cancel_task(id);
            }
        })
    };
    scheduler.main_thread_heartbeat(0);
    canceller.join().unwrap();
    scheduler.main_thread_heartbeat(1);

    for (index, counter) in counters.iter().enumerate() {
        let runs = counter.load(Ordering::SeqCst);
        if index % 2 == 0 {
            assert!(runs <= 1, "task {index} ran {runs} times");
        } else {
            assert_eq!(runs, 1, "task {index} was never cancelled but ran {runs} times");
        }
    }
    for id in ids {
        assert!(!scheduler.is_queued(id));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shutdown
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_last_reference_dropped_on_worker() {
    let (scheduler, owner) = scheduler();
    let weak = Arc::downgrade(&scheduler);
    let (held_tx, held_rx) = crossbeam_channel::bounded(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);

    scheduler
        .run_task_async(&owner, move || {
            let strong = weak.upgrade();
            held_tx.send(strong.is_some())?;
            release_rx.recv_timeout(Duration::from_secs(5))?;
            // Tears down the scheduler and its pool on this worker.
            drop(strong);
            done_tx.send(())?;
            anyhow::Ok(())
        })
        .unwrap();
    scheduler.main_thread_heartbeat(0);

    let held = held_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("async task should start");
    assert!(held);
    drop(scheduler);
    release_tx.send(()).unwrap();

    assert!(
        done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "dropping the scheduler from its own worker must not panic"
    );
}
