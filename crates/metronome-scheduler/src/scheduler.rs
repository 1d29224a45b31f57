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

//! The scheduler facade and its per-tick drive routine.
//!
//! Ground rules:
//! - Any thread may submit, cancel, and query. Submission only appends to the
//!   lock-free [`SubmissionQueue`].
//! - The main thread alone drains the queue and owns the pending schedule and
//!   the staging list. Anything that has to change those from another thread
//!   is sent as a [`ControlOp`] through the same queue.
//! - The runner registry gives every thread a moderately up-to-date view of
//!   active tasks. Sync tasks leave it only on the main thread; async tasks
//!   remove themselves.
//! - A scheduler is built as a pair: the main half runs sync tasks and forwards
//!   anything asynchronous to its async half, which hands due tasks to a
//!   [`WorkerPool`]. The async half never calls back into the main half.

use crate::config::SchedulerConfig;
use crate::control::{ControlOp, MainState};
use crate::future::{self, SyncFuture};
use crate::id::TASK_IDS;
use crate::pending::PendingSchedule;
use crate::pool::ThreadWorkerPool;
use crate::queue::{Entry, SubmissionQueue};
use crate::registry::RunnerRegistry;
use crate::task::{Runnable, Task, TaskHandle};
use metronome_core::{
    normalize_delay, normalize_period, period, PluginHandle, SchedulerError, SchedulerResult,
    TaskId, TaskKind, Tick, WorkerInfo, WorkerPool,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

enum Half {
    /// Runs sync tasks on the main thread and forwards async work.
    Main { async_half: Arc<Scheduler> },
    /// Hands due tasks to the worker pool.
    Async { pool: Arc<dyn WorkerPool> },
}

/// A tick-synchronized task scheduler.
pub struct Scheduler {
    this: Weak<Scheduler>,
    half: Half,
    queue: SubmissionQueue,
    registry: Arc<RunnerRegistry>,
    main: Mutex<MainState>,
    current_tick: AtomicU64,
    /// Raw id of the sync task being executed, zero when idle.
    current_task: AtomicU64,
}

impl Scheduler {
    /// Creates a scheduler whose async half runs on a [`ThreadWorkerPool`].
    pub fn new(config: &SchedulerConfig) -> io::Result<Arc<Self>> {
        let pool = ThreadWorkerPool::new(config)?;
        Ok(Self::with_pool(config, Arc::new(pool)))
    }

    /// Creates a scheduler whose async half runs on `pool`.
    pub fn with_pool(config: &SchedulerConfig, pool: Arc<dyn WorkerPool>) -> Arc<Self> {
        let async_half = Self::build(config, Half::Async { pool });
        Self::build(config, Half::Main { async_half })
    }

    fn build(config: &SchedulerConfig, half: Half) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            half,
            queue: SubmissionQueue::new(),
            registry: Arc::new(RunnerRegistry::new()),
            main: Mutex::new(MainState {
                pending: PendingSchedule::with_capacity(config.pending_capacity),
                staged: Vec::new(),
            }),
            current_tick: AtomicU64::new(0),
            current_task: AtomicU64::new(0),
        })
    }

    fn async_half(&self) -> Option<&Arc<Scheduler>> {
        match &self.half {
            Half::Main { async_half } => Some(async_half),
            Half::Async { .. } => None,
        }
    }

    /// The tick recorded by the last heartbeat.
    pub fn current_tick(&self) -> Tick {
        self.current_tick.load(Ordering::Acquire)
    }

    // --- Scheduling ---

    /// Runs `work` on the main thread at the next heartbeat.
    pub fn run_task<R: Runnable>(&self, owner: &PluginHandle, work: R) -> SchedulerResult<TaskHandle> {
        self.run_task_later(owner, work, 0)
    }

    /// Runs `work` on the main thread once, `delay` ticks from now.
    pub fn run_task_later<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
        delay: i64,
    ) -> SchedulerResult<TaskHandle> {
        self.run_task_timer(owner, work, delay, period::NO_REPEATING)
    }

    /// Runs `work` on the main thread `delay` ticks from now, then every
    /// `period` ticks.
    pub fn run_task_timer<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
        delay: i64,
        period: i64,
    ) -> SchedulerResult<TaskHandle> {
        self.submit(owner, Box::new(work), TaskKind::Sync, delay, period)
    }

    /// Runs `work` on a worker thread at the next heartbeat.
    pub fn run_task_async<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
    ) -> SchedulerResult<TaskHandle> {
        self.run_task_later_async(owner, work, 0)
    }

    /// Runs `work` on a worker thread once, `delay` ticks from now.
    pub fn run_task_later_async<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
        delay: i64,
    ) -> SchedulerResult<TaskHandle> {
        self.run_task_timer_async(owner, work, delay, period::NO_REPEATING)
    }

    /// Runs `work` on a worker thread `delay` ticks from now, then every
    /// `period` ticks.
    pub fn run_task_timer_async<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
        delay: i64,
        period: i64,
    ) -> SchedulerResult<TaskHandle> {
        self.submit(owner, Box::new(work), TaskKind::Async, delay, period)
    }

    /// Returns only the id of the scheduled task.
    #[deprecated(note = "use `run_task_later`, which returns a handle")]
    pub fn schedule_sync_delayed_task<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
        delay: i64,
    ) -> SchedulerResult<TaskId> {
        self.run_task_later(owner, work, delay).map(|handle| handle.id())
    }

    /// Returns only the id of the scheduled task.
    #[deprecated(note = "use `run_task_timer`, which returns a handle")]
    pub fn schedule_sync_repeating_task<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
        delay: i64,
        period: i64,
    ) -> SchedulerResult<TaskId> {
        self.run_task_timer(owner, work, delay, period)
            .map(|handle| handle.id())
    }

    /// Returns only the id of the scheduled task.
    #[deprecated(note = "use `run_task_later_async`, which returns a handle")]
    pub fn schedule_async_delayed_task<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
        delay: i64,
    ) -> SchedulerResult<TaskId> {
        self.run_task_later_async(owner, work, delay)
            .map(|handle| handle.id())
    }

    /// Returns only the id of the scheduled task.
    #[deprecated(note = "use `run_task_timer_async`, which returns a handle")]
    pub fn schedule_async_repeating_task<R: Runnable>(
        &self,
        owner: &PluginHandle,
        work: R,
        delay: i64,
        period: i64,
    ) -> SchedulerResult<TaskId> {
        self.run_task_timer_async(owner, work, delay, period)
            .map(|handle| handle.id())
    }

    /// Computes a value on the main thread during the next heartbeat.
    ///
    /// The returned future can be waited on from any thread other than the
    /// main one; the main thread never waits on the caller.
    pub fn call_sync_method<T, F>(
        &self,
        owner: &PluginHandle,
        call: F,
    ) -> SchedulerResult<SyncFuture<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        validate(owner)?;
        let (payload, completion) = future::wrap(call);
        let task = Arc::new(Task::new(
            TASK_IDS.allocate(),
            owner.clone(),
            TaskKind::Sync,
            period::NO_REPEATING,
            payload,
        ));
        self.enqueue(Arc::clone(&task), 0);
        Ok(SyncFuture::new(task, completion))
    }

    fn submit(
        &self,
        owner: &PluginHandle,
        payload: Box<dyn Runnable>,
        kind: TaskKind,
        delay: i64,
        requested_period: i64,
    ) -> SchedulerResult<TaskHandle> {
        validate(owner)?;
        let task = Arc::new(Task::new(
            TASK_IDS.allocate(),
            owner.clone(),
            kind,
            normalize_period(requested_period),
            payload,
        ));
        self.enqueue(Arc::clone(&task), normalize_delay(delay));
        Ok(TaskHandle::new(task, self.this.clone()))
    }

    fn enqueue(&self, task: Arc<Task>, delay: Tick) {
        if let Some(async_half) = self.async_half() {
            if !task.is_sync() {
                async_half.enqueue(task, delay);
                return;
            }
        }
        task.set_next_run(self.current_tick().saturating_add(delay));
        log::trace!(
            "Queued {:?} task {} for tick {}",
            task.kind(),
            task.id(),
            task.next_run()
        );
        self.queue.append(Entry::Task(task));
    }

    // --- Cancellation ---

    /// Cancels a task by id. Unknown or already cancelled ids are ignored.
    ///
    /// A task that is executing right now finishes its current run.
    pub fn cancel_task(&self, id: impl Into<TaskId>) {
        let id = id.into();
        if let Some(async_half) = self.async_half() {
            async_half.cancel_task(id);
        }
        if let Some(task) = self.registry.get(id) {
            self.registry.cancel(&task);
        }
        let fence = self.queue.append(Entry::Control(ControlOp::CancelTask(id)));
        let _: Option<()> = self.queue.scan(Some(&fence), |entry| {
            if let Entry::Task(task) = entry {
                if task.id() == id {
                    task.cancel();
                }
            }
            ControlFlow::Continue(())
        });
    }

    /// Cancels every task owned by `owner`.
    pub fn cancel_tasks(&self, owner: &PluginHandle) {
        if let Some(async_half) = self.async_half() {
            async_half.cancel_tasks(owner);
        }
        let fence = self
            .queue
            .append(Entry::Control(ControlOp::CancelOwner(owner.clone())));
        let _: Option<()> = self.queue.scan(Some(&fence), |entry| {
            if let Entry::Task(task) = entry {
                if task.owner() == owner {
                    task.cancel();
                }
            }
            ControlFlow::Continue(())
        });
        for task in self.registry.snapshot() {
            if task.owner() == owner {
                self.registry.cancel(&task);
            }
        }
    }

    /// Cancels every task of every owner.
    pub fn cancel_all_tasks(&self) {
        if let Some(async_half) = self.async_half() {
            async_half.cancel_all_tasks();
        }
        let fence = self.queue.append(Entry::Control(ControlOp::CancelAll));
        let _: Option<()> = self.queue.scan(Some(&fence), |entry| {
            if let Entry::Task(task) = entry {
                task.cancel();
            }
            ControlFlow::Continue(())
        });
        for task in self.registry.snapshot() {
            self.registry.cancel(&task);
        }
    }

    // --- Queries ---

    /// `true` if the task's payload is executing right now: on the main
    /// thread for sync tasks, on any worker for async ones.
    pub fn is_currently_running(&self, id: TaskId) -> bool {
        if let Some(async_half) = self.async_half() {
            if async_half.is_currently_running(id) {
                return true;
            }
        }
        let Some(task) = self.registry.get(id) else {
            return false;
        };
        let running = if task.is_sync() {
            self.current_task.load(Ordering::Acquire) == id.get()
        } else {
            !task.workers().is_empty()
        };
        running
    }

    /// `true` if the task is known and will run at least once more.
    pub fn is_queued(&self, id: TaskId) -> bool {
        if let Some(async_half) = self.async_half() {
            if async_half.is_queued(id) {
                return true;
            }
        }
        let queued = self.queue.scan(None, |entry| match entry {
            Entry::Task(task) if task.id() == id => ControlFlow::Break(task.will_run()),
            _ => ControlFlow::Continue(()),
        });
        queued.unwrap_or_else(|| self.registry.get(id).is_some_and(|task| task.will_run()))
    }

    /// Every task that will still run: registered ones first, then those not
    /// yet drained from the queue, followed by the async half's.
    pub fn pending_tasks(&self) -> Vec<TaskHandle> {
        let mut tasks: Vec<Arc<Task>> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|task| task.will_run())
            .collect();
        let mut seen: HashSet<TaskId> = tasks.iter().map(|task| task.id()).collect();
        let _: Option<()> = self.queue.scan(None, |entry| {
            if let Entry::Task(task) = entry {
                if task.will_run() && seen.insert(task.id()) {
                    tasks.push(Arc::clone(task));
                }
            }
            ControlFlow::Continue(())
        });
        tasks.sort_by_key(|task| task.id());

        let mut handles: Vec<TaskHandle> = tasks
            .into_iter()
            .map(|task| TaskHandle::new(task, self.this.clone()))
            .collect();
        if let Some(async_half) = self.async_half() {
            handles.extend(async_half.pending_tasks());
        }
        handles
    }

    /// Workers currently executing async tasks.
    pub fn active_workers(&self) -> Vec<WorkerInfo> {
        match &self.half {
            Half::Main { async_half } => async_half.active_workers(),
            Half::Async { .. } => self
                .registry
                .snapshot()
                .iter()
                .filter(|task| !task.is_sync())
                .flat_map(|task| task.workers().clone())
                .collect(),
        }
    }

    // --- Tick drive ---

    /// Executes everything due at `tick`. Main thread only, once per tick.
    ///
    /// Never waits on a producer. A failing task is logged against its owner
    /// and does not affect the rest of the tick. A nested or concurrent call
    /// is logged and ignored.
    pub fn main_thread_heartbeat(&self, tick: Tick) {
        let Some(mut main) = self.main.try_lock() else {
            log::error!("Heartbeat for tick {tick} ignored: a heartbeat is already in progress.");
            return;
        };
        if let Some(async_half) = self.async_half() {
            async_half.main_thread_heartbeat(tick);
        }
        self.current_tick.store(tick, Ordering::Release);

        let state = &mut *main;
        self.drain(state);
        while let Some(task) = state.pending.pop_due(tick) {
            if !task.will_run() {
                if task.is_sync() {
                    self.registry.remove_task(&task);
                }
                task.discard();
                self.drain(state);
                continue;
            }

            match &self.half {
                Half::Main { .. } if task.is_sync() => {
                    self.run_sync(&task);
                    self.drain(state);
                }
                Half::Main { .. } => {
                    log::error!(
                        target: task.owner().name(),
                        "Unexpected async task {} in the sync scheduler; skipping it.",
                        task.id()
                    );
                }
                Half::Async { pool } => {
                    self.dispatch(pool.as_ref(), &task);
                    self.drain(state);
                }
            }

            let period = task.period();
            if period > 0 {
                task.set_next_run(tick.saturating_add(period as Tick));
                state.staged.push(task);
            } else if task.is_sync() {
                self.registry.remove_task(&task);
            }
        }
        let staged = std::mem::take(&mut state.staged);
        state.pending.extend(staged);
        log::trace!("Tick {tick} done, {} task(s) pending", state.pending.len());
    }

    fn drain(&self, state: &mut MainState) {
        self.queue.drain(|entry| match entry {
            Entry::Stub => {}
            Entry::Control(op) => op.apply(state, &self.registry),
            Entry::Task(task) => {
                if task.will_run() {
                    state.pending.push(Arc::clone(task));
                    self.registry.insert(Arc::clone(task));
                } else {
                    task.discard();
                }
            }
        });
    }

    fn run_sync(&self, task: &Task) {
        self.current_task.store(task.id().get(), Ordering::Release);
        if let Err(err) = task.run() {
            log::warn!(
                target: task.owner().name(),
                "Task {} for {} generated an error: {err:#}",
                task.id(),
                task.owner().name()
            );
        }
        self.current_task.store(0, Ordering::Release);
    }

    fn dispatch(&self, pool: &dyn WorkerPool, task: &Arc<Task>) {
        self.registry.insert(Arc::clone(task));
        let registry = Arc::clone(&self.registry);
        let task = Arc::clone(task);
        pool.execute(Box::new(move || run_async(&task, &registry)));
    }
}

/// Worker-side execution of an async task.
fn run_async(task: &Arc<Task>, registry: &RunnerRegistry) {
    let worker = WorkerInfo::current(task.id(), task.owner().clone());
    {
        let mut workers = task.workers();
        if task.is_cancelled() {
            let idle = workers.is_empty();
            drop(workers);
            if idle {
                registry.remove_task(task);
            }
            return;
        }
        workers.push(worker.clone());
    }

    if let Err(err) = task.run() {
        log::warn!(
            target: task.owner().name(),
            "Asynchronous task {} for {} generated an error: {err:#}",
            task.id(),
            task.owner().name()
        );
    }

    let finished = {
        let mut workers = task.workers();
        if let Some(index) = workers.iter().position(|active| *active == worker) {
            workers.swap_remove(index);
        }
        workers.is_empty() && task.period() < 0
    };
    if finished {
        registry.remove_task(task);
    }
}

fn validate(owner: &PluginHandle) -> SchedulerResult<()> {
    if owner.is_enabled() {
        Ok(())
    } else {
        Err(SchedulerError::PluginDisabled {
            plugin: owner.name().to_owned(),
        })
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let half = match self.half {
            Half::Main { .. } => "main",
            Half::Async { .. } => "async",
        };
        f.debug_struct("Scheduler")
            .field("half", &half)
            .field("current_tick", &self.current_tick())
            .field("registered", &self.registry.len())
            .finish()
    }
}
