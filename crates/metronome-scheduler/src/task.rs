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

//! The unit of schedulable work and the handle returned to callers.

use crate::scheduler::Scheduler;
use metronome_core::{period, PluginHandle, TaskId, TaskKind, Tick, WorkerInfo};
use parking_lot::{Mutex, MutexGuard};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Work that can be scheduled.
///
/// Implemented for every `FnMut() -> anyhow::Result<()>` closure. An `Err`
/// is logged against the owning plugin and never stops the tick.
pub trait Runnable: Send + 'static {
    /// Executes one run of the task.
    fn run(&mut self) -> anyhow::Result<()>;
}

impl<F> Runnable for F
where
    F: FnMut() -> anyhow::Result<()> + Send + 'static,
{
    fn run(&mut self) -> anyhow::Result<()> {
        self()
    }
}

/// A scheduled task.
///
/// `period` doubles as the cancellation marker: once it holds
/// [`period::CANCELLED`] it never changes again.
pub struct Task {
    id: TaskId,
    owner: PluginHandle,
    kind: TaskKind,
    period: AtomicI64,
    next_run: AtomicU64,
    payload: Mutex<Option<Box<dyn Runnable>>>,
    workers: Mutex<Vec<WorkerInfo>>,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        owner: PluginHandle,
        kind: TaskKind,
        period: i64,
        payload: Box<dyn Runnable>,
    ) -> Self {
        Self {
            id,
            owner,
            kind,
            period: AtomicI64::new(period),
            next_run: AtomicU64::new(0),
            payload: Mutex::new(Some(payload)),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn owner(&self) -> &PluginHandle {
        &self.owner
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.kind
    }

    pub(crate) fn is_sync(&self) -> bool {
        self.kind.is_sync()
    }

    pub(crate) fn period(&self) -> i64 {
        self.period.load(Ordering::Acquire)
    }

    pub(crate) fn next_run(&self) -> Tick {
        self.next_run.load(Ordering::Acquire)
    }

    pub(crate) fn set_next_run(&self, tick: Tick) {
        self.next_run.store(tick, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.period() == period::CANCELLED
    }

    /// Returns `true` if the task is still expected to run at least once more.
    pub(crate) fn will_run(&self) -> bool {
        self.period() >= period::NO_REPEATING
    }

    /// Marks the task cancelled. Returns `false` if it already was.
    pub(crate) fn cancel(&self) -> bool {
        self.period.swap(period::CANCELLED, Ordering::AcqRel) != period::CANCELLED
    }

    /// Drops the payload of a task that will never run again.
    ///
    /// Skipped if a worker is still inside the payload; it is then freed
    /// with the task itself.
    pub(crate) fn discard(&self) {
        if let Some(mut payload) = self.payload.try_lock() {
            drop(payload.take());
        }
    }

    /// Runs the payload once, converting a panic into an error.
    pub(crate) fn run(&self) -> anyhow::Result<()> {
        let mut payload = self.payload.lock();
        let Some(runnable) = payload.as_mut() else {
            return Ok(());
        };
        match panic::catch_unwind(AssertUnwindSafe(|| runnable.run())) {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!("panicked: {}", panic_message(&*panic))),
        }
    }

    pub(crate) fn workers(&self) -> MutexGuard<'_, Vec<WorkerInfo>> {
        self.workers.lock()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("owner", &self.owner.name())
            .field("kind", &self.kind)
            .field("period", &self.period())
            .field("next_run", &self.next_run())
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// A caller's view of a scheduled task.
///
/// Valid as soon as it is returned, before the main thread has even seen the
/// task.
#[derive(Clone)]
pub struct TaskHandle {
    task: Arc<Task>,
    scheduler: Weak<Scheduler>,
}

impl TaskHandle {
    pub(crate) fn new(task: Arc<Task>, scheduler: Weak<Scheduler>) -> Self {
        Self { task, scheduler }
    }

    /// The task's unique id.
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// The plugin that registered the task.
    pub fn owner(&self) -> &PluginHandle {
        self.task.owner()
    }

    /// `true` if the task runs on the main thread.
    pub fn is_sync(&self) -> bool {
        self.task.is_sync()
    }

    /// `true` once the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// The tick at which the task next becomes due.
    pub fn next_run(&self) -> Tick {
        self.task.next_run()
    }

    /// The stored period: a positive tick count, or one of the [`period`] markers.
    pub fn period(&self) -> i64 {
        self.task.period()
    }

    /// Cancels the task through the scheduler that issued this handle.
    pub fn cancel(&self) {
        match self.scheduler.upgrade() {
            Some(scheduler) => scheduler.cancel_task(self.id()),
            None => {
                self.task.cancel();
            }
        }
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.task, &other.task)
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.task, f)
    }
}

impl From<&TaskHandle> for TaskId {
    fn from(handle: &TaskHandle) -> Self {
        handle.id()
    }
}
