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

//! The worker pool contract used by the asynchronous scheduler half.

use crate::plugin::PluginHandle;
use crate::task::TaskId;
use std::thread::{self, ThreadId};

/// A unit of work handed to a [`WorkerPool`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executes jobs on threads other than the main thread.
///
/// The scheduler does not own the pool's threads; it only submits jobs.
/// `execute` must not block the caller for longer than it takes to enqueue.
pub trait WorkerPool: Send + Sync {
    /// Submits a job for execution on one of the pool's threads.
    fn execute(&self, job: Job);
}

/// Describes a worker thread currently executing an asynchronous task.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// The task being executed.
    pub task_id: TaskId,
    /// The plugin that owns the task.
    pub owner: PluginHandle,
    /// The executing thread.
    pub thread_id: ThreadId,
    /// The executing thread's name, if it has one.
    pub thread_name: Option<String>,
}

impl WorkerInfo {
    /// Describes the calling thread as a worker for `task_id`.
    pub fn current(task_id: TaskId, owner: PluginHandle) -> Self {
        let thread = thread::current();
        Self {
            task_id,
            owner,
            thread_id: thread.id(),
            thread_name: thread.name().map(str::to_owned),
        }
    }
}

impl PartialEq for WorkerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.task_id == other.task_id && self.thread_id == other.thread_id
    }
}
