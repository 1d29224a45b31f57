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

//! A thread-safe view of the tasks a scheduler currently knows to be active.

use crate::task::Task;
use dashmap::DashMap;
use metronome_core::TaskId;
use std::sync::Arc;

/// Active tasks keyed by id.
///
/// Sync tasks are removed only by the main thread, together with their removal
/// from the pending schedule. Async tasks remove themselves when their last
/// worker finishes and they will not run again.
#[derive(Debug, Default)]
pub(crate) struct RunnerRegistry {
    tasks: DashMap<TaskId, Arc<Task>>,
}

impl RunnerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, task: Arc<Task>) {
        self.tasks.insert(task.id(), task);
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<Arc<Task>> {
        self.tasks.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes `task` only if the registry still maps its id to this instance.
    pub(crate) fn remove_task(&self, task: &Arc<Task>) {
        self.tasks
            .remove_if(&task.id(), |_, registered| Arc::ptr_eq(registered, task));
    }

    /// Point-in-time copy of the registered tasks.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Task>> {
        self.tasks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Marks `task` cancelled. An async task nobody is executing is dropped
    /// from the registry right away; sync tasks wait for the main thread.
    pub(crate) fn cancel(&self, task: &Arc<Task>) -> bool {
        if task.is_sync() {
            return task.cancel();
        }
        let (cancelled, idle) = {
            let workers = task.workers();
            (task.cancel(), workers.is_empty())
        };
        if idle {
            self.remove_task(task);
        }
        cancelled
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
