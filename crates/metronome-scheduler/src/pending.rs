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

//! Main-thread-only ordering of tasks by due tick.

use crate::task::Task;
use metronome_core::{TaskId, Tick};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Heap entry. The key is captured on insertion; a task's `next_run` only
/// changes while it is outside the heap.
struct Scheduled {
    next_run: Tick,
    id: TaskId,
    task: Arc<Task>,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the max-heap yields the earliest tick, then the lowest id.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .next_run
            .cmp(&self.next_run)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Tasks waiting for their due tick, earliest first, FIFO by id within a tick.
pub(crate) struct PendingSchedule {
    heap: BinaryHeap<Scheduled>,
}

impl PendingSchedule {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, task: Arc<Task>) {
        self.heap.push(Scheduled {
            next_run: task.next_run(),
            id: task.id(),
            task,
        });
    }

    /// Pops the earliest task if it is due at `now`.
    pub(crate) fn pop_due(&mut self, now: Tick) -> Option<Arc<Task>> {
        if self.heap.peek()?.next_run > now {
            return None;
        }
        self.heap.pop().map(|scheduled| scheduled.task)
    }

    pub(crate) fn extend(&mut self, tasks: impl IntoIterator<Item = Arc<Task>>) {
        for task in tasks {
            self.push(task);
        }
    }

    /// Removes and returns the first task matching `predicate`.
    pub(crate) fn remove_first(
        &mut self,
        mut predicate: impl FnMut(&Task) -> bool,
    ) -> Option<Arc<Task>> {
        let mut found = None;
        self.heap.retain(|scheduled| {
            if found.is_none() && predicate(&scheduled.task) {
                found = Some(Arc::clone(&scheduled.task));
                false
            } else {
                true
            }
        });
        found
    }

    /// Removes and returns every task matching `predicate`.
    pub(crate) fn remove_all(&mut self, mut predicate: impl FnMut(&Task) -> bool) -> Vec<Arc<Task>> {
        let mut removed = Vec::new();
        self.heap.retain(|scheduled| {
            if predicate(&scheduled.task) {
                removed.push(Arc::clone(&scheduled.task));
                false
            } else {
                true
            }
        });
        removed
    }

    pub(crate) fn clear(&mut self) -> Vec<Arc<Task>> {
        self.heap.drain().map(|scheduled| scheduled.task).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metronome_core::{period, NamedPlugin, PluginHandle, TaskKind};

    fn task_at(raw_id: u64, next_run: Tick) -> Arc<Task> {
        let task = Task::new(
            TaskId::new(raw_id).unwrap(),
            PluginHandle::new(NamedPlugin::new("pending-test")),
            TaskKind::Sync,
            period::NO_REPEATING,
            Box::new(|| anyhow::Ok(())),
        );
        task.set_next_run(next_run);
        Arc::new(task)
    }

    #[test]
    fn test_orders_by_tick_then_id() {
        let mut pending = PendingSchedule::with_capacity(4);
        pending.push(task_at(4, 2));
        pending.push(task_at(3, 1));
        pending.push(task_at(2, 2));
        pending.push(task_at(1, 5));

        let mut order = Vec::new();
        while let Some(task) = pending.pop_due(10) {
            order.push(task.id().get());
        }
        assert_eq!(order, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_pop_due_respects_now() {
        let mut pending = PendingSchedule::with_capacity(2);
        pending.push(task_at(1, 3));
        assert!(pending.pop_due(2).is_none());
        assert_eq!(pending.len(), 1);
        assert!(pending.pop_due(3).is_some());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_remove_first_and_all() {
        let mut pending = PendingSchedule::with_capacity(4);
        for id in 1..=4 {
            pending.push(task_at(id, id));
        }
        let removed = pending.remove_first(|task| task.id().get() == 3);
        assert_eq!(removed.map(|task| task.id().get()), Some(3));
        assert!(pending.remove_first(|task| task.id().get() == 3).is_none());

        let evens = pending.remove_all(|task| task.id().get() % 2 == 0);
        assert_eq!(evens.len(), 2);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.clear().len(), 1);
        assert!(pending.is_empty());
    }
}
