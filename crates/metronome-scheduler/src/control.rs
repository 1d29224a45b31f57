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

//! Control operations: mutations of main-thread-only state that travel
//! through the submission queue like ordinary work.

use crate::registry::RunnerRegistry;
use crate::task::Task;
use metronome_core::{PluginHandle, TaskId};
use std::sync::Arc;

/// A control entry. Applied inline while the queue is drained.
#[derive(Debug)]
pub(crate) enum ControlOp {
    /// Remove the task with this id from staging or the pending schedule.
    CancelTask(TaskId),
    /// Remove every task owned by this plugin.
    CancelOwner(PluginHandle),
    /// Remove everything.
    CancelAll,
}

/// The state only the main thread may touch.
pub(crate) struct MainState {
    pub(crate) pending: crate::pending::PendingSchedule,
    /// Periodic tasks that ran this tick and wait to be re-inserted.
    pub(crate) staged: Vec<Arc<Task>>,
}

impl ControlOp {
    pub(crate) fn apply(&self, state: &mut MainState, registry: &RunnerRegistry) {
        match self {
            ControlOp::CancelTask(id) => {
                let found = match state.staged.iter().position(|task| task.id() == *id) {
                    Some(index) => Some(state.staged.remove(index)),
                    None => state.pending.remove_first(|task| task.id() == *id),
                };
                if let Some(task) = found {
                    retire(&task, registry);
                }
            }
            ControlOp::CancelOwner(owner) => {
                let mut removed = state.pending.remove_all(|task| task.owner() == owner);
                state.staged.retain(|task| {
                    if task.owner() == owner {
                        removed.push(Arc::clone(task));
                        false
                    } else {
                        true
                    }
                });
                log::debug!(
                    "Cancelled {} scheduled task(s) owned by {}",
                    removed.len(),
                    owner.name()
                );
                for task in &removed {
                    retire(task, registry);
                }
            }
            ControlOp::CancelAll => {
                for task in registry.snapshot() {
                    registry.cancel(&task);
                    if task.is_sync() {
                        registry.remove_task(&task);
                    }
                }
                let mut removed = state.pending.clear();
                removed.append(&mut state.staged);
                log::debug!("Cancelled all {} scheduled task(s)", removed.len());
                for task in removed {
                    task.cancel();
                    task.discard();
                }
            }
        }
    }
}

fn retire(task: &Arc<Task>, registry: &RunnerRegistry) {
    registry.cancel(task);
    if task.is_sync() {
        registry.remove_task(task);
    }
    task.discard();
}
