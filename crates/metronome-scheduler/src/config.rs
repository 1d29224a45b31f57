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

//! Scheduler configuration.

use serde::Deserialize;

/// Configuration for a [`Scheduler`](crate::Scheduler) and its default
/// worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of threads in the default worker pool. Zero is treated as one.
    pub worker_threads: usize,
    /// Name prefix for worker threads; the thread index is appended.
    pub worker_thread_name: String,
    /// Initial capacity of the pending schedule.
    pub pending_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            worker_thread_name: "Scheduler Thread".to_string(),
            pending_capacity: 10,
        }
    }
}
