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

//! Process-wide task id allocation.

use metronome_core::TaskId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out unique task ids. Order does not matter, only uniqueness.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub(crate) const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub(crate) fn allocate(&self) -> TaskId {
        loop {
            // Zero is skipped if the counter ever wraps.
            if let Some(id) = TaskId::new(self.next.fetch_add(1, Ordering::Relaxed)) {
                return id;
            }
        }
    }
}

/// Shared by every scheduler in the process, so ids stay unique across the
/// sync and async halves.
pub(crate) static TASK_IDS: IdAllocator = IdAllocator::new();
