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

//! Identifiers and scheduling units shared by every scheduler half.

use std::fmt;
use std::num::NonZeroU64;

/// One discrete step of the externally driven clock.
pub type Tick = u64;

/// Reserved period values.
///
/// A stored period is either a positive number of ticks, [`NO_REPEATING`] or
/// [`CANCELLED`]. Anything below [`NO_REPEATING`] means the task must never
/// run again.
pub mod period {
    /// Caller-supplied value that is treated as "every tick".
    pub const ERROR: i64 = 0;
    /// The task runs once.
    pub const NO_REPEATING: i64 = -1;
    /// The task was cancelled.
    pub const CANCELLED: i64 = -2;
}

/// Normalizes a caller-supplied period into a storable one.
///
/// `ERROR` becomes `1`, anything below `NO_REPEATING` becomes `NO_REPEATING`.
pub fn normalize_period(requested: i64) -> i64 {
    if requested == period::ERROR {
        1
    } else if requested < period::NO_REPEATING {
        period::NO_REPEATING
    } else {
        requested
    }
}

/// Clamps a caller-supplied delay to a non-negative tick count.
pub fn normalize_delay(requested: i64) -> Tick {
    requested.max(0) as Tick
}

/// A unique, never reused identifier for a scheduled task.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct TaskId(NonZeroU64);

impl TaskId {
    /// Builds an id from its raw value. Returns `None` for zero, which is
    /// never handed out.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a task's payload executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// On the main thread, during the heartbeat, in tick order.
    Sync,
    /// On a worker pool thread, outside tick ordering.
    Async,
}

impl TaskKind {
    /// Returns `true` for [`TaskKind::Sync`].
    pub fn is_sync(self) -> bool {
        matches!(self, TaskKind::Sync)
    }
}
