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

//! # Metronome Core
//!
//! Foundational crate containing the traits, identifiers, and error types
//! shared between the scheduler and the processes that host it.

#![warn(missing_docs)]

pub mod error;
pub mod plugin;
pub mod task;
pub mod worker;

pub use error::{CallError, SchedulerError, SchedulerResult};
pub use plugin::{NamedPlugin, Plugin, PluginHandle};
pub use task::{normalize_delay, normalize_period, period, TaskId, TaskKind, Tick};
pub use worker::{Job, WorkerInfo, WorkerPool};
