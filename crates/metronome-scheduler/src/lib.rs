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

//! # Metronome Scheduler
//!
//! A tick-synchronized task scheduler. Work submitted from any thread runs
//! either on the main thread during [`Scheduler::main_thread_heartbeat`] or on
//! a [`WorkerPool`](metronome_core::WorkerPool), once, after a delay, or
//! periodically.

#![warn(missing_docs)]

pub mod config;
mod control;
pub mod future;
mod id;
mod pending;
pub mod pool;
mod queue;
mod registry;
pub mod scheduler;
pub mod task;

pub use config::SchedulerConfig;
pub use future::SyncFuture;
pub use pool::ThreadWorkerPool;
pub use scheduler::Scheduler;
pub use task::{Runnable, TaskHandle};
