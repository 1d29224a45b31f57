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

//! Error types surfaced by the scheduler.

/// Raised synchronously by scheduling operations. Nothing is queued when one
/// of these is returned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The owning plugin is disabled and may not register work.
    #[error("plugin '{plugin}' attempted to register a task while disabled")]
    PluginDisabled {
        /// Name of the offending plugin.
        plugin: String,
    },
}

/// Convenience alias for scheduling results.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Why a main-thread call did not produce a value.
#[derive(thiserror::Error, Debug)]
pub enum CallError {
    /// The call was cancelled before it started running.
    #[error("the call was cancelled before it ran")]
    Cancelled,
    /// The computation returned an error.
    #[error("the call failed on the main thread: {0:#}")]
    Failed(anyhow::Error),
    /// The computation panicked.
    #[error("the call panicked on the main thread: {0}")]
    Panicked(String),
    /// A bounded wait elapsed before the call completed.
    #[error("timed out waiting for the main thread")]
    Timeout,
}

impl CallError {
    /// Returns `true` for [`CallError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Cancelled)
    }
}
