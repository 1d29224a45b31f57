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

//! Synchronous call-through: compute a value on the main thread from any
//! other thread.

use crate::task::{panic_message, Runnable, Task};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use metronome_core::{CallError, TaskId};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// Receiving side of a wrapped call, before it is tied to its task.
pub(crate) struct Completion<T> {
    state: Arc<AtomicU8>,
    result: Receiver<Result<T, CallError>>,
}

/// Wraps `call` into a payload that runs it at most once and reports the
/// outcome through the returned [`Completion`].
pub(crate) fn wrap<T, F>(call: F) -> (Box<dyn Runnable>, Completion<T>)
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    let state = Arc::new(AtomicU8::new(PENDING));
    let payload = CallPayload {
        call: Some(call),
        result: Some(tx),
        state: Arc::clone(&state),
    };
    (Box::new(payload), Completion { state, result: rx })
}

struct CallPayload<T, F> {
    call: Option<F>,
    result: Option<Sender<Result<T, CallError>>>,
    state: Arc<AtomicU8>,
}

impl<T, F> Runnable for CallPayload<T, F>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    fn run(&mut self) -> anyhow::Result<()> {
        let Some(call) = self.call.take() else {
            return Ok(());
        };
        if self
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        let outcome = match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CallError::Failed(err)),
            Err(panic) => Err(CallError::Panicked(panic_message(&*panic))),
        };
        if let Some(tx) = self.result.take() {
            // The caller may have dropped its future; nothing to report then.
            let _ = tx.send(outcome);
        }
        self.state.store(DONE, Ordering::Release);
        Ok(())
    }
}

/// A value being computed on the main thread.
///
/// Resolves exactly once, during the heartbeat that runs the call. If the call
/// is cancelled first, waiting returns [`CallError::Cancelled`] as soon as the
/// scheduler discards it.
pub struct SyncFuture<T> {
    task: Arc<Task>,
    state: Arc<AtomicU8>,
    result: Receiver<Result<T, CallError>>,
}

impl<T> SyncFuture<T> {
    pub(crate) fn new(task: Arc<Task>, completion: Completion<T>) -> Self {
        Self {
            task,
            state: completion.state,
            result: completion.result,
        }
    }

    /// The id of the task carrying the call.
    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// Blocks until the main thread has run the call. There is no timeout;
    /// see [`wait_timeout`](Self::wait_timeout) for a bounded wait.
    pub fn wait(self) -> Result<T, CallError> {
        if self.is_cancelled() {
            return Err(CallError::Cancelled);
        }
        self.result.recv().unwrap_or(Err(CallError::Cancelled))
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// The outcome is delivered once: after a successful wait, later calls
    /// report [`CallError::Cancelled`].
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, CallError> {
        if self.is_cancelled() {
            return Err(CallError::Cancelled);
        }
        match self.result.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(CallError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(CallError::Cancelled),
        }
    }

    /// Returns the outcome if it is available, without blocking.
    pub fn try_get(&self) -> Option<Result<T, CallError>> {
        if self.is_cancelled() {
            return Some(Err(CallError::Cancelled));
        }
        match self.result.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(CallError::Cancelled)),
        }
    }

    /// `true` once the call has finished or was cancelled.
    pub fn is_done(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), DONE | CANCELLED) || self.task.is_cancelled()
    }

    /// `true` if the call was cancelled before it ran.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Cancels the call if it has not started yet. Returns `false` if it is
    /// already running, finished, or cancelled.
    pub fn cancel(&self) -> bool {
        if self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.task.cancel();
        self.task.discard();
        true
    }
}

impl<T> fmt::Debug for SyncFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFuture")
            .field("task", &self.task.id())
            .field("done", &self.is_done())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
