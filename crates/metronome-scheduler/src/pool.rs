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

//! A fixed-size thread pool implementing [`WorkerPool`].

use crate::config::SchedulerConfig;
use crate::task::panic_message;
use crossbeam_channel::{Receiver, Sender};
use metronome_core::{Job, WorkerPool};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

/// Runs jobs on a fixed set of named threads fed by an unbounded channel.
///
/// Dropping the pool stops accepting jobs, lets the workers finish what is
/// already queued, and joins them.
pub struct ThreadWorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl ThreadWorkerPool {
    /// Spawns the pool's threads.
    pub fn new(config: &SchedulerConfig) -> io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let count = config.worker_threads.max(1);
        let mut handles = Vec::with_capacity(count);
        for index in 1..=count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{} - {index}", config.worker_thread_name))
                .spawn(move || worker_loop(receiver))?;
            handles.push(handle);
        }
        log::info!("Worker pool started with {count} thread(s).");
        Ok(Self {
            sender: Some(sender),
            handles,
        })
    }

    /// Number of worker threads.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// `true` once the pool has been shut down.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops accepting jobs and joins every worker once the queue is empty.
    ///
    /// Called from one of the pool's own workers, that worker is detached
    /// instead of joined; it exits after its current job.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        let current = thread::current().id();
        for handle in self.handles.drain(..) {
            if handle.thread().id() == current {
                log::debug!("Worker pool shut down from its own worker; detaching it.");
                continue;
            }
            if handle.join().is_err() {
                log::error!("A worker thread terminated abnormally.");
            }
        }
        log::info!("Worker pool stopped.");
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
            log::error!("Worker job panicked: {}", panic_message(&*panic));
        }
    }
}

impl WorkerPool for ThreadWorkerPool {
    fn execute(&self, job: Job) {
        match &self.sender {
            Some(sender) => {
                if sender.send(job).is_err() {
                    log::error!("Worker pool has no live threads; dropping job.");
                }
            }
            None => log::warn!("Worker pool is shut down; dropping job."),
        }
    }
}

impl Drop for ThreadWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
