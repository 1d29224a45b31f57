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

//! # Metronome Runtime
//!
//! Loads the configuration, initializes logging, and drives the scheduler
//! heartbeat at a fixed tick rate. The first argument, if any, is the path to
//! a JSON configuration file.

mod config;
mod demo;

use anyhow::Context;
use config::RuntimeConfig;
use metronome_core::Tick;
use metronome_scheduler::Scheduler;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

/// How long shutdown waits for async tasks that are still running.
const WORKER_GRACE: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    use env_logger::{Builder, Env};

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = RuntimeConfig::load(path.as_deref())?;
    Builder::from_env(Env::default().default_filter_or(config.log_filter.as_str())).init();

    let scheduler = Scheduler::new(&config.scheduler).context("failed to start the worker pool")?;
    let plugin = demo::install(&scheduler, config.tick_rate)?;
    log::info!("Runtime started at {} ticks per second.", config.tick_rate);

    let last = run(&scheduler, &config);

    scheduler.cancel_tasks(&plugin);
    scheduler.main_thread_heartbeat(last);
    wait_for_workers(&scheduler);
    log::info!("Runtime stopped after {last} ticks.");
    Ok(())
}

/// Heartbeats until `max_ticks` is reached and returns the next unused tick.
fn run(scheduler: &Scheduler, config: &RuntimeConfig) -> Tick {
    let tick_duration = config.tick_duration();
    let mut tick: Tick = 0;
    loop {
        if config.max_ticks.is_some_and(|max| tick >= max) {
            return tick;
        }
        let start_time = Instant::now();
        scheduler.main_thread_heartbeat(tick);
        tick += 1;

        let elapsed = start_time.elapsed();
        if elapsed < tick_duration {
            thread::sleep(tick_duration - elapsed);
        } else {
            log::debug!("Tick {} overran its budget by {:?}.", tick - 1, elapsed - tick_duration);
        }
    }
}

fn wait_for_workers(scheduler: &Scheduler) {
    let deadline = Instant::now() + WORKER_GRACE;
    while !scheduler.active_workers().is_empty() {
        if Instant::now() >= deadline {
            log::warn!(
                "{} worker(s) still busy after {:?}; shutting down anyway.",
                scheduler.active_workers().len(),
                WORKER_GRACE
            );
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
