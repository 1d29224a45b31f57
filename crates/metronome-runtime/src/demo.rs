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

//! A small plugin whose tasks show the scheduler at work when the runtime is
//! started without anything else to run.

use metronome_core::{NamedPlugin, PluginHandle, SchedulerResult};
use metronome_scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;

const PLUGIN_NAME: &str = "demo";

/// Registers the demo tasks and returns their owner.
///
/// Tasks only hold weak references to the scheduler so that dropping it
/// releases everything.
pub fn install(scheduler: &Arc<Scheduler>, tick_rate: u32) -> SchedulerResult<PluginHandle> {
    let plugin = PluginHandle::new(NamedPlugin::new(PLUGIN_NAME));
    let second = i64::from(tick_rate.max(1));

    let weak = Arc::downgrade(scheduler);
    scheduler.run_task_timer(
        &plugin,
        move || -> anyhow::Result<()> {
            if let Some(scheduler) = weak.upgrade() {
                log::info!(target: PLUGIN_NAME, "Main thread at tick {}.", scheduler.current_tick());
            }
            Ok(())
        },
        0,
        second,
    )?;

    // Background probe asking the main thread for the tick it is on.
    let weak = Arc::downgrade(scheduler);
    let owner = plugin.clone();
    let probe = scheduler.run_task_timer_async(
        &plugin,
        move || -> anyhow::Result<()> {
            let future = {
                let Some(scheduler) = weak.upgrade() else {
                    return Ok(());
                };
                let main_view = Arc::downgrade(&scheduler);
                scheduler.call_sync_method(&owner, move || {
                    Ok(main_view.upgrade().map_or(0, |scheduler| scheduler.current_tick()))
                })?
            };
            let tick = future.wait_timeout(Duration::from_secs(5))?;
            log::debug!(target: PLUGIN_NAME, "Worker observed main tick {tick}.");
            Ok(())
        },
        second,
        2 * second,
    )?;

    scheduler.run_task_later(
        &plugin,
        move || -> anyhow::Result<()> {
            probe.cancel();
            log::info!(target: PLUGIN_NAME, "Background probe {} retired.", probe.id());
            Ok(())
        },
        10 * second,
    )?;

    Ok(plugin)
}
