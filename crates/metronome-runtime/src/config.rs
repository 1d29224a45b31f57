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

//! Runtime configuration.

use anyhow::Context;
use metronome_scheduler::SchedulerConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for the runtime host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Heartbeats per second.
    pub tick_rate: u32,
    /// Stop after this many ticks. Runs until killed when absent.
    pub max_ticks: Option<u64>,
    /// Default `env_logger` filter, used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Scheduler and worker pool settings.
    pub scheduler: SchedulerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            max_ticks: None,
            log_filter: "info".to_string(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Reads a JSON configuration file, or returns the defaults without one.
    /// Missing fields keep their default values.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Wall-clock length of one tick. A zero rate is treated as one.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_rate.max(1) as f32)
    }
}
