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

//! Plugin identity as seen by the scheduler.
//!
//! The scheduler never looks inside a plugin. It only needs to know whether
//! the plugin may still register work, and a name to attribute log records to.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The owner of scheduled work.
pub trait Plugin: Send + Sync {
    /// Returns the plugin's name. Also used as the log target for failures
    /// raised by the plugin's tasks.
    fn name(&self) -> &str;

    /// Returns `true` while the plugin is allowed to register tasks.
    fn is_enabled(&self) -> bool;
}

/// A shared, cheaply clonable reference to a [`Plugin`].
///
/// Two handles are equal when they point at the same plugin instance, which
/// is what bulk cancellation by owner keys on.
#[derive(Clone)]
pub struct PluginHandle(Arc<dyn Plugin>);

impl PluginHandle {
    /// Wraps a plugin into a handle.
    pub fn new<P: Plugin + 'static>(plugin: P) -> Self {
        Self(Arc::new(plugin))
    }

    /// See [`Plugin::name`].
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// See [`Plugin::is_enabled`].
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }
}

impl PartialEq for PluginHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl Eq for PluginHandle {}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl<P: Plugin + 'static> From<Arc<P>> for PluginHandle {
    fn from(plugin: Arc<P>) -> Self {
        Self(plugin)
    }
}

/// A minimal [`Plugin`] with a name and a toggleable enabled flag.
///
/// Useful for hosts that do not have a plugin system of their own, and for tests.
#[derive(Debug)]
pub struct NamedPlugin {
    name: String,
    enabled: AtomicBool,
}

impl NamedPlugin {
    /// Creates an enabled plugin with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
        }
    }

    /// Enables or disables the plugin.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl Plugin for NamedPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
