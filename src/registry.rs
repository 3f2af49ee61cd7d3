// Copyright (c) 2018 Chef Software Inc. and/or applicable contributors
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

//! Two ordered collections of app containers, active and inactive, with
//! membership mutually exclusive (spec §3). Lookups are linear -- app
//! counts on a device are small, and that's the tradeoff the teacher makes
//! for its own service tables.

use crate::app::{AppContainer, AppName};

#[derive(Debug, Default)]
pub struct Registry {
    active: Vec<AppContainer>,
    inactive: Vec<AppContainer>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &AppName) -> Option<&AppContainer> {
        self.active
            .iter()
            .chain(self.inactive.iter())
            .find(|c| &c.name == name)
    }

    pub fn get_mut(&mut self, name: &AppName) -> Option<&mut AppContainer> {
        if let Some(pos) = self.active.iter().position(|c| &c.name == name) {
            return self.active.get_mut(pos);
        }
        if let Some(pos) = self.inactive.iter().position(|c| &c.name == name) {
            return self.inactive.get_mut(pos);
        }
        None
    }

    pub fn is_active(&self, name: &AppName) -> bool {
        self.get(name).map(|c| c.is_active).unwrap_or(false)
    }

    pub fn active_containers(&self) -> &[AppContainer] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn inactive_names(&self) -> Vec<AppName> {
        self.inactive.iter().map(|c| c.name.clone()).collect()
    }

    pub fn active_head_name(&self) -> Option<AppName> {
        self.active.first().map(|c| c.name.clone())
    }

    /// Insert a newly-built container. Panics if the name is already known
    /// to either list -- this would be a bug in the caller, never a runtime
    /// condition (names are unique across both lists per spec §3).
    pub fn insert_inactive(&mut self, container: AppContainer) {
        assert!(
            self.get(&container.name).is_none(),
            "duplicate app name '{}' inserted into registry",
            container.name
        );
        self.inactive.push(container);
    }

    /// Move a container from inactive to active. Returns `false` if it
    /// wasn't found in the inactive list.
    pub fn move_to_active(&mut self, name: &AppName) -> bool {
        if let Some(pos) = self.inactive.iter().position(|c| &c.name == name) {
            let mut container = self.inactive.remove(pos);
            container.is_active = true;
            self.active.push(container);
            true
        } else {
            false
        }
    }

    /// Move a container from active to inactive, clearing its stop handler
    /// as §3 requires ("on deactivation, stop_handler is cleared").
    pub fn move_to_inactive(&mut self, name: &AppName) -> bool {
        if let Some(pos) = self.active.iter().position(|c| &c.name == name) {
            let mut container = self.active.remove(pos);
            container.is_active = false;
            container.stop_handler = None;
            self.inactive.push(container);
            true
        } else {
            false
        }
    }

    /// Remove a container from whichever list holds it.
    pub fn remove_any(&mut self, name: &AppName) -> Option<AppContainer> {
        if let Some(pos) = self.active.iter().position(|c| &c.name == name) {
            return Some(self.active.remove(pos));
        }
        if let Some(pos) = self.inactive.iter().position(|c| &c.name == name) {
            return Some(self.inactive.remove(pos));
        }
        None
    }
}
