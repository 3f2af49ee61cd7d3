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

//! Top-level supervisor configuration and the filesystem-backed
//! `ConfigStore` (spec §6: "path `apps/<name>` exists iff the app is
//! installed"; "`apps/<name>/startManual` is a boolean leaf").

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;

use crate::app::{AppName, ConfigStore};
use crate::error::{Result, SupervisorError};

static LOGKEY: &str = "CF";

/// `supervisor.toml`, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Root of the installed-apps configuration tree.
    pub apps_root: PathBuf,
    /// Seconds to wait for a stop handler to fire before the Supervisor
    /// logs a stall warning. Purely diagnostic; no forced kill happens here
    /// since that's `AppControl`'s responsibility.
    pub stop_warn_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            apps_root: PathBuf::from("/legato/apps"),
            stop_warn_secs: 30,
        }
    }
}

impl SupervisorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| SupervisorError::Resource(format!("reading {}: {}", path.display(), err)))?;
        toml::from_str(&text)
            .map_err(|err| SupervisorError::Resource(format!("parsing {}: {}", path.display(), err)))
    }
}

/// `ConfigStore` backed by a directory tree: `<apps_root>/<name>/` existing
/// means `name` is installed, and `<apps_root>/<name>/startManual` holding
/// the byte `1` means it is not auto-started.
pub struct FileConfigStore {
    apps_root: PathBuf,
}

impl FileConfigStore {
    pub fn new(apps_root: impl Into<PathBuf>) -> Self {
        FileConfigStore {
            apps_root: apps_root.into(),
        }
    }

    fn app_dir(&self, name: &AppName) -> PathBuf {
        self.apps_root.join(name.as_str())
    }
}

impl ConfigStore for FileConfigStore {
    fn is_installed(&self, name: &AppName) -> bool {
        self.app_dir(name).is_dir()
    }

    fn app_names(&self) -> Vec<AppName> {
        let entries = match fs::read_dir(&self.apps_root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(target: LOGKEY, "could not list {}: {}", self.apps_root.display(), err);
                return Vec::new();
            }
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| AppName::new(name).ok())
            .collect()
    }

    fn start_manual(&self, name: &AppName) -> bool {
        let leaf = self.app_dir(name).join("startManual");
        match fs::read_to_string(leaf) {
            Ok(contents) => contents.trim() == "1",
            Err(_) => false,
        }
    }
}
