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

use super::{AppHandle, AppName};
use crate::ipc::CmdRef;

/// The continuation fired when an app reaches the Stopped state (spec §4.1:
/// "the key to asynchronous correctness"). Each variant both takes an
/// action and clears or reassigns `stop_handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopHandler {
    Deactivate,
    Restart,
    RespondToStopCmd,
    ShutdownNext,
}

/// Per-installed-app record. Exactly one of `Registry`'s two lists owns a
/// given container at a time; `is_active` always agrees with which one.
#[derive(Debug)]
pub struct AppContainer {
    pub name: AppName,
    pub app_handle: AppHandle,
    pub stop_handler: Option<StopHandler>,
    pub pending_stop_cmd: Option<CmdRef>,
    pub is_active: bool,
}

impl AppContainer {
    pub fn new(name: AppName, app_handle: AppHandle) -> Self {
        AppContainer {
            name,
            app_handle,
            stop_handler: None,
            pending_stop_cmd: None,
            is_active: false,
        }
    }
}
