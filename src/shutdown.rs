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

//! Shutdown Sequencer (spec §4.4): bring every active app down one at a
//! time, in registry order, then fire the all-stopped callback exactly
//! once.

use log::info;

use crate::app::StopHandler;
use crate::supervisor::Supervisor;

static LOGKEY: &str = "SH";

impl Supervisor {
    /// Begin (or continue) an orderly shutdown. Idempotent: calling this
    /// again after everything has already stopped is a harmless no-op,
    /// since `all_stopped_cb` is consumed by `Option::take` the first time
    /// it fires.
    ///
    /// Step 1 (spec §4.4): every inactive container is destroyed outright,
    /// AppProc records first, before the active list is touched at all.
    pub fn shutdown(&mut self) {
        for name in self.registry.inactive_names() {
            self.purge_inactive_container(&name);
        }
        let Some(name) = self.registry.active_head_name() else {
            if let Some(mut cb) = self.all_stopped_cb.take() {
                info!(target: LOGKEY, "shutdown complete, all apps stopped");
                cb();
            }
            return;
        };
        self.stop_and_settle(&name, StopHandler::ShutdownNext);
    }
}
