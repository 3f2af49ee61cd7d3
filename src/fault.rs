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

//! Fault & Watchdog Dispatcher (spec §4.2): reacts to SIGCHLD and watchdog
//! timeouts by asking the owning app what to do, then carrying that action
//! out through the same stop/settle machinery the Lifecycle Engine uses.

use log::{debug, error, warn};

use crate::app::{AppName, FaultAction, Pid, WatchdogAction};
use crate::error::OpResult;
use crate::supervisor::Supervisor;

static LOGKEY: &str = "FD";

impl Supervisor {
    /// Invoked once per reaped child (spec §9 open question (c): the
    /// Supervisor must have already reaped `pid` via `waitpid` before
    /// calling this -- peeking and ownership resolution happen in the
    /// platform layer). `status` is the raw `waitpid` status word.
    ///
    /// Step 3 of the child-exit path: a resolved app name with no active
    /// container means the app was already deactivated elsewhere -- the
    /// zombie is reaped (by the caller, before this was invoked) and there
    /// is nothing further to dispatch.
    pub fn sig_child_handler(&mut self, pid: Pid, status: i32) {
        let Some(app_name) = self.owner_of_pid(pid) else {
            warn!(target: LOGKEY, "reaped pid {} but could not resolve its owning app", pid);
            return;
        };
        let Some(container) = self.registry.get(&app_name) else {
            return;
        };
        if !container.is_active {
            debug!(target: LOGKEY, "pid {} belonged to already-deactivated app '{}'", pid, app_name);
            return;
        }
        let app_handle = container.app_handle;
        let action = self.app_control.sigchild(app_handle, pid, status);
        self.dispatch_fault_action(&app_name, action);
        self.settle(&app_name);
    }

    /// Whether any installed app recognizes `pid` as its own. Used by the
    /// platform layer to decide whether to reap a peeked zombie or leave it
    /// for another subsystem sharing SIGCHLD.
    pub fn owns_pid(&self, pid: Pid) -> bool {
        self.owner_of_pid(pid).is_some()
    }

    /// Resolve which installed app owns `pid`. Tries the security-label
    /// subsystem first; if that errors (spec §9 open question (b): treated
    /// as `NotFound`, not propagated), falls back to asking every active
    /// app directly whether it recognizes the pid.
    fn owner_of_pid(&self, pid: Pid) -> Option<AppName> {
        if let Ok(name) = self.labels.app_name_for_pid(pid) {
            return Some(name);
        }
        self.registry
            .active_containers()
            .iter()
            .find(|c| self.app_control.owns_pid(c.app_handle, pid))
            .map(|c| c.name.clone())
    }

    /// Table in spec §4.2: both `RestartApp` and `StopApp` only call
    /// `app.stop` when the app isn't already stopped.
    fn dispatch_fault_action(&mut self, name: &AppName, action: FaultAction) {
        match action {
            FaultAction::Ignore => {}
            FaultAction::RestartProc => {
                // Process-level restart is the external AppControl's job;
                // the Supervisor only needed to route the notification.
            }
            FaultAction::RestartApp => {
                self.stop_if_running_and_install(name, crate::app::StopHandler::Restart);
            }
            FaultAction::StopApp => {
                self.stop_if_running_and_install(name, crate::app::StopHandler::Deactivate);
            }
            FaultAction::Reboot => {
                error!(target: LOGKEY, "'{}' requested a reboot fault action", name);
                // Propagation to the platform-level restart is out of scope
                // here; the caller observing a reboot-worthy condition reads
                // it from the log and the process exit path.
            }
        }
    }

    /// `wdog.WatchdogTimedOut(userId, procId)`. The IPC surface carries no
    /// app name (spec §6) -- the owning app is discovered by asking every
    /// active container in turn until one recognizes `proc_id` (spec §4.2:
    /// "iterate active containers; the first whose `app.watchdog(procId)`
    /// returns OK owns the event").
    pub fn watchdog_timed_out(&mut self, proc_id: u32) -> OpResult {
        let candidates: Vec<(AppName, crate::app::AppHandle)> = self
            .registry
            .active_containers()
            .iter()
            .map(|c| (c.name.clone(), c.app_handle))
            .collect();

        let hit = candidates
            .into_iter()
            .find_map(|(name, handle)| self.app_control.watchdog(handle, proc_id).map(|action| (name, action)));

        let Some((name, action)) = hit else {
            error!(target: LOGKEY, "watchdog proc {} not claimed by any active app", proc_id);
            return OpResult::NotFound;
        };

        match action {
            WatchdogAction::Ignore | WatchdogAction::Handled => OpResult::Ok,
            WatchdogAction::RestartApp => {
                self.stop_if_running_and_install(&name, crate::app::StopHandler::Restart);
                OpResult::Ok
            }
            WatchdogAction::StopApp => {
                self.stop_if_running(&name);
                OpResult::Ok
            }
            WatchdogAction::Reboot => {
                // Spec open question (a): a real reboot isn't within this
                // crate's authority, so this degrades to a restart with a
                // critical-level log rather than silently doing nothing.
                error!(target: LOGKEY, "'{}' watchdog requested reboot, degrading to restart", name);
                self.stop_if_running_and_install(&name, crate::app::StopHandler::Restart);
                OpResult::Ok
            }
            other @ (WatchdogAction::NotFound | WatchdogAction::Error) => {
                crate::error::invariant_violation!(
                    "app '{}' claimed ownership of watchdog proc {} then reported {:?}",
                    name,
                    proc_id,
                    other
                )
            }
        }
    }
}
