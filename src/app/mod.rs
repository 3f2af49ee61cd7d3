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

//! The Supervisor's view of an installed app: names, opaque handles, and the
//! external capability sets it is consumed through. The per-app object, the
//! configuration store, and the security-labelling subsystem are all out of
//! scope per the framework's design -- they are modeled here as traits the
//! Supervisor calls through, never as concrete implementations.

mod container;

pub use container::{AppContainer, StopHandler};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SupervisorError};

pub const MAX_APP_NAME_BYTES: usize = 48;

pub type Pid = libc::pid_t;

/// A validated app name: non-empty, within the byte budget, and free of
/// path separators. Validation happens once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppName(String);

impl AppName {
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(SupervisorError::BadParameter("app name is empty".into()));
        }
        if name.len() > MAX_APP_NAME_BYTES {
            return Err(SupervisorError::Overflow);
        }
        if name.contains('/') {
            return Err(SupervisorError::BadParameter(format!(
                "app name '{}' contains '/'",
                name
            )));
        }
        Ok(AppName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle into the external per-app subsystem. Never a raw pointer:
/// the value is meaningless to anything but the `AppControl` implementation
/// that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppHandle(pub u64);

/// Opaque handle to a single process inside an app, minted by `AppControl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Stopped,
}

/// Per-process fault policy, reported by `AppControl::sigchild`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    Ignore,
    RestartProc,
    RestartApp,
    StopApp,
    Reboot,
}

/// Watchdog policy, reported by `AppControl::watchdog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    Ignore,
    Handled,
    RestartApp,
    StopApp,
    Reboot,
    NotFound,
    Error,
}

/// Process scheduling priority, as accepted by `appProc.SetPriority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Idle,
    Low,
    Medium,
    High,
    /// Real-time priority level, 1..=32.
    Rt(u8),
}

impl FromStr for Priority {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(Priority::Idle),
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ if s.starts_with("rt") => {
                let level: u8 = s[2..]
                    .parse()
                    .map_err(|_| SupervisorError::BadParameter(format!("invalid priority '{}'", s)))?;
                if (1..=32).contains(&level) {
                    Ok(Priority::Rt(level))
                } else {
                    Err(SupervisorError::Overflow)
                }
            }
            _ => Err(SupervisorError::BadParameter(format!("invalid priority '{}'", s))),
        }
    }
}

/// The per-app capability set the Supervisor consumes (spec §1: "The
/// Supervisor consumes it as a capability set"). Implemented externally;
/// this crate only ever calls through it.
pub trait AppControl {
    fn create(&mut self, name: &AppName) -> Result<AppHandle>;
    fn start(&mut self, app: AppHandle) -> Result<()>;
    fn stop(&mut self, app: AppHandle);
    fn state(&self, app: AppHandle) -> ProcessState;
    fn destroy(&mut self, app: AppHandle);

    /// Compute the fault action for a child of `app` that exited with
    /// `status`. The Supervisor has already reaped the child by the time
    /// this is called.
    fn sigchild(&mut self, app: AppHandle, pid: Pid, status: i32) -> FaultAction;

    /// True if `pid` belongs to a process the app is currently tracking.
    /// Used when a dying child's security label could not be read.
    fn owns_pid(&self, app: AppHandle, pid: Pid) -> bool;

    /// `Some(action)` if this app owns `proc_id`'s watchdog, `None` if it
    /// doesn't recognize the process at all.
    fn watchdog(&mut self, app: AppHandle, proc_id: u32) -> Option<WatchdogAction>;

    fn proc_state(&self, app: AppHandle, proc: &str) -> ProcessState;

    fn create_proc(&mut self, app: AppHandle, proc_name: &str, exec_path: &str) -> Result<ProcHandle>;
    fn delete_proc(&mut self, app: AppHandle, proc: ProcHandle);
    fn start_proc(&mut self, proc: ProcHandle) -> Result<()>;

    fn set_stdin(&mut self, proc: ProcHandle, fd: i32);
    fn set_stdout(&mut self, proc: ProcHandle, fd: i32);
    fn set_stderr(&mut self, proc: ProcHandle, fd: i32);
    fn add_arg(&mut self, proc: ProcHandle, arg: &str);
    fn clear_args(&mut self, proc: ProcHandle);
    fn set_priority(&mut self, proc: ProcHandle, priority: Priority);
    fn clear_priority(&mut self, proc: ProcHandle);
    fn set_fault_action(&mut self, proc: ProcHandle, action: FaultAction);
    fn clear_fault_action(&mut self, proc: ProcHandle);
    fn set_stop_handler(&mut self, proc: ProcHandle, handler: Option<Box<dyn FnMut() + Send>>);
}

/// Read-only view of the hierarchical configuration store (spec §6: "path
/// apps/<name> exists iff the app is installed").
pub trait ConfigStore {
    fn is_installed(&self, name: &AppName) -> bool;
    fn app_names(&self) -> Vec<AppName>;
    fn start_manual(&self, name: &AppName) -> bool;
}

/// The security-labelling subsystem: resolves a process's owning app from
/// its security label.
pub trait SecurityLabels {
    fn app_name_for_pid(&self, pid: Pid) -> Result<AppName>;
}
