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

//! `app-svisord`: the process entry point. Parses startup flags, builds a
//! `Supervisor`, wires platform signal plumbing, and drives the cooperative
//! event loop until an orderly shutdown completes.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info};

use app_supervisor::app::{AppControl, AppHandle, FaultAction, Pid, Priority, ProcHandle, ProcessState, SecurityLabels, WatchdogAction};
use app_supervisor::config::{FileConfigStore, SupervisorConfig};
use app_supervisor::error::{Result, SupervisorError};
use app_supervisor::sys::{SignalSource, SupervisorEvent};
use app_supervisor::{AppName, Supervisor};

static LOGKEY: &str = "MN";

#[derive(Parser, Debug)]
#[command(name = "app-svisord", about = "Application Supervisor core event loop")]
struct Cli {
    /// Path to supervisor.toml.
    #[arg(long, default_value = "/etc/legato/supervisor.toml")]
    config: PathBuf,

    /// Root of the installed-apps configuration tree; overrides the value
    /// loaded from `--config`.
    #[arg(long)]
    apps_root: Option<PathBuf>,
}

/// Placeholder for the per-app process subsystem this crate does not own
/// (spec §1: out of scope). A real deployment supplies an `AppControl`
/// backed by Legato's `app` component; this one exists so the binary links
/// and the event loop can be exercised end-to-end, and logs loudly when
/// asked to do anything beyond track `ProcessState`.
struct UnimplementedAppControl {
    states: std::collections::HashMap<u64, ProcessState>,
    next_handle: u64,
}

impl UnimplementedAppControl {
    fn new() -> Self {
        UnimplementedAppControl {
            states: std::collections::HashMap::new(),
            next_handle: 0,
        }
    }
}

impl AppControl for UnimplementedAppControl {
    fn create(&mut self, name: &AppName) -> Result<AppHandle> {
        self.next_handle += 1;
        self.states.insert(self.next_handle, ProcessState::Stopped);
        debug!(target: LOGKEY, "create '{}' -> handle {}", name, self.next_handle);
        Ok(AppHandle(self.next_handle))
    }

    fn start(&mut self, app: AppHandle) -> Result<()> {
        self.states.insert(app.0, ProcessState::Running);
        Ok(())
    }

    fn stop(&mut self, app: AppHandle) {
        self.states.insert(app.0, ProcessState::Stopped);
    }

    fn state(&self, app: AppHandle) -> ProcessState {
        *self.states.get(&app.0).unwrap_or(&ProcessState::Stopped)
    }

    fn destroy(&mut self, app: AppHandle) {
        self.states.remove(&app.0);
    }

    fn sigchild(&mut self, _app: AppHandle, _pid: Pid, _status: i32) -> FaultAction {
        FaultAction::Ignore
    }

    fn owns_pid(&self, _app: AppHandle, _pid: Pid) -> bool {
        false
    }

    fn watchdog(&mut self, _app: AppHandle, _proc_id: u32) -> Option<WatchdogAction> {
        None
    }

    fn proc_state(&self, _app: AppHandle, _proc: &str) -> ProcessState {
        ProcessState::Stopped
    }

    fn create_proc(&mut self, _app: AppHandle, _proc_name: &str, _exec_path: &str) -> Result<ProcHandle> {
        Err(SupervisorError::Resource("per-process overrides require the app subsystem integration".into()))
    }

    fn delete_proc(&mut self, _app: AppHandle, _proc: ProcHandle) {}

    fn start_proc(&mut self, _proc: ProcHandle) -> Result<()> {
        Err(SupervisorError::Resource("per-process overrides require the app subsystem integration".into()))
    }

    fn set_stdin(&mut self, _proc: ProcHandle, _fd: i32) {}
    fn set_stdout(&mut self, _proc: ProcHandle, _fd: i32) {}
    fn set_stderr(&mut self, _proc: ProcHandle, _fd: i32) {}
    fn add_arg(&mut self, _proc: ProcHandle, _arg: &str) {}
    fn clear_args(&mut self, _proc: ProcHandle) {}
    fn set_priority(&mut self, _proc: ProcHandle, _priority: Priority) {}
    fn clear_priority(&mut self, _proc: ProcHandle) {}
    fn set_fault_action(&mut self, _proc: ProcHandle, _action: FaultAction) {}
    fn clear_fault_action(&mut self, _proc: ProcHandle) {}
    fn set_stop_handler(&mut self, _proc: ProcHandle, _handler: Option<Box<dyn FnMut() + Send>>) {}
}

/// Placeholder `SecurityLabels`: the real subsystem resolves an owning app
/// from a process's SMACK/AppArmor-style label, which lives outside this
/// crate. Always reports `NotFound` so callers fall back to `owns_pid`.
struct UnimplementedSecurityLabels;

impl SecurityLabels for UnimplementedSecurityLabels {
    fn app_name_for_pid(&self, _pid: Pid) -> Result<AppName> {
        Err(SupervisorError::NotFound(AppName::new("unknown").unwrap()))
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = SupervisorConfig::load(&cli.config).unwrap_or_else(|err| {
        info!(target: LOGKEY, "using default configuration ({})", err);
        SupervisorConfig::default()
    });
    let apps_root = cli.apps_root.unwrap_or(config.apps_root.clone());

    let mut signals = match SignalSource::new() {
        Ok(s) => s,
        Err(err) => {
            error!(target: LOGKEY, "failed to install signal handlers: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut supervisor = Supervisor::new(
        Box::new(UnimplementedAppControl::new()),
        Box::new(FileConfigStore::new(apps_root)),
        Box::new(UnimplementedSecurityLabels),
        config.apps_root,
        Box::new(|cmd, result| {
            debug!(target: LOGKEY, "stop command {:?} completed: {:?}", cmd, result);
        }),
        Box::new(|session, reason| {
            info!(target: LOGKEY, "terminating session {:?}: {}", session, reason);
        }),
    );

    supervisor.set_all_stopped_callback(Box::new(|| {
        info!(target: LOGKEY, "all apps stopped");
    }));

    supervisor.auto_start();
    info!(target: LOGKEY, "app-svisord ready");

    let mut shutting_down = false;
    loop {
        match tick(&mut supervisor, &mut signals, &mut shutting_down) {
            TickState::Continue => std::thread::sleep(Duration::from_millis(100)),
            TickState::Exit => break,
        }
    }

    ExitCode::SUCCESS
}

enum TickState {
    Continue,
    Exit,
}

fn tick(supervisor: &mut Supervisor, signals: &mut SignalSource, shutting_down: &mut bool) -> TickState {
    match signals.poll() {
        Some(SupervisorEvent::Shutdown) => {
            if !*shutting_down {
                *shutting_down = true;
                info!(target: LOGKEY, "shutdown requested");
                supervisor.shutdown();
            }
        }
        Some(SupervisorEvent::ChildPending) => {
            while let Some((pid, status)) = app_supervisor::sys::reap_one_child(|pid| supervisor.owns_pid(pid)) {
                supervisor.sig_child_handler(pid, status);
            }
        }
        None => {}
    }

    if *shutting_down && supervisor.active_app_count() == 0 {
        TickState::Exit
    } else {
        TickState::Continue
    }
}
