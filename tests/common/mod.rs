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

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use app_supervisor::app::{
    AppControl, AppHandle, AppName, ConfigStore, FaultAction, Pid, Priority, ProcHandle, ProcessState,
    SecurityLabels, WatchdogAction,
};
use app_supervisor::error::{Result, SupervisorError};

#[derive(Default)]
pub struct Inner {
    pub states: HashMap<u64, ProcessState>,
    pub next_handle: u64,
    pub next_proc: u64,
    /// Fault action to report the next time `sigchild` is asked about an app.
    pub fault_actions: HashMap<u64, FaultAction>,
    pub watchdog_actions: HashMap<u64, WatchdogAction>,
    pub created_procs: Vec<(u64, String, String)>,
    /// Pid each handle recognizes as its own, for `owns_pid`'s fallback path
    /// (exercised when the security-label lookup fails, as `FakeSecurityLabels` always does).
    pub owned_pids: HashMap<u64, Pid>,
}

/// A fake `AppControl` good enough to drive every Lifecycle/Fault/AppProc
/// path without a real per-app subsystem behind it: state is just a map
/// keyed by handle, and `stop`/`start` flip it synchronously.
#[derive(Clone)]
pub struct FakeAppControl(pub Rc<RefCell<Inner>>);

impl FakeAppControl {
    pub fn new() -> Self {
        FakeAppControl(Rc::new(RefCell::new(Inner::default())))
    }

    pub fn set_fault_action(&self, app: AppHandle, action: FaultAction) {
        self.0.borrow_mut().fault_actions.insert(app.0, action);
    }

    pub fn set_watchdog_action(&self, app: AppHandle, action: WatchdogAction) {
        self.0.borrow_mut().watchdog_actions.insert(app.0, action);
    }

    pub fn set_owned_pid(&self, app: AppHandle, pid: Pid) {
        self.0.borrow_mut().owned_pids.insert(app.0, pid);
    }

    /// Whether `app` still has a live entry, i.e. `destroy` hasn't been
    /// called for it yet.
    pub fn has_handle(&self, app: AppHandle) -> bool {
        self.0.borrow().states.contains_key(&app.0)
    }
}

impl AppControl for FakeAppControl {
    fn create(&mut self, _name: &AppName) -> Result<AppHandle> {
        let mut inner = self.0.borrow_mut();
        inner.next_handle += 1;
        inner.states.insert(inner.next_handle, ProcessState::Stopped);
        Ok(AppHandle(inner.next_handle))
    }

    fn start(&mut self, app: AppHandle) -> Result<()> {
        self.0.borrow_mut().states.insert(app.0, ProcessState::Running);
        Ok(())
    }

    fn stop(&mut self, app: AppHandle) {
        self.0.borrow_mut().states.insert(app.0, ProcessState::Stopped);
    }

    fn state(&self, app: AppHandle) -> ProcessState {
        *self.0.borrow().states.get(&app.0).unwrap_or(&ProcessState::Stopped)
    }

    fn destroy(&mut self, app: AppHandle) {
        self.0.borrow_mut().states.remove(&app.0);
    }

    fn sigchild(&mut self, app: AppHandle, _pid: Pid, _status: i32) -> FaultAction {
        self.0.borrow().fault_actions.get(&app.0).copied().unwrap_or(FaultAction::Ignore)
    }

    fn owns_pid(&self, app: AppHandle, pid: Pid) -> bool {
        self.0.borrow().owned_pids.get(&app.0) == Some(&pid)
    }

    fn watchdog(&mut self, app: AppHandle, _proc_id: u32) -> Option<WatchdogAction> {
        self.0.borrow().watchdog_actions.get(&app.0).copied()
    }

    fn proc_state(&self, _app: AppHandle, _proc: &str) -> ProcessState {
        ProcessState::Stopped
    }

    fn create_proc(&mut self, app: AppHandle, proc_name: &str, exec_path: &str) -> Result<ProcHandle> {
        let mut inner = self.0.borrow_mut();
        inner.next_proc += 1;
        inner
            .created_procs
            .push((app.0, proc_name.to_string(), exec_path.to_string()));
        Ok(ProcHandle(inner.next_proc))
    }

    fn delete_proc(&mut self, _app: AppHandle, _proc: ProcHandle) {}

    fn start_proc(&mut self, _proc: ProcHandle) -> Result<()> {
        Ok(())
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

/// An `AppControl` whose `create_proc` always hands back the same handle,
/// for exercising the broker's duplicate-reference protocol check directly
/// rather than relying on the app layer to coincidentally collide.
pub struct FixedHandleAppControl {
    pub states: HashMap<u64, ProcessState>,
    pub next_handle: u64,
}

impl FixedHandleAppControl {
    pub fn new() -> Self {
        FixedHandleAppControl {
            states: HashMap::new(),
            next_handle: 0,
        }
    }
}

impl AppControl for FixedHandleAppControl {
    fn create(&mut self, _name: &AppName) -> Result<AppHandle> {
        self.next_handle += 1;
        self.states.insert(self.next_handle, ProcessState::Stopped);
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
        Ok(ProcHandle(1))
    }

    fn delete_proc(&mut self, _app: AppHandle, _proc: ProcHandle) {}

    fn start_proc(&mut self, _proc: ProcHandle) -> Result<()> {
        Ok(())
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

pub struct FakeConfigStore {
    pub installed: Vec<AppName>,
    pub manual: Vec<AppName>,
}

impl FakeConfigStore {
    pub fn new(installed: &[&str], manual: &[&str]) -> Self {
        FakeConfigStore {
            installed: installed.iter().map(|n| AppName::new(*n).unwrap()).collect(),
            manual: manual.iter().map(|n| AppName::new(*n).unwrap()).collect(),
        }
    }
}

impl ConfigStore for FakeConfigStore {
    fn is_installed(&self, name: &AppName) -> bool {
        self.installed.contains(name)
    }

    fn app_names(&self) -> Vec<AppName> {
        self.installed.clone()
    }

    fn start_manual(&self, name: &AppName) -> bool {
        self.manual.contains(name)
    }
}

pub struct FakeSecurityLabels;

impl SecurityLabels for FakeSecurityLabels {
    fn app_name_for_pid(&self, _pid: Pid) -> Result<AppName> {
        Err(SupervisorError::NotFound(AppName::new("x").unwrap()))
    }
}
