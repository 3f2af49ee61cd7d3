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

//! Lifecycle Engine (spec §4.1): start, stop, restart and state queries for
//! installed apps, plus the stop-handler continuation that makes an
//! asynchronous stop into a single composite operation rather than a
//! install-then-hope-the-caller-checks-back sequence.

use log::{debug, info};

use crate::app::{AppContainer, AppName, ProcessState, StopHandler};
use crate::error::{OpResult, Result, SupervisorError};
use crate::ipc::CmdRef;
use crate::supervisor::Supervisor;

static LOGKEY: &str = "LC";

impl Supervisor {
    /// Build (or find) the container for `name`, consulting the
    /// configuration store when it isn't yet registered. Used both by
    /// `launch_app` and by `appProc.Create`, which may need a container for
    /// an app nothing has started yet.
    pub(crate) fn obtain_or_create_container(&mut self, name: &AppName) -> Result<()> {
        if self.registry.get(name).is_some() {
            return Ok(());
        }
        if !self.config.is_installed(name) {
            return Err(SupervisorError::NotFound(name.clone()));
        }
        let app_handle = self.app_control.create(name)?;
        self.registry.insert_inactive(AppContainer::new(name.clone(), app_handle));
        Ok(())
    }

    /// Every app installed with `startManual = false` is launched once at
    /// startup (spec §4.1, "auto-start apps").
    pub fn auto_start(&mut self) {
        for name in self.config.app_names() {
            if self.config.start_manual(&name) {
                continue;
            }
            match self.launch_app(&name) {
                OpResult::Ok => info!(target: LOGKEY, "auto-started '{}'", name),
                other => debug!(target: LOGKEY, "auto-start of '{}' returned {:?}", name, other),
            }
        }
    }

    /// `ctrl.StartApp`. Idempotent: starting an already-running app reports
    /// `Duplicate`, not an error that tears anything down. Deactivate is
    /// installed as the stop handler before `app.start` is even called, not
    /// after it returns, so a crash mid-start still settles correctly.
    pub fn launch_app(&mut self, name: &AppName) -> OpResult {
        if let Err(err) = self.obtain_or_create_container(name) {
            return OpResult::from(&err);
        }
        if self.registry.is_active(name) {
            return OpResult::Duplicate;
        }
        self.registry.move_to_active(name);
        let container = self.registry.get_mut(name).expect("just moved to active");
        container.stop_handler = Some(StopHandler::Deactivate);
        let app_handle = container.app_handle;
        match self.app_control.start(app_handle) {
            Ok(()) => {
                info!(target: LOGKEY, "started '{}'", name);
                OpResult::Ok
            }
            Err(err) => OpResult::from(&err),
        }
    }

    /// `ctrl.StopApp`. Asynchronous: the caller is answered from
    /// `fire_stop_handler` once the app actually settles into `Stopped`, not
    /// from this call directly (spec §4.1 design note on composite
    /// operations).
    pub fn stop_app(&mut self, name: &AppName, cmd: CmdRef) -> OpResult {
        if !self.registry.is_active(name) {
            return OpResult::NotFound;
        }
        let container = self.registry.get_mut(name).expect("checked active above");
        container.pending_stop_cmd = Some(cmd);
        self.stop_and_settle(name, StopHandler::RespondToStopCmd);
        OpResult::Ok
    }

    /// `ctrl.GetState`. Unknown or uninstalled apps report `Stopped` (spec
    /// §4.1: "Stopped otherwise").
    pub fn get_state(&self, name: &AppName) -> ProcessState {
        match self.registry.get(name) {
            Some(container) if container.is_active => self.app_control.state(container.app_handle),
            _ => ProcessState::Stopped,
        }
    }

    /// `info.GetProcState`. Validates both names before delegating.
    pub fn get_proc_state(&self, app: &str, proc: &str) -> ProcessState {
        if proc.is_empty() || proc.contains('/') {
            return ProcessState::Stopped;
        }
        let Ok(app_name) = AppName::new(app) else {
            return ProcessState::Stopped;
        };
        match self.registry.get(&app_name) {
            Some(container) if container.is_active => self.app_control.proc_state(container.app_handle, proc),
            _ => ProcessState::Stopped,
        }
    }

    /// `ctrl.GetAppNameFromPid`. Open question (spec §9, item (b)): a
    /// security-label `Fault` is treated the same as `NotFound` rather than
    /// propagated as a distinct result, since a client can't act
    /// differently on either.
    pub fn get_app_name_from_pid(&self, pid: libc::pid_t) -> Option<AppName> {
        self.labels.app_name_for_pid(pid).ok()
    }

    /// `info.GetHash`. Reads the `app.md5` key out of
    /// `<install_dir>/<name>/info.properties` (spec §6: "line-oriented
    /// key/value file"). A missing file and a present-but-keyless file are
    /// both reported as `NotFound` -- from a client's perspective neither
    /// distinguishes "never installed" from "installed without a hash."
    pub fn get_hash(&self, name: &AppName) -> std::result::Result<String, OpResult> {
        let path = self.install_dir.join(name.as_str()).join("info.properties");
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(OpResult::NotFound),
            Err(_) => return Err(OpResult::Fault),
        };
        contents
            .lines()
            .filter_map(|line| line.split_once('='))
            .find(|(key, _)| key.trim() == "app.md5")
            .map(|(_, value)| value.trim().to_string())
            .ok_or(OpResult::NotFound)
    }

    /// Unconditionally stop `name` and install `handler` to fire once it
    /// settles. The "install -> act -> check state -> fire if already
    /// Stopped" composite is expressed in a single call so there's no
    /// window where a handler is installed but nothing will ever check it.
    pub(crate) fn stop_and_settle(&mut self, name: &AppName, handler: StopHandler) {
        let Some(container) = self.registry.get_mut(name) else {
            return;
        };
        let app_handle = container.app_handle;
        container.stop_handler = Some(handler);
        self.app_control.stop(app_handle);
        self.settle(name);
    }

    /// Like `stop_and_settle`, but only issues the stop if the app is
    /// currently running (spec §4.2: "if not stopped, `app.stop`"); if it's
    /// already stopped the handler still fires through `settle` on this
    /// same call, so fault/watchdog dispatch never waits for a stop that
    /// will never happen.
    pub(crate) fn stop_if_running_and_install(&mut self, name: &AppName, handler: StopHandler) {
        let Some(container) = self.registry.get_mut(name) else {
            return;
        };
        let app_handle = container.app_handle;
        container.stop_handler = Some(handler);
        if matches!(self.app_control.state(app_handle), ProcessState::Running) {
            self.app_control.stop(app_handle);
        }
        self.settle(name);
    }

    /// Like `stop_if_running_and_install`, but leaves whatever stop handler
    /// is already installed untouched (spec §4.2: the watchdog `StopApp`
    /// effect is "stop if running" with no handler of its own -- it rides
    /// on the Deactivate handler `launch_app` already installed).
    pub(crate) fn stop_if_running(&mut self, name: &AppName) {
        let Some(container) = self.registry.get(name) else {
            return;
        };
        let app_handle = container.app_handle;
        if matches!(self.app_control.state(app_handle), ProcessState::Running) {
            self.app_control.stop(app_handle);
        }
        self.settle(name);
    }

    /// Check whether `name` has already reached `Stopped`, and if so fire
    /// its installed stop handler. Called both right after issuing a stop
    /// (in case it completed synchronously) and from the SIGCHLD path once
    /// a child's exit brings the app to rest.
    pub(crate) fn settle(&mut self, name: &AppName) {
        let Some(container) = self.registry.get(name) else {
            return;
        };
        if !matches!(self.app_control.state(container.app_handle), ProcessState::Stopped) {
            return;
        }
        let Some(handler) = self.registry.get_mut(name).and_then(|c| c.stop_handler.take()) else {
            return;
        };
        self.fire_stop_handler(name, handler);
    }

    pub(crate) fn fire_stop_handler(&mut self, name: &AppName, handler: StopHandler) {
        debug!(target: LOGKEY, "'{}' settled, firing {:?}", name, handler);
        match handler {
            StopHandler::Deactivate => self.do_deactivate(name),
            StopHandler::Restart => self.do_restart(name),
            StopHandler::RespondToStopCmd => self.do_respond_to_stop_cmd(name),
            StopHandler::ShutdownNext => self.do_shutdown_next(name),
        }
    }

    fn do_deactivate(&mut self, name: &AppName) {
        self.registry.move_to_inactive(name);
        info!(target: LOGKEY, "'{}' deactivated", name);
    }

    /// Effect of the `Restart` stop handler (spec §4.1 table): reinstall
    /// Deactivate in case a future stop completes normally, call `app.start`
    /// directly (the container is still on the active list -- this is not a
    /// `launch_app`), and deactivate on failure instead of leaving a
    /// half-started app marked active.
    fn do_restart(&mut self, name: &AppName) {
        let Some(container) = self.registry.get_mut(name) else {
            return;
        };
        container.stop_handler = Some(StopHandler::Deactivate);
        let app_handle = container.app_handle;
        match self.app_control.start(app_handle) {
            Ok(()) => info!(target: LOGKEY, "'{}' restarted", name),
            Err(err) => {
                info!(target: LOGKEY, "'{}' restart failed ({}), deactivating", name, err);
                self.do_deactivate(name);
            }
        }
    }

    fn do_respond_to_stop_cmd(&mut self, name: &AppName) {
        let Some(container) = self.registry.get_mut(name) else {
            return;
        };
        if let Some(cmd) = container.pending_stop_cmd.take() {
            (self.reply_stop_cmd)(cmd, OpResult::Ok);
        }
        self.registry.move_to_inactive(name);
    }

    /// Effect of the `ShutdownNext` stop handler (spec §4.1/§4.4): remove
    /// the container, destroy its app handle, release it, then resume the
    /// sequencer. AppProc records tied to the container are purged first,
    /// the same way `purge_inactive_container` does for the install/
    /// uninstall path.
    fn do_shutdown_next(&mut self, name: &AppName) {
        if let Some(container) = self.registry.remove_any(name) {
            let purged = self.app_proc.purge_for_app(&container.name);
            for rec in purged {
                self.app_control.delete_proc(container.app_handle, rec.proc_handle);
            }
            self.app_control.destroy(container.app_handle);
        }
        info!(target: LOGKEY, "'{}' stopped for shutdown", name);
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppHandle, FaultAction, Pid, Priority, ProcHandle, WatchdogAction};
    use crate::error::SupervisorError;
    use crate::ipc::SessionId;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeControl {
        states: HashMap<u64, ProcessState>,
        next_handle: u64,
        started: Vec<u64>,
        stopped: Vec<u64>,
    }

    impl FakeControl {
        fn new() -> Rc<RefCell<Self>> {
            Rc::new(RefCell::new(Self::default()))
        }
    }

    struct FakeAppControl(Rc<RefCell<FakeControl>>);

    impl crate::app::AppControl for FakeAppControl {
        fn create(&mut self, _name: &AppName) -> Result<AppHandle> {
            let mut inner = self.0.borrow_mut();
            inner.next_handle += 1;
            let h = inner.next_handle;
            inner.states.insert(h, ProcessState::Stopped);
            Ok(AppHandle(h))
        }
        fn start(&mut self, app: AppHandle) -> Result<()> {
            let mut inner = self.0.borrow_mut();
            inner.states.insert(app.0, ProcessState::Running);
            inner.started.push(app.0);
            Ok(())
        }
        fn stop(&mut self, app: AppHandle) {
            let mut inner = self.0.borrow_mut();
            inner.states.insert(app.0, ProcessState::Stopped);
            inner.stopped.push(app.0);
        }
        fn state(&self, app: AppHandle) -> ProcessState {
            *self.0.borrow().states.get(&app.0).unwrap_or(&ProcessState::Stopped)
        }
        fn destroy(&mut self, app: AppHandle) {
            self.0.borrow_mut().states.remove(&app.0);
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

    struct FakeConfig {
        installed: Vec<AppName>,
        manual: Vec<AppName>,
    }

    impl crate::app::ConfigStore for FakeConfig {
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

    struct FakeLabels;
    impl crate::app::SecurityLabels for FakeLabels {
        fn app_name_for_pid(&self, _pid: Pid) -> Result<AppName> {
            Err(SupervisorError::NotFound(AppName::new("x").unwrap()))
        }
    }

    fn fresh(installed: &[&str], manual: &[&str]) -> (Supervisor, Rc<RefCell<FakeControl>>) {
        let backing = FakeControl::new();
        let sup = Supervisor::new(
            Box::new(FakeAppControl(backing.clone())),
            Box::new(FakeConfig {
                installed: installed.iter().map(|n| AppName::new(*n).unwrap()).collect(),
                manual: manual.iter().map(|n| AppName::new(*n).unwrap()).collect(),
            }),
            Box::new(FakeLabels),
            "/apps",
            Box::new(|_cmd, _result| {}),
            Box::new(|_session, _reason| {}),
        );
        (sup, backing)
    }

    #[test]
    fn launch_then_duplicate() {
        let (mut sup, _b) = fresh(&["modem"], &[]);
        let name = AppName::new("modem").unwrap();
        assert_eq!(sup.launch_app(&name), OpResult::Ok);
        assert!(sup.registry.is_active(&name));
        assert_eq!(sup.launch_app(&name), OpResult::Duplicate);
    }

    #[test]
    fn launch_uninstalled_not_found() {
        let (mut sup, _b) = fresh(&[], &[]);
        let name = AppName::new("ghost").unwrap();
        assert_eq!(sup.launch_app(&name), OpResult::NotFound);
    }

    #[test]
    fn stop_settles_synchronously_and_deactivates() {
        let (mut sup, _b) = fresh(&["modem"], &[]);
        let name = AppName::new("modem").unwrap();
        sup.launch_app(&name);
        let result = sup.stop_app(&name, CmdRef(1));
        assert_eq!(result, OpResult::Ok);
        assert!(!sup.registry.is_active(&name));
    }

    #[test]
    fn auto_start_skips_manual_apps() {
        let (mut sup, _b) = fresh(&["modem", "gps"], &["gps"]);
        sup.auto_start();
        assert!(sup.registry.is_active(&AppName::new("modem").unwrap()));
        assert!(!sup.registry.is_active(&AppName::new("gps").unwrap()));
    }

    #[test]
    fn get_state_reports_stopped_for_unknown_app() {
        let (sup, _b) = fresh(&[], &[]);
        let name = AppName::new("ghost").unwrap();
        assert_eq!(sup.get_state(&name), ProcessState::Stopped);
    }

    #[test]
    fn launch_app_installs_deactivate_handler_up_front() {
        let (mut sup, _b) = fresh(&["modem"], &[]);
        let name = AppName::new("modem").unwrap();
        sup.launch_app(&name);
        assert_eq!(
            sup.registry.get(&name).unwrap().stop_handler,
            Some(StopHandler::Deactivate)
        );
    }

    #[test]
    fn get_hash_reads_md5_key_from_info_properties() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("modem")).unwrap();
        std::fs::write(
            dir.path().join("modem").join("info.properties"),
            "app.name=modem\napp.md5=deadbeef\n",
        )
        .unwrap();

        let backing = FakeControl::new();
        let sup = Supervisor::new(
            Box::new(FakeAppControl(backing)),
            Box::new(FakeConfig {
                installed: vec![AppName::new("modem").unwrap()],
                manual: vec![],
            }),
            Box::new(FakeLabels),
            dir.path(),
            Box::new(|_cmd, _result| {}),
            Box::new(|_session, _reason| {}),
        );

        let name = AppName::new("modem").unwrap();
        assert_eq!(sup.get_hash(&name), Ok("deadbeef".to_string()));
    }

    #[test]
    fn get_hash_reports_not_found_for_missing_app() {
        let dir = tempfile::tempdir().unwrap();
        let backing = FakeControl::new();
        let sup = Supervisor::new(
            Box::new(FakeAppControl(backing)),
            Box::new(FakeConfig {
                installed: vec![],
                manual: vec![],
            }),
            Box::new(FakeLabels),
            dir.path(),
            Box::new(|_cmd, _result| {}),
            Box::new(|_session, _reason| {}),
        );
        let name = AppName::new("ghost").unwrap();
        assert_eq!(sup.get_hash(&name), Err(OpResult::NotFound));
    }
}
