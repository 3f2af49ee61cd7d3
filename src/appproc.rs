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

//! AppProc Broker (spec §4.3): client-created references to individual
//! processes inside an app, scoped to the IPC session that created them.

use std::collections::HashMap;

use log::debug;

use crate::app::{AppName, FaultAction, Priority, ProcHandle, ProcessState};
use crate::error::OpResult;
use crate::ipc::SessionId;
use crate::supervisor::Supervisor;

static LOGKEY: &str = "PB";

/// Opaque, reusable-safe reference handed back to IPC clients. Backed by a
/// monotonically increasing counter rather than a reused slot index, so a
/// stale reference can never alias a live record (spec §9: "never expose
/// raw pointers across the IPC boundary").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcRef(u64);

#[derive(Debug)]
pub struct AppProcContainer {
    pub proc_handle: ProcHandle,
    pub app_name: AppName,
    pub owner_session: SessionId,
    pub has_stop_handler: bool,
}

#[derive(Debug, Default)]
pub struct AppProcMap {
    next_ref: u64,
    records: HashMap<ProcRef, AppProcContainer>,
}

impl AppProcMap {
    pub fn insert(&mut self, record: AppProcContainer) -> ProcRef {
        self.next_ref += 1;
        let r = ProcRef(self.next_ref);
        self.records.insert(r, record);
        r
    }

    pub fn get(&self, r: ProcRef) -> Option<&AppProcContainer> {
        self.records.get(&r)
    }

    pub fn get_mut(&mut self, r: ProcRef) -> Option<&mut AppProcContainer> {
        self.records.get_mut(&r)
    }

    pub fn remove(&mut self, r: ProcRef) -> Option<AppProcContainer> {
        self.records.remove(&r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_proc_handle(&self, handle: ProcHandle) -> bool {
        self.records.values().any(|r| r.proc_handle == handle)
    }

    /// Purge every record owned by `session`, returning them so the caller
    /// can tear down the corresponding app-layer proc.
    pub fn purge_for_session(&mut self, session: SessionId) -> Vec<AppProcContainer> {
        let keys: Vec<ProcRef> = self
            .records
            .iter()
            .filter(|(_, v)| v.owner_session == session)
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter().filter_map(|k| self.records.remove(&k)).collect()
    }

    /// Purge every record belonging to `app_name`, for container teardown.
    pub fn purge_for_app(&mut self, app_name: &AppName) -> Vec<AppProcContainer> {
        let keys: Vec<ProcRef> = self
            .records
            .iter()
            .filter(|(_, v)| &v.app_name == app_name)
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter().filter_map(|k| self.records.remove(&k)).collect()
    }
}

impl Supervisor {
    /// `appProc.Create`. Both `proc_name` and `exec_path` may be empty
    /// ("unspecified") but not simultaneously; `app` must be a valid name.
    /// A duplicate `proc_handle` from the app layer is a protocol-level bug
    /// in the client and kills its session (spec §9 open question (c)).
    pub fn app_proc_create(
        &mut self,
        session: SessionId,
        app: &str,
        proc_name: &str,
        exec_path: &str,
    ) -> Option<ProcRef> {
        if proc_name.is_empty() && exec_path.is_empty() {
            self.kill_session(session, "appProc.Create: procName and execPath both empty");
            return None;
        }
        let app_name = match AppName::new(app) {
            Ok(n) => n,
            Err(_) => {
                self.kill_session(session, "appProc.Create: invalid app name");
                return None;
            }
        };
        if self.obtain_or_create_container(&app_name).is_err() {
            return None;
        }
        let app_handle = self
            .registry
            .get(&app_name)
            .expect("just ensured present")
            .app_handle;
        let proc_handle = match self.app_control.create_proc(app_handle, proc_name, exec_path) {
            Ok(h) => h,
            Err(_) => return None,
        };
        if self.app_proc.has_proc_handle(proc_handle) {
            self.app_control.delete_proc(app_handle, proc_handle);
            self.kill_session(session, "appProc.Create: duplicate proc reference");
            return None;
        }
        Some(self.app_proc.insert(AppProcContainer {
            proc_handle,
            app_name,
            owner_session: session,
            has_stop_handler: false,
        }))
    }

    /// Whether `r` still names a live AppProc record.
    pub fn app_proc_exists(&self, r: ProcRef) -> bool {
        self.app_proc.get(r).is_some()
    }

    pub fn app_proc_set_stdin(&mut self, r: ProcRef, fd: i32) -> bool {
        match self.app_proc.get(r) {
            Some(rec) => {
                self.app_control.set_stdin(rec.proc_handle, fd);
                true
            }
            None => false,
        }
    }

    pub fn app_proc_set_stdout(&mut self, r: ProcRef, fd: i32) -> bool {
        match self.app_proc.get(r) {
            Some(rec) => {
                self.app_control.set_stdout(rec.proc_handle, fd);
                true
            }
            None => false,
        }
    }

    pub fn app_proc_set_stderr(&mut self, r: ProcRef, fd: i32) -> bool {
        match self.app_proc.get(r) {
            Some(rec) => {
                self.app_control.set_stderr(rec.proc_handle, fd);
                true
            }
            None => false,
        }
    }

    /// `appProc.AddArg`. An empty `arg` finalises an intentionally empty
    /// override list rather than being a no-op.
    pub fn app_proc_add_arg(&mut self, r: ProcRef, arg: &str) -> bool {
        match self.app_proc.get(r) {
            Some(rec) => {
                self.app_control.add_arg(rec.proc_handle, arg);
                true
            }
            None => false,
        }
    }

    pub fn app_proc_clear_args(&mut self, r: ProcRef) -> bool {
        match self.app_proc.get(r) {
            Some(rec) => {
                self.app_control.clear_args(rec.proc_handle);
                true
            }
            None => false,
        }
    }

    /// `appProc.SetPriority`. An unparsable string is a protocol violation
    /// and kills the session.
    pub fn app_proc_set_priority(&mut self, session: SessionId, r: ProcRef, s: &str) -> bool {
        let Some(rec) = self.app_proc.get(r) else {
            return false;
        };
        let proc_handle = rec.proc_handle;
        match s.parse::<Priority>() {
            Ok(priority) => {
                self.app_control.set_priority(proc_handle, priority);
                true
            }
            Err(_) => {
                self.kill_session(session, "appProc.SetPriority: invalid priority string");
                false
            }
        }
    }

    pub fn app_proc_clear_priority(&mut self, r: ProcRef) -> bool {
        match self.app_proc.get(r) {
            Some(rec) => {
                self.app_control.clear_priority(rec.proc_handle);
                true
            }
            None => false,
        }
    }

    pub fn app_proc_set_fault_action(&mut self, r: ProcRef, action: FaultAction) -> bool {
        match self.app_proc.get(r) {
            Some(rec) => {
                self.app_control.set_fault_action(rec.proc_handle, action);
                true
            }
            None => false,
        }
    }

    pub fn app_proc_clear_fault_action(&mut self, r: ProcRef) -> bool {
        match self.app_proc.get(r) {
            Some(rec) => {
                self.app_control.clear_fault_action(rec.proc_handle);
                true
            }
            None => false,
        }
    }

    /// `appProc.AddStopHandler`. At most one per proc; the proc reference
    /// itself is the handler reference.
    pub fn app_proc_add_stop_handler(&mut self, r: ProcRef, handler: Box<dyn FnMut() + Send>) -> bool {
        let Some(rec) = self.app_proc.get_mut(r) else {
            return false;
        };
        let proc_handle = rec.proc_handle;
        rec.has_stop_handler = true;
        self.app_control.set_stop_handler(proc_handle, Some(handler));
        true
    }

    pub fn app_proc_remove_stop_handler(&mut self, r: ProcRef) -> bool {
        let Some(rec) = self.app_proc.get_mut(r) else {
            return false;
        };
        let proc_handle = rec.proc_handle;
        rec.has_stop_handler = false;
        self.app_control.set_stop_handler(proc_handle, None);
        true
    }

    /// `appProc.Start`. Promotes the owning app to Running first if
    /// needed; setters applied after `Start` have no effect on the
    /// now-running instance (spec §5 ordering guarantee).
    pub fn app_proc_start(&mut self, r: ProcRef) -> OpResult {
        let Some(rec) = self.app_proc.get(r) else {
            return OpResult::NotFound;
        };
        let app_name = rec.app_name.clone();
        let proc_handle = rec.proc_handle;

        if !matches!(self.get_state(&app_name), ProcessState::Running) {
            match self.launch_app(&app_name) {
                OpResult::Ok | OpResult::Duplicate => {}
                other => return other,
            }
        }

        match self.app_control.start_proc(proc_handle) {
            Ok(()) => OpResult::Ok,
            Err(err) => OpResult::from(&err),
        }
    }

    /// `appProc.Delete`.
    pub fn app_proc_delete(&mut self, r: ProcRef) {
        let Some(rec) = self.app_proc.remove(r) else {
            return;
        };
        if let Some(container) = self.registry.get(&rec.app_name) {
            self.app_control.delete_proc(container.app_handle, rec.proc_handle);
        }
    }

    /// Session-close contract (spec §4.3): every AppProc record owned by
    /// `session` is deleted so ad-hoc overrides never outlive their
    /// requesting client.
    pub fn on_session_closed(&mut self, session: SessionId) {
        let records = self.app_proc.purge_for_session(session);
        debug!(target: LOGKEY, "session {:?} closed, purging {} proc record(s)", session, records.len());
        for rec in records {
            if let Some(container) = self.registry.get(&rec.app_name) {
                self.app_control.delete_proc(container.app_handle, rec.proc_handle);
            }
        }
    }
}
