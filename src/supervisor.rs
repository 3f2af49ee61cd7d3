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

//! The single context value threaded through every entry point (spec §9:
//! "group global mutable state ... into a single Supervisor context value
//! rather than module-level variables"). `lifecycle.rs`, `fault.rs`,
//! `shutdown.rs`, and `appproc.rs` each add an `impl Supervisor` block that
//! operates on this shared state; nothing here is module-level `static`.

use std::path::PathBuf;

use log::warn;

use crate::app::{AppControl, AppName, ConfigStore, SecurityLabels};
use crate::appproc::AppProcMap;
use crate::ipc::SessionId;
use crate::registry::Registry;

static LOGKEY: &str = "SV";

pub struct Supervisor {
    pub(crate) registry: Registry,
    pub(crate) app_proc: AppProcMap,
    pub(crate) app_control: Box<dyn AppControl>,
    pub(crate) config: Box<dyn ConfigStore>,
    pub(crate) labels: Box<dyn SecurityLabels>,
    pub(crate) install_dir: PathBuf,
    pub(crate) all_stopped_cb: Option<Box<dyn FnMut()>>,
    pub(crate) reply_stop_cmd: Box<dyn FnMut(crate::ipc::CmdRef, crate::error::OpResult)>,
    session_killer: Box<dyn FnMut(SessionId, &str)>,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        app_control: Box<dyn AppControl>,
        config: Box<dyn ConfigStore>,
        labels: Box<dyn SecurityLabels>,
        install_dir: impl Into<PathBuf>,
        reply_stop_cmd: Box<dyn FnMut(crate::ipc::CmdRef, crate::error::OpResult)>,
        session_killer: Box<dyn FnMut(SessionId, &str)>,
    ) -> Self {
        Supervisor {
            registry: Registry::new(),
            app_proc: AppProcMap::default(),
            app_control,
            config,
            labels,
            install_dir: install_dir.into(),
            all_stopped_cb: None,
            reply_stop_cmd,
            session_killer,
        }
    }

    /// The opaque handle `AppControl` minted for `name`, if a container for
    /// it exists on either list. Exposed so collaborators that need to talk
    /// to the per-app subsystem directly (tests, the watchdog timer) don't
    /// have to re-derive it from the registry themselves.
    pub fn app_handle(&self, name: &AppName) -> Option<crate::app::AppHandle> {
        self.registry.get(name).map(|c| c.app_handle)
    }

    /// Root of the installed-package tree, as passed to `new`. Collaborators
    /// that need a filesystem anchor (e.g. to resolve `app.md5`) read it
    /// from here rather than threading it through every call.
    pub fn install_dir(&self) -> &std::path::Path {
        &self.install_dir
    }

    /// Names of every currently active app, in registry order.
    pub fn active_app_names(&self) -> Vec<AppName> {
        self.registry.active_containers().iter().map(|c| c.name.clone()).collect()
    }

    /// Whether `name` has a container on either list (active or inactive).
    pub fn has_container(&self, name: &AppName) -> bool {
        self.registry.get(name).is_some()
    }

    /// Number of apps currently active. The entry point's shutdown loop
    /// polls this to know when an orderly shutdown has fully drained.
    pub fn active_app_count(&self) -> usize {
        self.registry.active_count()
    }

    /// Register the callback invoked exactly once, when the active list
    /// becomes empty during `Shutdown` (spec §4.4 step 4).
    pub fn set_all_stopped_callback(&mut self, cb: Box<dyn FnMut()>) {
        self.all_stopped_cb = Some(cb);
    }

    /// Terminate a client's IPC session in response to a protocol
    /// violation (spec §7: "terminate the offending client session;
    /// Supervisor continues").
    pub(crate) fn kill_session(&mut self, session: SessionId, reason: &str) {
        warn!(target: LOGKEY, "killing session {:?}: {}", session, reason);
        (self.session_killer)(session, reason);
    }

    /// Installer hook: `AppInstall(name)`. A fresh install replaces any
    /// existing (necessarily inactive) container so the next lookup
    /// rebuilds it from the configuration store.
    pub fn on_app_installed(&mut self, name: &AppName) {
        self.purge_inactive_container(name);
    }

    /// Installer hook: `AppUninstall(name)`.
    pub fn on_app_uninstalled(&mut self, name: &AppName) {
        self.purge_inactive_container(name);
    }

    pub(crate) fn purge_inactive_container(&mut self, name: &AppName) {
        let is_inactive = match self.registry.get(name) {
            Some(c) => !c.is_active,
            None => return,
        };
        if !is_inactive {
            return;
        }
        if let Some(container) = self.registry.remove_any(name) {
            let purged = self.app_proc.purge_for_app(&container.name);
            for rec in purged {
                self.app_control.delete_proc(container.app_handle, rec.proc_handle);
            }
            self.app_control.destroy(container.app_handle);
        }
    }
}
