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

use std::mem::MaybeUninit;

use libc::{c_int, pid_t};
use log::warn;
use signal_hook::consts::{SIGCHLD, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use super::SupervisorEvent;

static LOGKEY: &str = "SG";

/// Wraps `signal-hook`'s self-pipe so the event loop can poll for pending
/// signals without blocking, mirroring the teacher's
/// `core::os::signals::check_for_signal()` call at the top of each tick.
pub struct SignalSource {
    signals: Signals,
}

impl SignalSource {
    pub fn new() -> std::io::Result<Self> {
        let signals = Signals::new([SIGTERM, SIGINT, SIGCHLD])?;
        Ok(SignalSource { signals })
    }

    /// Drain everything pending right now. Never blocks: `pending()` only
    /// returns signals that have already arrived. A pending shutdown signal
    /// always wins over a pending SIGCHLD in the same tick.
    pub fn poll(&mut self) -> Option<SupervisorEvent> {
        let mut child_pending = false;
        for signal in self.signals.pending() {
            match signal {
                SIGTERM | SIGINT => return Some(SupervisorEvent::Shutdown),
                SIGCHLD => child_pending = true,
                other => warn!(target: LOGKEY, "unexpected signal {}", other),
            }
        }
        if child_pending {
            Some(SupervisorEvent::ChildPending)
        } else {
            None
        }
    }
}

/// Peek at the next zombie child without consuming it (`WNOWAIT`), ask
/// `is_ours` whether the Supervisor's `AppControl` recognizes it, and only
/// then reap it with a real `waitpid`. A child that isn't ours is left
/// exactly as the kernel reported it, for whatever other subsystem shares
/// SIGCHLD to claim.
pub fn reap_one_child<F: FnMut(pid_t) -> bool>(mut is_ours: F) -> Option<(pid_t, c_int)> {
    let pid = peek_exited_pid()?;
    if !is_ours(pid) {
        return None;
    }
    let mut status: c_int = 0;
    match unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) } {
        n if n == pid => Some((pid, status)),
        _ => None,
    }
}

fn peek_exited_pid() -> Option<pid_t> {
    let mut info: MaybeUninit<libc::siginfo_t> = MaybeUninit::zeroed();
    let rc = unsafe {
        libc::waitid(
            libc::P_ALL,
            0,
            info.as_mut_ptr(),
            libc::WEXITED | libc::WNOWAIT | libc::WNOHANG,
        )
    };
    if rc != 0 {
        return None;
    }
    let info = unsafe { info.assume_init() };
    // With WNOHANG and nothing to report, POSIX leaves si_pid at whatever
    // was written, but glibc zeroes the struct first -- a pid of 0 means
    // "nothing exited".
    let pid = unsafe { info.si_pid() };
    if pid == 0 {
        None
    } else {
        Some(pid)
    }
}
