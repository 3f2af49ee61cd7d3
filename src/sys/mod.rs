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

//! Platform glue for the single-threaded event loop: turning the
//! asynchronous arrival of SIGCHLD and SIGTERM/SIGINT into plain values the
//! loop in `main.rs` can poll for on each tick, the way the teacher's
//! launcher loop turns `core::os::signals::check_for_signal()` into a
//! `SignalEvent` each tick. `signal-hook`'s self-pipe plumbing stands in for
//! that internal module; everything downstream of `poll()` is unchanged in
//! shape.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{reap_one_child, SignalSource};

/// What the loop learned this tick from the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// At least one SIGCHLD arrived; the caller drives `reap_one_child` to
    /// claim whichever zombies belong to it.
    ChildPending,
    /// SIGTERM or SIGINT: begin an orderly shutdown.
    Shutdown,
}
