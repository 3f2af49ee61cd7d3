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

//! Application Supervisor core.
//!
//! Owns installed-app lifecycle, fault recovery, watchdog dispatch, the
//! AppProc broker, and orderly shutdown, all driven from a single
//! cooperative event loop -- no threads, no internal locks. Everything this
//! crate doesn't own (the per-app process machinery, the IPC transport, the
//! configuration tree's authoritative format, security labelling) is
//! modeled as a trait in [`app`] and supplied by the embedding binary.

pub mod app;
pub mod appproc;
pub mod config;
pub mod error;
pub mod fault;
pub mod ipc;
pub mod lifecycle;
pub mod registry;
pub mod shutdown;
pub mod sys;
pub mod supervisor;

pub use app::AppName;
pub use appproc::ProcRef;
pub use error::{OpResult, Result, SupervisorError};
pub use ipc::{CmdRef, SessionId};
pub use supervisor::Supervisor;
