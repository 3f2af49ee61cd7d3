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

//! Error taxonomy for the Supervisor core.
//!
//! `OpResult` is the coarse enum that crosses the IPC boundary (spec §6, §7
//! "surface visibility"). `SupervisorError` is strictly internal: it drives
//! `?`-composition and logging, and is never serialized to a client.

use thiserror::Error;

use crate::app::AppName;

/// Results returned to IPC callers. Deliberately coarse -- structured
/// detail stays in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    Ok,
    Fault,
    NotFound,
    Overflow,
    BadParameter,
    Duplicate,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("app '{0}' not found")]
    NotFound(AppName),

    #[error("app '{0}' already active")]
    Duplicate(AppName),

    #[error("client protocol violation: {0}")]
    ClientProtocolViolation(String),

    /// A fault action of Reboot was raised; the caller must propagate this
    /// to the top-level process to trigger a system reboot.
    #[error("fault action requires system reboot")]
    Reboot,

    #[error("resource error: {0}")]
    Resource(String),

    #[error("buffer too small")]
    Overflow,

    #[error("bad parameter: {0}")]
    BadParameter(String),
}

impl From<&SupervisorError> for OpResult {
    fn from(err: &SupervisorError) -> OpResult {
        match err {
            SupervisorError::NotFound(_) => OpResult::NotFound,
            SupervisorError::Duplicate(_) => OpResult::Duplicate,
            SupervisorError::Overflow => OpResult::Overflow,
            SupervisorError::BadParameter(_) => OpResult::BadParameter,
            SupervisorError::ClientProtocolViolation(_) => OpResult::BadParameter,
            SupervisorError::Reboot | SupervisorError::Resource(_) => OpResult::Fault,
        }
    }
}

impl From<SupervisorError> for OpResult {
    fn from(err: SupervisorError) -> OpResult {
        OpResult::from(&err)
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Invariant violations (spec §7: "unknown state enum, NULL container under
/// active link") are bugs, not runtime conditions -- they panic rather than
/// propagate, mirroring the teacher's `debug_assert!`-and-bail patterns but
/// made unconditional since these really must never happen.
macro_rules! invariant_violation {
    ($($arg:tt)*) => {{
        panic!("supervisor invariant violated: {}", format!($($arg)*));
    }};
}
pub(crate) use invariant_violation;
