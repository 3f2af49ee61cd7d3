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

//! Tiny opaque identifiers for the out-of-scope IPC layer. The IPC framework
//! itself is an external collaborator (spec §1); the Supervisor only needs
//! stable handles to name a session and an in-flight stop command.

/// Identifies the IPC connection that issued a request. Closure of the
/// session tied to this id triggers cleanup of everything tagged with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Identifies an in-flight `ctrl.StopApp` request awaiting its asynchronous
/// reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CmdRef(pub u64);
