// Copyright 2024 The twopence authors
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

use std::time::Duration;

/// Chunk size used for stdin forwarding, output forwarding, and SCP
/// transfer.
pub const BUF_SIZE: usize = 1024 * 16;

/// Default SSH port when the target spec carries no `:port` suffix.
pub const DEFAULT_PORT: u16 = 22;

/// Default remote user when a command request does not specify one.
pub const DEFAULT_USER: &str = "root";

/// Ctrl-D, sent as the logical stdin EOF marker when a PTY is in use.
pub const CTRL_D: u8 = 0x04;

/// Ctrl-C, sent to interrupt a foregrounded PTY command.
pub const CTRL_C: u8 = 0x03;

/// Default connect timeout applied by the session factory when an
/// [`crate::Options`] override is not supplied.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
