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

//! twopence is the transport core of a remote-test harness: it drives
//! commands on a system under test, streams stdin/stdout/stderr in real
//! time, forwards interrupts, and pushes or pulls files, all through a
//! pluggable backend selected by a `scheme:spec` target string.
//!
//! ```no_run
//! use std::time::Duration;
//! use twopence::{backend::CommandRequest, sink::OutputSink, Target};
//!
//! # fn main() -> twopence::error::Result<()> {
//! let mut target = Target::new("ssh:build-host")?;
//! let sink = OutputSink::single_buffer(64 * 1024);
//! let cmd = CommandRequest::new("/bin/echo hello")?.timeout(Duration::from_secs(10));
//! let status = target.run_command(cmd, &sink)?;
//! assert_eq!((status.major, status.minor), (0, 0));
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod consts;
pub mod error;
pub mod iostream;
pub mod logging;
pub mod options;
mod registry;
pub mod sink;
mod ssh;

pub use error::{Error, ErrorKind, Result};
pub use options::Options;

use backend::{BackendTarget, CommandRequest, CommandStatus};
use iostream::IoStream;
use options::Options;
use sink::OutputSink;

/// A handle bound to one backend instance, addressing one system under
/// test (spec.md §3's "Target handle").
pub struct Target {
    spec: String,
    ops: Box<dyn BackendTarget>,
}

impl Target {
    /// Parses `spec` as `scheme[:backend-spec]`, resolves `scheme` to a
    /// registered backend, and binds it with the default [`Options`]. See
    /// [`registry::register_backend`] to add a scheme beyond the built-in
    /// `ssh`, and [`Target::with_options`] to override connection-level
    /// knobs.
    pub fn new(spec: impl Into<String>) -> Result<Self> {
        Self::with_options(spec, Options::default())
    }

    /// Like [`Target::new`], but passes `options` through to the resolved
    /// backend's `init` — e.g. the `ssh` backend's connect timeout and key
    /// path override (spec.md §4.9).
    pub fn with_options(spec: impl Into<String>, options: Options) -> Result<Self> {
        let spec = spec.into();
        let (_, ops) = registry::dispatch(&spec, &options)?;
        Ok(Target { spec, ops })
    }

    /// The target spec this handle was created from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Runs `cmd` to completion, delivering its stdout/stderr to `sink`.
    pub fn run_command(&mut self, cmd: CommandRequest<'_>, sink: &OutputSink) -> Result<CommandStatus> {
        self.ops.run_command(cmd, sink)
    }

    /// Uploads `local`'s contents to `remote_name` on the target with
    /// permission bits `mode`, as `user` (backend default if `None`).
    pub fn inject_file(
        &mut self,
        user: Option<&str>,
        local: &mut dyn IoStream,
        remote_name: &str,
        mode: u32,
        sink: &OutputSink,
    ) -> Result<CommandStatus> {
        self.ops.inject_file(user, local, remote_name, mode, sink)
    }

    /// Downloads `remote_name` from the target into `local`, as `user`.
    pub fn extract_file(
        &mut self,
        user: Option<&str>,
        remote_name: &str,
        local: &mut dyn IoStream,
        sink: &OutputSink,
    ) -> Result<CommandStatus> {
        self.ops.extract_file(user, remote_name, local, sink)
    }

    /// Forwards a controller interrupt to the live foreground command, if
    /// any (spec.md §4.6).
    pub fn interrupt_command(&mut self) -> Result<()> {
        self.ops.interrupt_command()
    }

    /// Requests a remote-initiated shutdown. Always *not supported* for the
    /// `ssh` backend: SSH has no wire representation for it.
    pub fn exit_remote(&mut self) -> Result<()> {
        self.ops.exit_remote()
    }
}

/// Registers an additional backend beyond the built-in `ssh` scheme.
pub fn register_backend(backend: std::sync::Arc<dyn backend::Backend>) {
    registry::register_backend(backend)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn target_new_rejects_unknown_scheme() {
        let err = Target::new("virtio:/dev/vport0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownPlugin);
    }

    #[test]
    fn target_new_rejects_invalid_spec() {
        let err = Target::new(":host").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTargetSpec);
    }

    #[test]
    fn target_new_accepts_ssh_scheme() {
        let target = Target::new("ssh:example.invalid:2222").unwrap();
        assert_eq!(target.spec(), "ssh:example.invalid:2222");
    }

    #[test]
    fn target_with_options_reaches_the_ssh_backend() {
        let options = Options::builder()
            .connect_timeout(std::time::Duration::from_secs(1))
            .key_path("/tmp/does-not-matter-for-parsing")
            .build();
        let target = Target::with_options("ssh:example.invalid", options).unwrap();
        assert_eq!(target.spec(), "ssh:example.invalid");
    }
}
