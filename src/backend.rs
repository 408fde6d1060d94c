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

//! The pluggable backend surface: a [`Backend`] resolves a scheme to a
//! [`BackendTarget`], which is the "operation vector" of spec.md §3 — every
//! operation is optional, defaulting to *not supported*.

use std::time::Duration;

use crate::{
    error::{Error, ErrorKind, Result},
    iostream::IoStream,
    options::Options,
    sink::OutputSink,
};

/// The result of a command, file transfer, or remote process: a `{major,
/// minor}` pair whose meaning is backend-specific (for SSH, `major == 0`
/// means clean exit with `minor` the exit code; `major == EFAULT` means
/// killed by signal `minor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandStatus {
    pub major: i32,
    pub minor: i32,
}

impl CommandStatus {
    pub const fn zero() -> Self {
        CommandStatus { major: 0, minor: 0 }
    }
}

/// A command to run on the target.
///
/// `stdin` is the only iostream bound here: forwarded input comes from an
/// external local source. Output has no comparable source-side choice — it
/// is always delivered through the [`OutputSink`] passed alongside the
/// request, per spec.md's `local_sink` field on the transaction's
/// stdout/stderr state.
pub struct CommandRequest<'a> {
    pub command: String,
    pub user: Option<String>,
    pub timeout: Duration,
    pub request_tty: bool,
    pub stdin: Option<&'a mut dyn IoStream>,
}

impl<'a> CommandRequest<'a> {
    pub fn new(command: impl Into<String>) -> Result<Self> {
        let command = command.into();
        if command.is_empty() {
            return Err(Error::new(ErrorKind::Parameter));
        }
        Ok(CommandRequest {
            command,
            user: None,
            timeout: Duration::from_secs(60),
            request_tty: false,
            stdin: None,
        })
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn request_tty(mut self, request_tty: bool) -> Self {
        self.request_tty = request_tty;
        self
    }

    pub fn stdin(mut self, stream: &'a mut dyn IoStream) -> Self {
        self.stdin = Some(stream);
        self
    }
}

/// A bound instance of a backend, addressing one system under test. This is
/// the "operation vector" of spec.md §3/§4.7: any method a backend doesn't
/// implement keeps its default *not supported* body.
pub trait BackendTarget: Send {
    fn run_command(
        &mut self,
        _cmd: CommandRequest<'_>,
        _sink: &OutputSink,
    ) -> Result<CommandStatus> {
        Err(Error::new(ErrorKind::NotSupported))
    }

    #[allow(clippy::too_many_arguments)]
    fn inject_file(
        &mut self,
        _user: Option<&str>,
        _local: &mut dyn IoStream,
        _remote_name: &str,
        _mode: u32,
        _sink: &OutputSink,
    ) -> Result<CommandStatus> {
        Err(Error::new(ErrorKind::NotSupported))
    }

    fn extract_file(
        &mut self,
        _user: Option<&str>,
        _remote_name: &str,
        _local: &mut dyn IoStream,
        _sink: &OutputSink,
    ) -> Result<CommandStatus> {
        Err(Error::new(ErrorKind::NotSupported))
    }

    fn interrupt_command(&mut self) -> Result<()> {
        Err(Error::new(ErrorKind::NotSupported))
    }

    fn exit_remote(&mut self) -> Result<()> {
        Err(Error::new(ErrorKind::NotSupported))
    }
}

/// A named backend implementation: given a backend-spec string (the part of
/// the target spec after the first `:`) and the session-wide [`Options`]
/// the controller supplied to [`crate::Target::with_options`], produce a
/// bound [`BackendTarget`].
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn init(&self, backend_spec: &str, options: &Options) -> Result<Box<dyn BackendTarget>>;
}
