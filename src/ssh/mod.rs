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

//! The built-in `ssh` backend: session factory, command transaction, and
//! SCP file transfer over libssh2 (via the `ssh2` crate).

pub mod command;
pub mod scp;
pub mod session;
pub mod signals;

use std::sync::Mutex;

use tracing::instrument;

use crate::{
    backend::{Backend, BackendTarget, CommandRequest, CommandStatus},
    error::Result,
    iostream::IoStream,
    options::Options,
    sink::OutputSink,
    ssh::{command::ForegroundSlot, session::SessionTemplate},
};

/// The `ssh` scheme's [`Backend`]: builds an [`SshTarget`] from a
/// `HOST[:PORT]` backend-spec.
#[derive(Default)]
pub struct SshBackend;

impl Backend for SshBackend {
    fn name(&self) -> &'static str {
        "ssh"
    }

    #[instrument(skip(self, options))]
    fn init(&self, backend_spec: &str, options: &Options) -> Result<Box<dyn BackendTarget>> {
        let template = SessionTemplate::parse_with_options(backend_spec, options.clone())?;
        Ok(Box::new(SshTarget { template, foreground: Mutex::new(None) }))
    }
}

/// One target bound to the `ssh` backend: the connection template plus the
/// single-slot foreground-transaction reference spec.md §3 describes.
pub struct SshTarget {
    template: SessionTemplate,
    foreground: ForegroundSlot,
}

impl BackendTarget for SshTarget {
    fn run_command(&mut self, cmd: CommandRequest<'_>, sink: &OutputSink) -> Result<CommandStatus> {
        command::run_command(&self.template, cmd, sink, &self.foreground)
    }

    fn inject_file(
        &mut self,
        user: Option<&str>,
        local: &mut dyn IoStream,
        remote_name: &str,
        mode: u32,
        sink: &OutputSink,
    ) -> Result<CommandStatus> {
        scp::inject_file(&self.template, user, local, remote_name, mode, sink)
    }

    fn extract_file(
        &mut self,
        user: Option<&str>,
        remote_name: &str,
        local: &mut dyn IoStream,
        sink: &OutputSink,
    ) -> Result<CommandStatus> {
        scp::extract_file(&self.template, user, remote_name, local, sink)
    }

    fn interrupt_command(&mut self) -> Result<()> {
        command::interrupt(&self.foreground)
    }

    // exit_remote keeps BackendTarget's default "not supported" body: SSH
    // has no wire representation for a remote-initiated shutdown.
}
