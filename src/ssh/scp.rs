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

//! SCP file transfer (spec §4.5): upload and download against a remote
//! path, including the remote-directory existence probe and the
//! buffer-the-whole-thing fallback for non-seekable local sources.

use std::{
    io::{Read, Write},
    path::Path,
};

use tracing::instrument;

use crate::{
    backend::CommandStatus,
    consts::BUF_SIZE,
    error::{Error, ErrorKind, Result},
    iostream::IoStream,
    sink::OutputSink,
    ssh::session::{self, SessionTemplate},
};

/// Uploads `local`'s contents to `remote_name` on the target, creating it
/// with permission bits `mode`. The directory component of `remote_name`
/// must already exist — libssh2's SCP sink silently accepts a missing
/// directory as if it were the file's own name, so existence is checked
/// up front rather than trusted to the transfer itself.
#[instrument(skip(template, local, sink), fields(remote = remote_name))]
pub fn inject_file(
    template: &SessionTemplate,
    user: Option<&str>,
    local: &mut dyn IoStream,
    remote_name: &str,
    mode: u32,
    sink: &OutputSink,
) -> Result<CommandStatus> {
    let session = session::open_session(template, user)?;

    let remote_path = Path::new(remote_name);
    let dir = remote_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("/"));
    if session.sftp().map(|sftp| sftp.stat(dir).is_err()).unwrap_or(false) {
        return Err(Error::with_detail(ErrorKind::SendFile, format!("remote directory {} does not exist", dir.display())));
    }

    let filesize = match local.known_size() {
        Some(size) => size,
        None => {
            // Non-seekable source: drain it fully so the SCP sink can be
            // told the length up front, as the protocol requires.
            let mut buf = Vec::new();
            local.read_to_end(&mut buf).map_err(|e| Error::with_source(ErrorKind::LocalFile, e))?;
            return inject_buffer(&session, &buf, remote_path, mode, sink);
        }
    };

    let mut remote = session
        .scp_send(remote_path, mode as i32, filesize, None)
        .map_err(|e| Error::with_source(ErrorKind::SendFile, e))?;

    let mut remaining = filesize;
    let mut buf = [0u8; BUF_SIZE];
    while remaining > 0 {
        let want = (BUF_SIZE as u64).min(remaining) as usize;
        let n = local.read(&mut buf[..want]).map_err(|e| Error::with_source(ErrorKind::LocalFile, e))?;
        if n == 0 {
            return Err(Error::with_detail(ErrorKind::LocalFile, "short read while uploading"));
        }
        write_all_scp(&mut remote, &buf[..n])?;
        sink.progress_dot().ok();
        remaining -= n as u64;
    }
    remote.send_eof().ok();
    remote.wait_eof().ok();
    remote.close().ok();
    remote.wait_close().ok();
    sink.progress_done().ok();

    Ok(CommandStatus::zero())
}

fn inject_buffer(
    session: &ssh2::Session,
    buf: &[u8],
    remote_path: &Path,
    mode: u32,
    sink: &OutputSink,
) -> Result<CommandStatus> {
    let mut remote = session
        .scp_send(remote_path, mode as i32, buf.len() as u64, None)
        .map_err(|e| Error::with_source(ErrorKind::SendFile, e))?;
    for chunk in buf.chunks(BUF_SIZE) {
        write_all_scp(&mut remote, chunk)?;
        sink.progress_dot().ok();
    }
    remote.send_eof().ok();
    remote.wait_eof().ok();
    remote.close().ok();
    remote.wait_close().ok();
    sink.progress_done().ok();
    Ok(CommandStatus::zero())
}

fn write_all_scp(remote: &mut ssh2::Channel, buf: &[u8]) -> Result<()> {
    remote.write_all(buf).map_err(|e| Error::with_source(ErrorKind::SendFile, e))
}

/// Downloads `remote_name` from the target into `local`. An empty remote
/// file is a successful no-op transfer.
#[instrument(skip(template, local, sink), fields(remote = remote_name))]
pub fn extract_file(
    template: &SessionTemplate,
    user: Option<&str>,
    remote_name: &str,
    local: &mut dyn IoStream,
    sink: &OutputSink,
) -> Result<CommandStatus> {
    let session = session::open_session(template, user)?;

    let (mut remote, stat) =
        session.scp_recv(Path::new(remote_name)).map_err(|e| Error::with_source(ErrorKind::ReceiveFile, e))?;

    let mut remaining = stat.size();
    let mut buf = [0u8; BUF_SIZE];
    while remaining > 0 {
        let want = (BUF_SIZE as u64).min(remaining) as usize;
        let n = remote.read(&mut buf[..want]).map_err(|e| Error::with_source(ErrorKind::ReceiveFile, e))?;
        if n == 0 {
            return Err(Error::with_detail(ErrorKind::ReceiveFile, "remote closed before expected size"));
        }
        local.write_all(&buf[..n]).map_err(|e| Error::with_source(ErrorKind::LocalFile, e))?;
        sink.progress_dot().ok();
        remaining -= n as u64;
    }
    remote.wait_eof().map_err(|e| Error::with_source(ErrorKind::ReceiveFile, e))?;
    remote.close().ok();
    remote.wait_close().ok();
    sink.progress_done().ok();

    Ok(CommandStatus::zero())
}
