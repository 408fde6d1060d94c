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

//! The SSH command transaction (spec §4.4): opens a channel, optionally
//! requests a PTY, issues the command, runs the stdin/stdout/stderr/deadline
//! event loop, captures the exit status or signal, and tears everything
//! down on every exit path.

use std::{
    io::{self, Read, Write},
    os::unix::io::AsRawFd,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use ssh2::{Channel, Session};
use tracing::{debug, instrument, warn};

use crate::{
    backend::{CommandRequest, CommandStatus},
    consts::{BUF_SIZE, CTRL_C, CTRL_D},
    error::{Error, ErrorKind, Result},
    iostream::IoStream,
    sink::OutputSink,
    ssh::{
        session::{self, SessionTemplate},
        signals::signal_number,
    },
};

/// What `interrupt_command` needs to reach into a command that's currently
/// executing in [`run_command`]'s event loop, from another thread or a
/// signal handler — the only cross-call state the core keeps, per spec.md
/// §9's "single foreground transaction."
pub struct ForegroundHandle {
    channel: Arc<Mutex<Channel>>,
    use_tty: bool,
    eof_sent: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
}

/// The target's single foreground-transaction slot (spec.md §3's "Target
/// handle... backend-specific state: the session template and a
/// single-slot foreground-transaction reference").
pub type ForegroundSlot = Mutex<Option<ForegroundHandle>>;

/// Forwards a controller interrupt to the slot's live transaction, per
/// spec.md §4.6.
pub fn interrupt(foreground: &ForegroundSlot) -> Result<()> {
    let guard = foreground.lock().unwrap();
    let fg = guard.as_ref().ok_or_else(|| Error::new(ErrorKind::OpenSession))?;

    if fg.use_tty {
        if fg.eof_sent.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Interrupt));
        }
        let mut channel = fg.channel.lock().unwrap();
        channel.write_all(&[CTRL_C]).map_err(|e| Error::with_source(ErrorKind::Interrupt, e))?;
    } else {
        // No bytes are delivered: cross-channel signal delivery isn't
        // reliably supported by the peer SSH implementation. The flag is
        // retained for parity; nothing in this crate consumes it.
        fg.interrupted.store(true, Ordering::SeqCst);
    }
    Ok(())
}

/// Tracks the transaction's progress through spec.md's linear state
/// machine. Transitions are one-directional; any error forces a jump to
/// `Disposed` via the teardown path rather than stepping through the
/// remaining states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Init,
    Opened,
    Executing,
    Draining,
    Reported,
    Disposed,
}

/// Runs one foreground command against `template` and returns its status.
///
/// Mirrors spec.md §4.4's eleven entry steps: the transaction's session and
/// channel are local to this call and are always released before
/// returning, on every path including early errors — there is no
/// freestanding `Transaction` value to leak.
#[instrument(skip(template, cmd, sink, foreground), fields(command = %cmd.command, tty = cmd.request_tty))]
pub fn run_command(
    template: &SessionTemplate,
    cmd: CommandRequest<'_>,
    sink: &OutputSink,
    foreground: &ForegroundSlot,
) -> Result<CommandStatus> {
    if cmd.command.is_empty() {
        return Err(Error::new(ErrorKind::Parameter));
    }
    if foreground.lock().unwrap().is_some() {
        // Re-entering run_command with a live foreground transaction is
        // explicitly undefined by spec.md §9; reject it at the boundary.
        return Err(Error::with_detail(ErrorKind::Parameter, "a command is already running on this target"));
    }

    let mut state = TxState::Init;
    let deadline = Instant::now() + cmd.timeout;

    let run = || -> Result<CommandStatus> {
        let session = session::open_session(template, cmd.user.as_deref())?;
        let mut raw_channel = session
            .channel_session()
            .map_err(|e| Error::with_source(ErrorKind::OpenSession, e))?;
        state = TxState::Opened;

        let mut use_tty = false;
        if cmd.request_tty {
            raw_channel
                .request_pty("xterm", None, None)
                .map_err(|e| Error::with_source(ErrorKind::OpenSession, e))?;
            use_tty = true;
        }

        let mut stdin = cmd.stdin;
        let was_blocking = match stdin.as_deref_mut() {
            Some(s) => s.set_nonblocking(true).map_err(Error::from)?,
            None => true,
        };

        let exec_result = raw_channel
            .exec(&cmd.command)
            .map_err(|e| Error::with_source(ErrorKind::SendCommand, e));

        let channel = Arc::new(Mutex::new(raw_channel));
        let eof_sent_flag = Arc::new(AtomicBool::new(false));
        let interrupted_flag = Arc::new(AtomicBool::new(false));

        let outcome = exec_result.and_then(|()| {
            state = TxState::Executing;
            *foreground.lock().unwrap() = Some(ForegroundHandle {
                channel: channel.clone(),
                use_tty,
                eof_sent: eof_sent_flag.clone(),
                interrupted: interrupted_flag,
            });
            drain(&session, &channel, stdin.as_deref_mut(), sink, deadline, use_tty, &eof_sent_flag, &mut state)
        });

        *foreground.lock().unwrap() = None;

        if let Some(s) = stdin.as_deref_mut() {
            if let Err(e) = s.set_nonblocking(was_blocking) {
                warn!(error = %e, "failed to restore stdin blocking mode");
            }
        }

        let mut channel = channel.lock().unwrap();
        let _ = channel.close();
        let _ = channel.wait_close();

        outcome
    }();

    state = TxState::Disposed;
    debug!(?state, "transaction disposed");
    run
}

/// The stdin/stdout/stderr/deadline event loop. Runs until both output
/// streams are at EOF, the deadline expires, or an I/O error occurs.
#[allow(clippy::too_many_arguments)]
fn drain(
    session: &Session,
    channel: &Arc<Mutex<Channel>>,
    mut stdin: Option<&mut dyn IoStream>,
    sink: &OutputSink,
    deadline: Instant,
    use_tty: bool,
    eof_sent: &AtomicBool,
    state: &mut TxState,
) -> Result<CommandStatus> {
    let mut stdin_eof = stdin.is_none();
    let mut stdout_eof = false;
    let mut stderr_eof = false;
    // Primed true so the first pass always attempts one stdin read,
    // matching a fresh poll state that hasn't yet reported readiness.
    let mut stdin_ready = true;

    loop {
        if !stdin_eof {
            if let Some(s) = stdin.as_deref_mut() {
                let always_ready = s.pollable_fd().is_none();
                if always_ready || stdin_ready {
                    forward_stdin(s, channel, &mut stdin_eof, use_tty)?;
                    if stdin_eof {
                        eof_sent.store(true, Ordering::SeqCst);
                    }
                }
            }
        }

        drain_stream(session, channel, false, sink, &mut stdout_eof)?;
        drain_stream(session, channel, true, sink, &mut stderr_eof)?;

        if stdout_eof && stderr_eof {
            *state = TxState::Draining;
            return capture_exit_status(channel, eof_sent);
        }

        if Instant::now() >= deadline {
            return Err(Error::new(ErrorKind::CommandTimeout));
        }

        let now = Instant::now();
        let remaining_ms = deadline.saturating_duration_since(now).as_millis();
        let timeout_ms = remaining_ms.min(u16::MAX as u128) as u16;

        let session_fd = session.tcp_stream().as_ref().map(|s| s.as_raw_fd());
        let stdin_fd = if stdin_eof { None } else { stdin.as_deref().and_then(|s| s.pollable_fd()) };

        let mut fds = Vec::with_capacity(2);
        let session_idx = session_fd.map(|fd| {
            fds.push(PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN));
            fds.len() - 1
        });
        let stdin_idx = stdin_fd.map(|fd| {
            fds.push(PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN));
            fds.len() - 1
        });

        if fds.is_empty() {
            // Neither descriptor is known (e.g. an in-memory stdin and a
            // session without a discoverable socket); fall back to a short
            // sleep bounded by the deadline so the loop still makes
            // progress instead of busy-spinning.
            std::thread::sleep(std::time::Duration::from_millis(timeout_ms.min(50) as u64));
            stdin_ready = true;
            continue;
        }

        poll(&mut fds, PollTimeout::from(timeout_ms))
            .map_err(|e| Error::with_source(ErrorKind::ReceiveResults, io::Error::from(e)))?;

        stdin_ready = stdin_idx
            .map(|idx| fds[idx].revents().unwrap_or_else(PollFlags::empty).contains(PollFlags::POLLIN))
            .unwrap_or(false);
        let _ = session_idx;
    }
}

fn forward_stdin(
    stdin: &mut dyn IoStream,
    channel: &Arc<Mutex<Channel>>,
    eof_flag: &mut bool,
    use_tty: bool,
) -> Result<()> {
    let mut buf = [0u8; BUF_SIZE];
    match stdin.read(&mut buf) {
        Ok(0) => {
            *eof_flag = true;
            let mut channel = channel.lock().unwrap();
            if use_tty {
                channel
                    .write_all(&[CTRL_D])
                    .map_err(|e| Error::with_source(ErrorKind::ForwardInput, e))?;
            }
            channel.send_eof().map_err(|e| Error::with_source(ErrorKind::ForwardInput, e))
        }
        Ok(n) => channel
            .lock()
            .unwrap()
            .write_all(&buf[..n])
            .map_err(|e| Error::with_source(ErrorKind::ForwardInput, e)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        Err(e) => Err(Error::with_source(ErrorKind::ForwardInput, e)),
    }
}

fn drain_stream(
    session: &Session,
    channel: &Arc<Mutex<Channel>>,
    is_err: bool,
    sink: &OutputSink,
    eof_flag: &mut bool,
) -> Result<()> {
    if *eof_flag {
        return Ok(());
    }

    let mut buf = [0u8; BUF_SIZE];
    let mut channel = channel.lock().unwrap();
    session.set_blocking(false);
    let result = if is_err { channel.stderr().read(&mut buf) } else { channel.read(&mut buf) };
    session.set_blocking(true);

    match result {
        Ok(0) => {
            if channel.eof() {
                *eof_flag = true;
            }
            Ok(())
        }
        Ok(n) => {
            sink.write(is_err, &buf[..n]).map_err(|e| Error::with_source(ErrorKind::ReceiveResults, e))?;
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        Err(e) => Err(Error::with_source(ErrorKind::ReceiveResults, e)),
    }
}

/// Sends the logical EOF if not already sent, then reads back the exit
/// status — or, if the remote died from a signal, the mapped signal
/// number with `major = EFAULT`.
fn capture_exit_status(channel: &Arc<Mutex<Channel>>, eof_sent: &AtomicBool) -> Result<CommandStatus> {
    let mut channel = channel.lock().unwrap();
    if !eof_sent.load(Ordering::SeqCst) {
        channel.send_eof().map_err(|e| Error::with_source(ErrorKind::ReceiveResults, e))?;
        eof_sent.store(true, Ordering::SeqCst);
    }
    // Best-effort: some servers never ack the close cleanly, but
    // exit_status/exit_signal are still readable once the channel reports
    // eof(), which drain() has already established.
    let _ = channel.wait_close();

    let minor = channel.exit_status().map_err(|e| Error::with_source(ErrorKind::ReceiveResults, e))?;

    if let Ok(sig) = channel.exit_signal() {
        if let Some(name) = sig.exit_signal {
            return Ok(CommandStatus { major: libc::EFAULT, minor: signal_number(&name) });
        }
    }

    Ok(CommandStatus { major: 0, minor })
}
