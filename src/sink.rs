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

//! The controller-side destination for remote stdout/stderr bytes, plus the
//! SCP progress dots.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

/// A growable, capacity-bounded byte sink. Writes beyond capacity are
/// silently truncated: the first byte that would exceed `cap` is dropped,
/// and so is every byte after it.
#[derive(Clone)]
pub struct BoundedBuf {
    inner: Arc<Mutex<Vec<u8>>>,
    cap: usize,
}

impl BoundedBuf {
    pub fn new(cap: usize) -> Self {
        BoundedBuf { inner: Arc::new(Mutex::new(Vec::new())), cap }
    }

    /// Appends as much of `bytes` as still fits under `cap`. Returns the
    /// number of bytes actually stored.
    fn append(&self, bytes: &[u8]) -> usize {
        let mut buf = self.inner.lock().unwrap();
        let room = self.cap.saturating_sub(buf.len());
        let take = room.min(bytes.len());
        buf.extend_from_slice(&bytes[..take]);
        take
    }

    /// A snapshot of the bytes stored so far.
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where remote stdout/stderr bytes (and SCP progress) go.
#[derive(Clone)]
pub enum SinkMode {
    /// Bytes are dropped on the floor.
    Discard,
    /// Bytes are written straight to the local terminal (stdout for
    /// command stdout, stderr for command stderr).
    Terminal,
    /// Stdout and stderr both append to one shared buffer.
    Single(BoundedBuf),
    /// Stdout and stderr append to separate buffers.
    Split { out: BoundedBuf, err: BoundedBuf },
}

/// The sink handed to a [`crate::Transaction`] or SCP transfer. Value-typed
/// and cheap to clone: buffer modes share the underlying buffer via `Arc`.
#[derive(Clone)]
pub struct OutputSink {
    mode: SinkMode,
}

impl OutputSink {
    /// Builds a sink for `mode`, falling back to [`SinkMode::Discard`] if a
    /// buffer mode is requested but its buffers are absent — callers should
    /// prefer constructing `SinkMode` directly, this exists for parity with
    /// the C-style `sink_init(mode, outbuf, errbuf, size)` contract.
    pub fn new(mode: SinkMode) -> Self {
        OutputSink { mode }
    }

    pub fn discard() -> Self {
        OutputSink { mode: SinkMode::Discard }
    }

    pub fn terminal() -> Self {
        OutputSink { mode: SinkMode::Terminal }
    }

    pub fn single_buffer(cap: usize) -> Self {
        OutputSink { mode: SinkMode::Single(BoundedBuf::new(cap)) }
    }

    pub fn split_buffer(cap: usize) -> Self {
        OutputSink {
            mode: SinkMode::Split { out: BoundedBuf::new(cap), err: BoundedBuf::new(cap) },
        }
    }

    /// Writes `bytes` as either stdout (`is_err = false`) or stderr
    /// (`is_err = true`). Returns the count actually stored, or an error if
    /// an individual terminal write syscall failed.
    pub fn write(&self, is_err: bool, bytes: &[u8]) -> io::Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        match &self.mode {
            SinkMode::Discard => Ok(bytes.len()),
            SinkMode::Terminal => {
                let mut n = 0;
                if is_err {
                    let mut stderr = io::stderr().lock();
                    for &b in bytes {
                        stderr.write_all(&[b])?;
                        n += 1;
                    }
                } else {
                    let mut stdout = io::stdout().lock();
                    for &b in bytes {
                        stdout.write_all(&[b])?;
                        n += 1;
                    }
                }
                Ok(n)
            }
            SinkMode::Single(buf) => Ok(buf.append(bytes)),
            SinkMode::Split { out, err } => {
                let buf = if is_err { err } else { out };
                Ok(buf.append(bytes))
            }
        }
    }

    /// Emits a single `.` progress byte for an in-flight SCP chunk.
    pub fn progress_dot(&self) -> io::Result<()> {
        self.write(false, b".").map(|_| ())
    }

    /// Emits the trailing newline after an SCP transfer completes.
    pub fn progress_done(&self) -> io::Result<()> {
        self.write(false, b"\n").map(|_| ())
    }

    pub fn stdout_buf(&self) -> Option<BoundedBuf> {
        match &self.mode {
            SinkMode::Single(b) => Some(b.clone()),
            SinkMode::Split { out, .. } => Some(out.clone()),
            _ => None,
        }
    }

    pub fn stderr_buf(&self) -> Option<BoundedBuf> {
        match &self.mode {
            SinkMode::Single(b) => Some(b.clone()),
            SinkMode::Split { err, .. } => Some(err.clone()),
            _ => None,
        }
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        OutputSink::discard()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_buffer_merges_stdout_and_stderr() {
        let sink = OutputSink::single_buffer(1024);
        sink.write(false, b"out").unwrap();
        sink.write(true, b"err").unwrap();
        assert_eq!(sink.stdout_buf().unwrap().snapshot(), b"outerr");
    }

    #[test]
    fn split_buffer_keeps_streams_separate() {
        let sink = OutputSink::split_buffer(1024);
        sink.write(false, b"out").unwrap();
        sink.write(true, b"err").unwrap();
        assert_eq!(sink.stdout_buf().unwrap().snapshot(), b"out");
        assert_eq!(sink.stderr_buf().unwrap().snapshot(), b"err");
    }

    #[test]
    fn buffer_truncates_silently_at_capacity() {
        let sink = OutputSink::single_buffer(4);
        let n = sink.write(false, b"abcdefgh").unwrap();
        assert_eq!(n, 4);
        assert_eq!(sink.stdout_buf().unwrap().snapshot(), b"abcd");
    }

    #[test]
    fn writes_spanning_the_boundary_drop_the_remainder() {
        let sink = OutputSink::single_buffer(4);
        assert_eq!(sink.write(false, b"ab").unwrap(), 2);
        assert_eq!(sink.write(false, b"cdef").unwrap(), 2);
        assert_eq!(sink.stdout_buf().unwrap().snapshot(), b"abcd");
    }

    #[test]
    fn discard_reports_full_count_and_keeps_nothing() {
        let sink = OutputSink::discard();
        assert_eq!(sink.write(false, b"abc").unwrap(), 3);
        assert!(sink.stdout_buf().is_none());
    }
}
