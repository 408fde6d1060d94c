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

//! `IoStream` gives concrete shape to the "externally defined local byte
//! source/sink" the core consumes (see the `Iostream` glossary entry): read,
//! write, non-blocking toggle, EOF query, pollable-descriptor query, and,
//! for uploads, an optional known size.

use std::{
    io::{self, Cursor, Read, Write},
    os::unix::io::{AsRawFd, RawFd},
};

/// The capabilities the transaction and SCP engines need from a local byte
/// source/sink, independent of what actually backs it (a terminal, a file,
/// an in-memory buffer).
pub trait IoStream: Read + Write {
    /// Toggles O_NONBLOCK on the underlying descriptor, if any.
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<bool>;

    /// The descriptor to multiplex on, or `None` if this stream has no
    /// descriptor of its own (e.g. an in-memory buffer) and should instead
    /// be treated as always-ready.
    fn pollable_fd(&self) -> Option<RawFd>;

    /// Whether this stream has reported end-of-file to its reader.
    fn eof(&self) -> bool;

    /// The stream's size, if known up front without reading it (used by
    /// SCP upload to decide whether the buffer-the-whole-thing fallback is
    /// needed). `None` means "drain it to find out."
    fn known_size(&self) -> Option<u64>;
}

/// An `IoStream` backed by any `Read + Write + AsRawFd` local resource
/// (stdin, stdout, stderr, an open file).
pub struct FdStream<T> {
    inner: T,
    eof: bool,
    size: Option<u64>,
}

impl<T: Read + Write + AsRawFd> FdStream<T> {
    pub fn new(inner: T) -> Self {
        FdStream { inner, eof: false, size: None }
    }

    /// Like [`FdStream::new`], but with an explicit, known size — used when
    /// wrapping a regular file whose length the caller already has (e.g.
    /// from `Metadata::len`), sparing a redundant `fstat`.
    pub fn with_known_size(inner: T, size: u64) -> Self {
        FdStream { inner, eof: false, size: Some(size) }
    }
}

impl<T: Read> Read for FdStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }
}

impl<T: Write> Write for FdStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T: Read + Write + AsRawFd> IoStream for FdStream<T> {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<bool> {
        set_fd_nonblocking(self.inner.as_raw_fd(), nonblocking)
    }

    fn pollable_fd(&self) -> Option<RawFd> {
        Some(self.inner.as_raw_fd())
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn known_size(&self) -> Option<u64> {
        self.size
    }
}

/// Toggles `O_NONBLOCK` on `fd`, returning the previous blocking state
/// (`true` if it was blocking before the call) so callers can restore it.
pub fn set_fd_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<bool> {
    // Safety: `fd` is a valid, open descriptor for the lifetime of this call;
    // fcntl with F_GETFL/F_SETFL on it is the standard way to toggle
    // O_NONBLOCK and does not retain the fd beyond the call.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let was_blocking = flags & libc::O_NONBLOCK == 0;
        let new_flags =
            if nonblocking { flags | libc::O_NONBLOCK } else { flags & !libc::O_NONBLOCK };
        if libc::fcntl(fd, libc::F_SETFL, new_flags) < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(was_blocking)
    }
}

/// An in-memory `IoStream` with no descriptor of its own: `pollable_fd`
/// always reports `None`, so the event loop treats it as always-ready. Used
/// both by callers who want to hand in a buffer directly and by tests that
/// exercise the always-ready stdin branch.
pub struct BufferStream {
    cursor: Cursor<Vec<u8>>,
    eof: bool,
    report_size: bool,
    total_len: u64,
}

impl BufferStream {
    /// Builds a buffer stream that reports its size up front (the common
    /// case: an in-memory blob you already know the length of).
    pub fn new(data: Vec<u8>) -> Self {
        let total_len = data.len() as u64;
        BufferStream { cursor: Cursor::new(data), eof: false, report_size: true, total_len }
    }

    /// Builds a buffer stream that deliberately hides its size, so upload
    /// callers are forced through the drain-to-buffer fallback of §4.5 even
    /// though this particular backing store happens to be seekable.
    pub fn new_unsized(data: Vec<u8>) -> Self {
        let total_len = data.len() as u64;
        BufferStream { cursor: Cursor::new(data), eof: false, report_size: false, total_len }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl Read for BufferStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.cursor.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }
}

impl Write for BufferStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.cursor.get_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl IoStream for BufferStream {
    fn set_nonblocking(&mut self, _nonblocking: bool) -> io::Result<bool> {
        // There's no descriptor to toggle; report "was blocking" so callers
        // restoring state on teardown have something consistent to put
        // back.
        Ok(true)
    }

    fn pollable_fd(&self) -> Option<RawFd> {
        None
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn known_size(&self) -> Option<u64> {
        self.report_size.then_some(self.total_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn buffer_stream_reads_back_its_contents() {
        let mut s = BufferStream::new(b"abc".to_vec());
        let mut out = [0u8; 8];
        let n = s.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"abc");
        assert!(!s.eof());
        assert_eq!(s.read(&mut out).unwrap(), 0);
        assert!(s.eof());
    }

    #[test]
    fn buffer_stream_has_no_pollable_fd() {
        let s = BufferStream::new(b"x".to_vec());
        assert_eq!(s.pollable_fd(), None);
        assert_eq!(s.known_size(), Some(1));
    }

    #[test]
    fn unsized_buffer_stream_hides_its_size() {
        let s = BufferStream::new_unsized(b"xyz".to_vec());
        assert_eq!(s.known_size(), None);
    }

    #[test]
    fn fd_stream_reports_known_size_and_toggles_nonblocking() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"payload").unwrap();
        let len = file.as_file().metadata().unwrap().len();
        let mut stream = FdStream::with_known_size(file.reopen().unwrap(), len);

        assert_eq!(stream.known_size(), Some(7));
        assert!(stream.pollable_fd().is_some());

        let was_blocking = stream.set_nonblocking(true).unwrap();
        assert!(was_blocking);

        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"payload");
    }
}
