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

//! The error vocabulary shared by every backend: a small, closed set of
//! named kinds plus a human-readable message, so a controller can classify
//! a failure without string matching.

use std::{fmt, io};

/// The closed set of error kinds a [`crate::Target`] operation can fail
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    Parameter,
    OpenSession,
    SendCommand,
    ForwardInput,
    ReceiveResults,
    LocalFile,
    SendFile,
    RemoteFile,
    ReceiveFile,
    Interrupt,
    InvalidTargetSpec,
    UnknownPlugin,
    IncompatiblePlugin,
    CommandTimeout,
    NotSupported,
}

impl ErrorKind {
    /// The fixed, human-readable message for this kind, as returned by
    /// [`strerror`].
    pub fn message(self) -> &'static str {
        use ErrorKind::*;
        match self {
            Parameter => "invalid parameter",
            OpenSession => "unable to open session",
            SendCommand => "unable to send command",
            ForwardInput => "error forwarding input",
            ReceiveResults => "error receiving results",
            LocalFile => "error accessing local file",
            SendFile => "error sending file",
            RemoteFile => "error on remote file",
            ReceiveFile => "error receiving file",
            Interrupt => "error sending interrupt",
            InvalidTargetSpec => "invalid target specification",
            UnknownPlugin => "unknown plugin",
            IncompatiblePlugin => "incompatible plugin",
            CommandTimeout => "command timed out",
            NotSupported => "operation not supported by this backend",
        }
    }
}

/// An error returned by a [`crate::Target`] operation.
///
/// Carries an [`ErrorKind`] for classification plus an optional source
/// error (typically an [`io::Error`] or an [`ssh2::Error`]) and, when the
/// default message isn't specific enough, a detail string.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    detail: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error { kind, detail: None, source: None }
    }

    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Error { kind, detail: Some(detail.into()), source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error { kind, detail: None, source: Some(Box::new(source)) }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.detail, &self.source) {
            (Some(detail), _) => write!(f, "{}: {}", self.kind.message(), detail),
            (None, Some(source)) => write!(f, "{}: {}", self.kind.message(), source),
            (None, None) => write!(f, "{}", self.kind.message()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::with_source(ErrorKind::ReceiveResults, err)
    }
}

impl From<ssh2::Error> for Error {
    fn from(err: ssh2::Error) -> Self {
        Error::with_source(ErrorKind::OpenSession, err)
    }
}

/// Returns the fixed message for `kind`.
pub fn strerror(kind: ErrorKind) -> &'static str {
    kind.message()
}

/// Writes `"<prefix>: <message>.\n"` to stderr, the way a controller's
/// diagnostic stream would render a failed operation.
pub fn perror(prefix: &str, err: &Error) {
    eprintln!("{}: {}.", prefix, err);
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_uses_kind_message_by_default() {
        let err = Error::new(ErrorKind::CommandTimeout);
        assert_eq!(err.to_string(), "command timed out");
    }

    #[test]
    fn display_includes_detail_when_present() {
        let err = Error::with_detail(ErrorKind::InvalidTargetSpec, "empty scheme");
        assert_eq!(err.to_string(), "invalid target specification: empty scheme");
    }

    #[test]
    fn source_roundtrips_through_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "boom");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::ReceiveResults);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn strerror_matches_kind_message() {
        assert_eq!(strerror(ErrorKind::NotSupported), "operation not supported by this backend");
    }
}
