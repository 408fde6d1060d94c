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

//! The SSH session factory (spec §4.3): a per-target template of connection
//! options, and `open_session`, which clones it into a connected,
//! authenticated [`ssh2::Session`] for one transaction.

use std::net::TcpStream;

use ssh2::Session;
use tracing::instrument;

use crate::{
    consts::{DEFAULT_PORT, DEFAULT_USER},
    error::{Error, ErrorKind, Result},
    options::Options,
};

/// The immutable per-target connection template created at `init` time from
/// the backend-spec string `HOST[:PORT]`.
#[derive(Debug, Clone)]
pub struct SessionTemplate {
    pub host: String,
    pub port: u16,
    pub options: Options,
}

impl SessionTemplate {
    /// Parses `HOST[:PORT]` with the default [`Options`]. See
    /// [`SessionTemplate::parse_with_options`] to override them.
    pub fn parse(backend_spec: &str) -> Result<Self> {
        Self::parse_with_options(backend_spec, Options::default())
    }

    /// Parses `HOST[:PORT]`, with `HOST` optionally in bracketed IPv6 form
    /// (`[::1]`). The rightmost `:` outside of a bracketed host separates
    /// host from port; port must parse as a decimal strictly less than
    /// 65535 (spec.md's open question: preserve the strict inequality as
    /// found, rather than accepting the full `u16` range).
    pub fn parse_with_options(backend_spec: &str, options: Options) -> Result<Self> {
        if backend_spec.is_empty() {
            return Err(Error::with_detail(ErrorKind::InvalidTargetSpec, "empty host"));
        }

        let (host, port) = if let Some(rest) = backend_spec.strip_prefix('[') {
            let (addr, after) = rest.split_once(']').ok_or_else(|| {
                Error::with_detail(ErrorKind::InvalidTargetSpec, "unterminated bracketed host")
            })?;
            let port = match after.strip_prefix(':') {
                Some(port_str) => parse_port(port_str)?,
                None if after.is_empty() => DEFAULT_PORT,
                None => {
                    return Err(Error::with_detail(
                        ErrorKind::InvalidTargetSpec,
                        "trailing characters after bracketed host",
                    ))
                }
            };
            (addr.to_string(), port)
        } else {
            match backend_spec.rsplit_once(':') {
                Some((host, port_str)) => (host.to_string(), parse_port(port_str)?),
                None => (backend_spec.to_string(), DEFAULT_PORT),
            }
        };

        if host.is_empty() {
            return Err(Error::with_detail(ErrorKind::InvalidTargetSpec, "empty host"));
        }

        Ok(SessionTemplate { host, port, options })
    }
}

fn parse_port(port_str: &str) -> Result<u16> {
    let port: u32 = port_str
        .parse()
        .map_err(|_| Error::with_detail(ErrorKind::InvalidTargetSpec, "port is not numeric"))?;
    // Strictly `< 65535`, not `<= 65535`: preserved verbatim per the open
    // question in spec.md §9.
    if port == 0 || port >= 65535 {
        return Err(Error::with_detail(ErrorKind::InvalidTargetSpec, "port out of range"));
    }
    Ok(port as u16)
}

/// Connects and authenticates a fresh session from `template`, as `user`
/// (defaulting to [`DEFAULT_USER`] if `None`), by public key with no
/// passphrase. Key material is located by libssh2 from the user's standard
/// locations; this is not reconfigured here.
#[instrument(skip(template), fields(host = %template.host, port = template.port))]
pub fn open_session(template: &SessionTemplate, user: Option<&str>) -> Result<Session> {
    let user = user.unwrap_or(DEFAULT_USER);

    let addr = format!("{}:{}", template.host, template.port);
    let tcp = TcpStream::connect(&addr).map_err(|e| Error::with_source(ErrorKind::OpenSession, e))?;
    tcp.set_nodelay(true).ok();

    let mut session =
        Session::new().map_err(|e| Error::with_source(ErrorKind::OpenSession, e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(template.options.connect_timeout().as_millis() as u32);
    session.handshake().map_err(|e| Error::with_source(ErrorKind::OpenSession, e))?;

    let key_path = template.options.key_path().cloned().unwrap_or_else(default_key_path);
    session
        .userauth_agent(user)
        .or_else(|_| session.userauth_pubkey_file(user, None, key_path.as_path(), None))
        .map_err(|e| Error::with_source(ErrorKind::OpenSession, e))?;

    if !session.authenticated() {
        return Err(Error::with_detail(ErrorKind::OpenSession, "authentication failed"));
    }

    Ok(session)
}

fn default_key_path() -> std::path::PathBuf {
    let home = std::env::var_os("HOME").map(std::path::PathBuf::from).unwrap_or_default();
    home.join(".ssh").join("id_rsa")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_bare_host() {
        let t = SessionTemplate::parse("example.com").unwrap();
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, 22);
    }

    #[test]
    fn parses_host_with_port() {
        let t = SessionTemplate::parse("example.com:2222").unwrap();
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, 2222);
    }

    #[test]
    fn parses_bracketed_ipv6_host() {
        let t = SessionTemplate::parse("[::1]:2222").unwrap();
        assert_eq!(t.host, "::1");
        assert_eq!(t.port, 2222);
    }

    #[test]
    fn bracketed_ipv6_host_defaults_port() {
        let t = SessionTemplate::parse("[::1]").unwrap();
        assert_eq!(t.host, "::1");
        assert_eq!(t.port, 22);
    }

    #[test]
    fn rejects_port_65535() {
        let err = SessionTemplate::parse("host:65535").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTargetSpec);
    }

    #[test]
    fn accepts_port_65534() {
        let t = SessionTemplate::parse("host:65534").unwrap();
        assert_eq!(t.port, 65534);
    }

    #[test]
    fn rejects_empty_host() {
        assert!(SessionTemplate::parse("").is_err());
        assert!(SessionTemplate::parse(":2222").is_err());
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(SessionTemplate::parse("host:abc").is_err());
    }
}
