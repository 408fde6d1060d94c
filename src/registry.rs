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

//! Backend registry and target dispatch: parses `scheme:spec`, resolves the
//! scheme to a registered [`Backend`], and binds a [`crate::Target`] to it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use once_cell::sync::Lazy;
use tracing::{debug, instrument};

use crate::{
    backend::Backend,
    error::{Error, ErrorKind, Result},
    options::Options,
    ssh::SshBackend,
};

/// Process-wide, write-once-per-scheme backend table. Populated with the
/// built-in `ssh` scheme eagerly; additional schemes can be added with
/// [`register_backend`] for the lifetime of the process — there is no
/// eviction, matching spec.md §9's "no teardown hook is specified."
static REGISTRY: Lazy<Mutex<HashMap<String, Arc<dyn Backend>>>> = Lazy::new(|| {
    let mut map: HashMap<String, Arc<dyn Backend>> = HashMap::new();
    let ssh: Arc<dyn Backend> = Arc::new(SshBackend::default());
    map.insert(ssh.name().to_string(), ssh);
    Mutex::new(map)
});

/// Registers a backend under its own name, making it reachable from a
/// target spec of the form `<name>:...`. Registering the same name twice
/// replaces the previous entry — the known-scheme set is described as
/// "extensible," and callers are expected to do this once at startup.
pub fn register_backend(backend: Arc<dyn Backend>) {
    let mut registry = REGISTRY.lock().unwrap();
    registry.insert(backend.name().to_string(), backend);
}

fn lookup_backend(scheme: &str) -> Option<Arc<dyn Backend>> {
    REGISTRY.lock().unwrap().get(scheme).cloned()
}

/// Splits `spec` into `(scheme, backend_spec)` per spec.md §4.1: the
/// substring before the first `:` is the scheme; the remainder (or the
/// empty string, if there's no `:`) is passed verbatim to the backend.
pub fn parse_spec(spec: &str) -> Result<(String, String)> {
    // Operate on an owned copy so the caller's string is never mutated by
    // parsing, per spec.md §4.1.
    let spec = spec.to_string();
    match spec.split_once(':') {
        Some((scheme, rest)) if !scheme.is_empty() => Ok((scheme.to_string(), rest.to_string())),
        Some((_, _)) => Err(Error::with_detail(ErrorKind::InvalidTargetSpec, "empty scheme")),
        None if !spec.is_empty() => Ok((spec, String::new())),
        None => Err(Error::with_detail(ErrorKind::InvalidTargetSpec, "empty scheme")),
    }
}

/// Resolves `spec`, lazily loading the named backend, and returns a bound
/// [`crate::backend::BackendTarget`] plus the scheme name it was bound
/// under (used for logging). `options` is passed through to the backend's
/// `init` unchanged.
#[instrument(skip_all, fields(spec))]
pub fn dispatch(
    spec: &str,
    options: &Options,
) -> Result<(String, Box<dyn crate::backend::BackendTarget>)> {
    let (scheme, backend_spec) = parse_spec(spec)?;
    let backend = lookup_backend(&scheme)
        .ok_or_else(|| Error::with_detail(ErrorKind::UnknownPlugin, scheme.clone()))?;

    debug!(scheme = %scheme, "initializing backend");
    let target = backend.init(&backend_spec, options)?;
    Ok((scheme, target))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_spec_splits_on_first_colon() {
        let (scheme, rest) = parse_spec("ssh:host:22").unwrap();
        assert_eq!(scheme, "ssh");
        assert_eq!(rest, "host:22");
    }

    #[test]
    fn parse_spec_defaults_to_empty_backend_spec() {
        let (scheme, rest) = parse_spec("ssh").unwrap();
        assert_eq!(scheme, "ssh");
        assert_eq!(rest, "");
    }

    #[test]
    fn parse_spec_rejects_empty_scheme() {
        let err = parse_spec(":host").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTargetSpec);
    }

    #[test]
    fn parse_spec_rejects_empty_string() {
        let err = parse_spec("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTargetSpec);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = dispatch("virtio:/dev/vport0", &Options::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownPlugin);
    }

    #[test]
    fn ssh_scheme_is_registered_by_default() {
        // `ssh:host` parses and resolves to the ssh backend even though
        // connecting to "host" will fail later, at `run_command` time, not
        // at dispatch time.
        let (scheme, _target) = dispatch("ssh:example.invalid", &Options::default()).unwrap();
        assert_eq!(scheme, "ssh");
    }
}
