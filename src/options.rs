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

//! Process-wide knobs the core itself needs (connect timeout, key path
//! override) — deliberately not a config-file layer; loading configuration
//! from disk is the controller's job (spec.md §1's "Out of scope").

use std::{path::PathBuf, time::Duration};

use crate::consts::DEFAULT_CONNECT_TIMEOUT;

/// Connection-level overrides applied by the SSH session factory. Built
/// with the default values unless explicitly overridden.
#[derive(Debug, Clone)]
pub struct Options {
    connect_timeout: Duration,
    key_path: Option<PathBuf>,
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn key_path(&self) -> Option<&PathBuf> {
        self.key_path.as_ref()
    }
}

impl Default for Options {
    fn default() -> Self {
        Options { connect_timeout: DEFAULT_CONNECT_TIMEOUT, key_path: None }
    }
}

#[derive(Debug, Default)]
pub struct OptionsBuilder {
    connect_timeout: Option<Duration>,
    key_path: Option<PathBuf>,
}

impl OptionsBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn build(self) -> Options {
        Options {
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            key_path: self.key_path,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_options_use_default_connect_timeout() {
        let opts = Options::default();
        assert_eq!(opts.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert!(opts.key_path().is_none());
    }

    #[test]
    fn builder_overrides_apply() {
        let opts = Options::builder()
            .connect_timeout(Duration::from_secs(5))
            .key_path("/home/test/.ssh/id_ed25519")
            .build();
        assert_eq!(opts.connect_timeout(), Duration::from_secs(5));
        assert_eq!(opts.key_path().unwrap(), &PathBuf::from("/home/test/.ssh/id_ed25519"));
    }
}
