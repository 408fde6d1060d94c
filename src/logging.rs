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

//! A `tracing-subscriber` install helper for embedding controllers that
//! don't already run one of their own. Setting up logging itself is out of
//! scope for the core (spec.md §1); this just saves every controller from
//! hand-rolling the same `fmt().with_max_level(...)` boilerplate.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Installs a process-wide `tracing` subscriber at a verbosity derived from
/// a `-v`-style repeat count: `0` is warnings-and-above, each further level
/// steps down to info, debug, then trace.
///
/// Returns an error if a global subscriber is already installed —
/// `init_logging` is meant to be called at most once, typically from a
/// controller's own entry point.
pub fn init_logging(verbosity: u8) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
}
