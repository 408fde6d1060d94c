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

//! Maps the SSH exit-signal name (`"TERM"`, `"INT"`, …) to its POSIX signal
//! number on this host, per spec.md §4.4's "Signal mapping."

/// Returns the POSIX signal number for `name` (without the `SIG` prefix),
/// or `-1` for a name this table doesn't recognize.
pub fn signal_number(name: &str) -> i32 {
    match name {
        "HUP" => libc::SIGHUP,
        "INT" => libc::SIGINT,
        "QUIT" => libc::SIGQUIT,
        "ILL" => libc::SIGILL,
        "TRAP" => libc::SIGTRAP,
        "ABRT" => libc::SIGABRT,
        "BUS" => libc::SIGBUS,
        "FPE" => libc::SIGFPE,
        "KILL" => libc::SIGKILL,
        "USR1" => libc::SIGUSR1,
        "SEGV" => libc::SIGSEGV,
        "USR2" => libc::SIGUSR2,
        "PIPE" => libc::SIGPIPE,
        "ALRM" => libc::SIGALRM,
        "TERM" => libc::SIGTERM,
        "CHLD" => libc::SIGCHLD,
        "CONT" => libc::SIGCONT,
        "STOP" => libc::SIGSTOP,
        "TSTP" => libc::SIGTSTP,
        "TTIN" => libc::SIGTTIN,
        "TTOU" => libc::SIGTTOU,
        "XCPU" => libc::SIGXCPU,
        "XFSZ" => libc::SIGXFSZ,
        "VTALRM" => libc::SIGVTALRM,
        "PROF" => libc::SIGPROF,
        "WINCH" => libc::SIGWINCH,
        "SYS" => libc::SIGSYS,
        _ => -1,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn maps_known_signal_names() {
        assert_eq!(signal_number("TERM"), libc::SIGTERM);
        assert_eq!(signal_number("KILL"), libc::SIGKILL);
        assert_eq!(signal_number("INT"), libc::SIGINT);
    }

    #[test]
    fn unknown_signal_name_maps_to_negative_one() {
        assert_eq!(signal_number("BOGUS"), -1);
    }
}
