// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for specfan-runner.

/// Utilities for pluralizing various words based on count.
pub(crate) mod plural {
    /// Returns "spec" if `count` is 1, otherwise "specs".
    pub(crate) fn specs_str(count: usize) -> &'static str {
        if count == 1 { "spec" } else { "specs" }
    }

    /// Returns "worker" if `count` is 1, otherwise "workers".
    pub(crate) fn workers_str(count: usize) -> &'static str {
        if count == 1 { "worker" } else { "workers" }
    }
}

/// Removes a single trailing line ending (`\n`, `\r\n` or `\r`), if present.
pub(crate) fn chomp(s: &str) -> &str {
    if let Some(s) = s.strip_suffix("\r\n") {
        s
    } else if let Some(s) = s.strip_suffix('\n') {
        s
    } else if let Some(s) = s.strip_suffix('\r') {
        s
    } else {
        s
    }
}

/// Displays a number of seconds the way spec engines print them: whole values keep a
/// trailing `.0`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DisplaySeconds(pub(crate) f64);

impl std::fmt::Display for DisplaySeconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}
