// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracting counts and timings from spec engine output.
//!
//! Spec engines print a summary line such as `12 examples, 3 failures, 1 error, 2 pending` and a
//! timing line such as `Finished in 4.500 seconds`. The timing line is mandatory: its absence
//! usually means the spec crashed or its output was truncated. The summary line is best-effort:
//! missing counts are treated as zero, and counts too large for 64 bits saturate.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

static COUNTS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) examples?, (\d+) failures?(?:, (\d+) errors?)?(?:, (\d+) pending?)?")
        .expect("counts regex is valid")
});

static FINISHED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Finished in (\d+(?:\.\d+)?) seconds").expect("finished regex is valid")
});

/// Counts and timing reported by a single spec run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParsedCounts {
    /// The number of examples run.
    pub examples: u64,

    /// The number of failing examples.
    pub failures: u64,

    /// The number of examples that errored.
    pub errors: u64,

    /// The number of pending examples.
    pub pending: u64,

    /// The time the spec engine reported for itself, in seconds.
    pub elapsed_seconds: f64,
}

/// The reason spec output could not be parsed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseFailure {
    /// The output has no `Finished in <seconds> seconds` line.
    #[error("no timing marker (`Finished in <seconds> seconds`) in spec output")]
    NoTimingMarker,
}

/// Parses the captured standard output of one spec run.
///
/// Returns [`ParseFailure::NoTimingMarker`] if the timing line is missing. If only the summary
/// line is missing, the counts are all zero.
pub fn parse_spec_output(stdout: &str) -> Result<ParsedCounts, ParseFailure> {
    let finished = FINISHED_REGEX
        .captures(stdout)
        .ok_or(ParseFailure::NoTimingMarker)?;
    // The regex only admits digits and a single dot, which always parses (if only to infinity).
    let elapsed_seconds = finished[1].parse::<f64>().unwrap_or_default();

    let mut counts = ParsedCounts {
        elapsed_seconds,
        ..ParsedCounts::default()
    };

    match COUNTS_REGEX.captures(stdout) {
        Some(captures) => {
            let field = |index: usize, name: &str| -> u64 {
                let Some(m) = captures.get(index) else {
                    return 0;
                };
                // The regex only admits digits, so the only possible failure is overflow.
                m.as_str().parse().unwrap_or_else(|_| {
                    warn!("{name} count `{}` is out of range, using {}", m.as_str(), u64::MAX);
                    u64::MAX
                })
            };
            counts.examples = field(1, "examples");
            counts.failures = field(2, "failures");
            counts.errors = field(3, "errors");
            counts.pending = field(4, "pending");
        }
        None => {
            debug!("spec output has a timing marker but no example counts");
        }
    }

    Ok(counts)
}
