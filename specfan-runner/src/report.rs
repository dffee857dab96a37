// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The consolidated report produced at the end of a run.

use crate::{
    aggregator::RunTotals,
    helpers::{DisplaySeconds, plural},
    time::RunTimes,
};
use std::{fmt, io};

/// The ANSI escape that resets colors.
pub const ANSI_RESET: &str = "\x1b[0m";

/// The overall outcome of a run, as a color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// At least one failure or error was reported.
    Red,

    /// No failures or errors, but at least one pending example.
    Yellow,

    /// Everything passed.
    Green,
}

impl Classification {
    /// Classifies a set of totals.
    pub fn from_totals(totals: &RunTotals) -> Self {
        if totals.has_failures() {
            Self::Red
        } else if totals.pending != 0 {
            Self::Yellow
        } else {
            Self::Green
        }
    }

    /// Returns the ANSI escape that switches to this color.
    pub fn ansi_escape(self) -> &'static str {
        match self {
            Self::Red => "\x1b[31m",
            Self::Yellow => "\x1b[33m",
            Self::Green => "\x1b[32m",
        }
    }

    /// Returns true if the run should be considered failed.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Red)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Yellow => write!(f, "yellow"),
            Self::Green => write!(f, "green"),
        }
    }
}

/// Options controlling how a [`RenderedReport`] is written.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReportOptions {
    /// Wrap the summary in ANSI color escapes.
    pub colorize: bool,

    /// Also print CPU times, if known.
    pub verbose: bool,
}

/// The final report for a run.
#[derive(Clone, Debug)]
pub struct RenderedReport {
    totals: RunTotals,
    classification: Classification,
    times: RunTimes,
}

impl RenderedReport {
    pub(crate) fn new(totals: RunTotals, times: RunTimes) -> Self {
        let classification = Classification::from_totals(&totals);
        Self {
            totals,
            classification,
            times,
        }
    }

    /// Returns the totals accumulated over the run.
    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    /// Returns the color classification of the run.
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Returns the times measured by the coordinator.
    pub fn times(&self) -> &RunTimes {
        &self.times
    }

    /// Returns the one-line count summary, e.g.
    /// `12 examples, 3 failures, 1 errors, 2 pending, suite run in 4.500 seconds`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} examples, {} failures, {} errors, {} pending, suite run in {:.3} seconds",
            self.totals.examples,
            self.totals.failures,
            self.totals.errors,
            self.totals.pending,
            self.times.real.as_secs_f64(),
        )
    }

    /// Writes the report to `writer`.
    pub fn write_to(&self, writer: &mut dyn io::Write, options: ReportOptions) -> io::Result<()> {
        // Captured stderr is a run of complete lines; when empty it still occupies one blank line.
        if self.totals.captured_stderr.is_empty() {
            writeln!(writer)?;
        } else {
            writer.write_all(self.totals.captured_stderr.as_bytes())?;
        }
        writeln!(writer)?;

        if options.colorize {
            write!(writer, "{}", self.classification.ansi_escape())?;
        }
        writeln!(
            writer,
            "Total actual time: {}",
            DisplaySeconds(self.totals.cumulative_reported_seconds)
        )?;
        writeln!(writer, "{}", self.summary_line())?;
        if options.colorize {
            write!(writer, "{ANSI_RESET}")?;
        }

        if self.totals.unparsed_specs > 0 {
            writeln!(
                writer,
                "warning: {} {} produced output without a timing marker",
                self.totals.unparsed_specs,
                plural::specs_str(self.totals.unparsed_specs),
            )?;
        }
        if self.totals.lost_workers > 0 {
            writeln!(
                writer,
                "warning: {} {} exited without delivering results",
                self.totals.lost_workers,
                plural::workers_str(self.totals.lost_workers),
            )?;
        }
        if options.verbose {
            if let (Some(user), Some(system)) = (self.times.user, self.times.system) {
                writeln!(
                    writer,
                    "cpu time: {:.3}s user, {:.3}s system",
                    user.as_secs_f64(),
                    system.as_secs_f64(),
                )?;
            }
        }

        writer.flush()
    }

    /// Renders the report to a string.
    pub fn render(&self, options: ReportOptions) -> String {
        let mut buf = Vec::new();
        self.write_to(&mut buf, options)
            .expect("writing to a Vec is infallible");
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use test_case::test_case;

    fn totals(failures: u64, errors: u64, pending: u64) -> RunTotals {
        RunTotals {
            examples: 10,
            failures,
            errors,
            pending,
            ..RunTotals::default()
        }
    }

    #[test_case(totals(1, 0, 0), Classification::Red ; "failure is red")]
    #[test_case(totals(0, 2, 0), Classification::Red ; "error is red")]
    #[test_case(totals(1, 0, 3), Classification::Red ; "failure beats pending")]
    #[test_case(totals(0, 0, 3), Classification::Yellow ; "pending is yellow")]
    #[test_case(totals(0, 0, 0), Classification::Green ; "all zero is green")]
    fn classify(totals: RunTotals, expected: Classification) {
        assert_eq!(Classification::from_totals(&totals), expected);
    }

    #[test]
    fn render_colored() {
        let report = RenderedReport::new(
            RunTotals {
                examples: 12,
                failures: 3,
                errors: 1,
                pending: 2,
                cumulative_reported_seconds: 4.5,
                captured_stderr: "warning: deprecated\n".to_owned(),
                ..RunTotals::default()
            },
            RunTimes::from_real(Duration::from_millis(2250)),
        );

        assert_eq!(
            report.render(ReportOptions {
                colorize: true,
                verbose: false,
            }),
            "warning: deprecated\n\n\
             \x1b[31mTotal actual time: 4.5\n\
             12 examples, 3 failures, 1 errors, 2 pending, suite run in 2.250 seconds\n\
             \x1b[0m"
        );
    }

    #[test]
    fn render_whole_seconds_without_stderr() {
        let report = RenderedReport::new(
            RunTotals {
                examples: 4,
                cumulative_reported_seconds: 3.0,
                ..RunTotals::default()
            },
            RunTimes::from_real(Duration::from_millis(500)),
        );

        assert_eq!(
            report.render(ReportOptions {
                colorize: true,
                verbose: false,
            }),
            "\n\n\x1b[32mTotal actual time: 3.0\n\
             4 examples, 0 failures, 0 errors, 0 pending, suite run in 0.500 seconds\n\
             \x1b[0m"
        );
    }

    #[test]
    fn render_plain_with_warnings() {
        let report = RenderedReport::new(
            RunTotals {
                examples: 5,
                unparsed_specs: 1,
                lost_workers: 2,
                ..RunTotals::default()
            },
            RunTimes {
                real: Duration::from_secs(1),
                user: Some(Duration::from_millis(500)),
                system: Some(Duration::from_millis(125)),
            },
        );

        assert_eq!(
            report.render(ReportOptions {
                colorize: false,
                verbose: true,
            }),
            indoc! {"


                Total actual time: 0.0
                5 examples, 0 failures, 0 errors, 0 pending, suite run in 1.000 seconds
                warning: 1 spec produced output without a timing marker
                warning: 2 workers exited without delivering results
                cpu time: 0.500s user, 0.125s system
            "}
        );
        assert_eq!(report.classification(), Classification::Green);
    }
}
