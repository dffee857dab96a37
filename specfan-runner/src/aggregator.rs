// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run-wide accumulator of spec results.
//!
//! There is exactly one [`Aggregator`] per run, living in the coordinator process. Workers reach
//! it through a [`RemoteHandle`](crate::remote::RemoteHandle); everything else in the coordinator
//! holds it directly.

use crate::{
    errors::DeliveryError,
    helpers::chomp,
    parse::{ParsedCounts, parse_spec_output},
    report::RenderedReport,
    time::RunTimes,
    worker::ResultSink,
};
use specfan_metadata::SpecResult;
use std::{
    collections::HashSet,
    io::{self, Write},
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};
use tracing::{debug, warn};

/// Totals accumulated over every spec result received so far.
///
/// `examples >= failures + errors + pending` is *not* guaranteed: counts are trusted as reported
/// by each worker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunTotals {
    /// Total examples run.
    pub examples: u64,

    /// Total failing examples.
    pub failures: u64,

    /// Total examples that errored.
    pub errors: u64,

    /// Total pending examples.
    pub pending: u64,

    /// The sum of the time each spec reported for itself. This is distinct from the wall-clock
    /// time of the run.
    pub cumulative_reported_seconds: f64,

    /// Every non-empty stderr chunk received, each terminated by a newline, in arrival order.
    pub captured_stderr: String,

    /// The number of spec results folded in.
    pub specs_reported: usize,

    /// The number of spec results whose output couldn't be parsed.
    pub unparsed_specs: usize,

    /// The number of workers that exited without delivering a result.
    pub lost_workers: usize,
}

impl RunTotals {
    /// Returns true if any failures or errors were reported.
    pub fn has_failures(&self) -> bool {
        self.failures != 0 || self.errors != 0
    }

    fn fold(&mut self, counts: &ParsedCounts) {
        self.examples = self.examples.saturating_add(counts.examples);
        self.failures = self.failures.saturating_add(counts.failures);
        self.errors = self.errors.saturating_add(counts.errors);
        self.pending = self.pending.saturating_add(counts.pending);
        self.cumulative_reported_seconds += counts.elapsed_seconds;
    }

    fn append_stderr(&mut self, text: &str) {
        let text = chomp(text);
        if !text.is_empty() {
            self.captured_stderr.push_str(text);
            self.captured_stderr.push('\n');
        }
    }
}

/// Where the aggregator echoes each spec's output as it arrives.
#[derive(Debug, Default)]
pub enum LiveOutput {
    /// Write to the process's standard output.
    #[default]
    Stdout,

    /// Collect into a buffer, retrievable with [`Aggregator::live_output`].
    Buffer(String),

    /// Don't echo output.
    Discard,
}

impl LiveOutput {
    fn emit(&mut self, spec: &str, stdout: &str) -> io::Result<()> {
        let mut text = format!("\nRunning {spec}.\n{stdout}");
        if !stdout.ends_with('\n') {
            text.push('\n');
        }

        match self {
            Self::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()
            }
            Self::Buffer(buf) => {
                buf.push_str(&text);
                Ok(())
            }
            Self::Discard => Ok(()),
        }
    }
}

/// A concurrency-safe accumulator of spec results.
///
/// All updates made by one [`add`](Self::add) call happen under a single lock, including
/// echoing the spec's output. This keeps both the totals and the interleaved output of
/// concurrent workers coherent.
#[derive(Debug)]
pub struct Aggregator {
    inner: Mutex<AggregatorInner>,
    run_times: OnceLock<RunTimes>,
}

#[derive(Debug)]
struct AggregatorInner {
    totals: RunTotals,
    output: LiveOutput,
    deliveries: HashSet<u64>,
}

impl Aggregator {
    /// Creates a new aggregator that echoes spec output to `output`.
    pub fn new(output: LiveOutput) -> Self {
        Self {
            inner: Mutex::new(AggregatorInner {
                totals: RunTotals::default(),
                output,
                deliveries: HashSet::new(),
            }),
            run_times: OnceLock::new(),
        }
    }

    /// Folds a spec result into the totals.
    ///
    /// The spec's stdout is echoed first, then parsed and folded. If the output can't be parsed,
    /// zero counts are folded and a note is appended to the captured stderr. Finally, the spec's
    /// own stderr is appended.
    pub fn add(&self, result: SpecResult) {
        self.lock().fold(result);
    }

    /// Folds a spec result into the totals, unless a result with the same delivery ID was already
    /// folded.
    ///
    /// Returns true if the result was folded. Workers retry deliveries whose acknowledgement was
    /// lost, so the same delivery may arrive more than once.
    pub fn add_delivery(&self, delivery_id: u64, result: SpecResult) -> bool {
        let mut inner = self.lock();
        if !inner.deliveries.insert(delivery_id) {
            debug!(
                delivery_id,
                spec = %result.id,
                "ignoring duplicate delivery"
            );
            return false;
        }
        inner.fold(result);
        true
    }

    /// Records that a worker exited without delivering a result.
    ///
    /// This is only available to the coordinator.
    pub fn record_lost_worker(&self, spec: &str, reason: &str) {
        let mut inner = self.lock();
        inner.totals.lost_workers += 1;
        inner.totals.append_stderr(&format!("{spec}: {reason}"));
    }

    /// Sets the times measured across the whole run.
    ///
    /// This may only be called once; later calls are ignored.
    pub fn set_run_times(&self, times: RunTimes) {
        if self.run_times.set(times).is_err() {
            warn!("run times were already set, ignoring {times:?}");
        }
    }

    /// Renders the final report.
    ///
    /// This is not synchronized against [`add`](Self::add) beyond a consistent snapshot: callers
    /// must ensure every worker has finished first.
    pub fn report(&self) -> RenderedReport {
        let totals = self.lock().totals.clone();
        let times = self.run_times.get().copied().unwrap_or_default();
        RenderedReport::new(totals, times)
    }

    /// Returns the echoed output, if this aggregator was created with [`LiveOutput::Buffer`].
    pub fn live_output(&self) -> Option<String> {
        match &self.lock().output {
            LiveOutput::Buffer(buf) => Some(buf.clone()),
            LiveOutput::Stdout | LiveOutput::Discard => None,
        }
    }

    /// Holds the lock for `duration`, signalling `locked` once it is taken.
    #[cfg(test)]
    pub(crate) fn hold_lock(
        &self,
        locked: tokio::sync::oneshot::Sender<()>,
        duration: std::time::Duration,
    ) {
        let _guard = self.lock();
        _ = locked.send(());
        std::thread::sleep(duration);
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorInner> {
        // Totals are only updated after the echo, so a panic mid-echo leaves them consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AggregatorInner {
    fn fold(&mut self, result: SpecResult) {
        if let Err(err) = self.output.emit(&result.id, &result.stdout) {
            warn!("failed to echo output for `{}`: {err}", result.id);
        }

        match parse_spec_output(&result.stdout) {
            Ok(counts) => self.totals.fold(&counts),
            Err(failure) => {
                debug!(spec = %result.id, "unparsable spec output: {failure}");
                self.totals.unparsed_specs += 1;
                self.totals
                    .append_stderr(&format!("{}: {failure}", result.id));
            }
        }

        self.totals.append_stderr(&result.stderr);
        self.totals.specs_reported += 1;
    }
}

impl ResultSink for Aggregator {
    fn deliver(&self, delivery_id: u64, result: &SpecResult) -> Result<(), DeliveryError> {
        self.add_delivery(delivery_id, result.clone());
        Ok(())
    }
}
