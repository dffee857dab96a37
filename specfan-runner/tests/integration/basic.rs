// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use specfan_runner::{
    aggregator::LiveOutput,
    config::{MaxWorkers, RetryPolicy},
    errors::LaunchError,
    executor::SpecOutput,
    list::{SpecId, SpecList},
    report::{Classification, ReportOptions},
    runner::{InProcessLauncher, SpecRunnerBuilder, WorkerExit, WorkerLauncher, run_all},
};
use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};
use test_case::test_case;

#[test_case(MaxWorkers::Unbounded ; "unbounded")]
#[test_case(MaxWorkers::Count(1) ; "one at a time")]
#[test_case(MaxWorkers::Count(2) ; "two at a time")]
fn three_specs_end_to_end(max_workers: MaxWorkers) -> Result<()> {
    test_init();

    let spec_list = three_spec_list();
    let mut builder = SpecRunnerBuilder::default();
    builder
        .set_max_workers(max_workers)
        .set_live_output(LiveOutput::Buffer(String::new()));
    let runner = builder.build(
        &spec_list,
        InProcessLauncher::new(canned_output, RetryPolicy::default()),
    )?;
    let aggregator = runner.aggregator().clone();
    let report = runner.execute()?;

    let totals = report.totals();
    assert_eq!(totals.examples, 7, "only parsable specs contribute examples");
    assert_eq!(totals.failures, 2);
    assert_eq!(totals.errors, 0);
    assert_eq!(totals.pending, 0);
    assert_eq!(totals.cumulative_reported_seconds, 1.75);
    assert_eq!(totals.specs_reported, 3);
    assert_eq!(totals.unparsed_specs, 1);
    assert_eq!(totals.lost_workers, 0);
    assert_eq!(report.classification(), Classification::Red);

    // Arrival order isn't deterministic, so compare the stderr chunks as a set.
    let mut stderr_lines: Vec<_> = totals.captured_stderr.lines().collect();
    stderr_lines.sort_unstable();
    assert_eq!(
        stderr_lines,
        [
            "DEPRECATION: old matcher",
            "boom",
            "spec/crashed_spec.rb: no timing marker (`Finished in <seconds> seconds`) in spec output",
        ]
    );
    ensure!(
        totals
            .captured_stderr
            .contains("spec/crashed_spec.rb: no timing marker (`Finished in <seconds> seconds`) in spec output\nboom\n"),
        "a spec's parse note is immediately followed by its own stderr"
    );

    let live_output = aggregator.live_output().expect("output was buffered");
    for spec in spec_list.iter_specs() {
        ensure!(
            live_output.contains(&format!("\nRunning {spec}.\n")),
            "live output contains header for {spec}"
        );
    }
    ensure!(live_output.contains(FAILING_STDOUT), "spec output is echoed verbatim");

    ensure!(report.times().real > Duration::ZERO, "wall-clock time was measured");
    let rendered = report.render(ReportOptions {
        colorize: true,
        verbose: false,
    });
    ensure!(
        rendered.contains("\x1b[31mTotal actual time: 1.75\n7 examples, 2 failures, 0 errors, 0 pending, suite run in "),
        "rendered report is red: {rendered}"
    );
    ensure!(
        rendered.contains(" seconds\n\x1b[0mwarning: 1 spec produced output without a timing marker\n"),
        "color is reset right after the summary line, before any warnings: {rendered}"
    );

    Ok(())
}

#[test]
fn run_all_folds_every_spec() -> Result<()> {
    test_init();

    let report = run_all(&three_spec_list(), canned_output)?;

    let totals = report.totals();
    assert_eq!(totals.examples, 7);
    assert_eq!(totals.failures, 2);
    assert_eq!(totals.specs_reported, 3);
    assert_eq!(totals.unparsed_specs, 1);
    assert_eq!(totals.lost_workers, 0);
    assert_eq!(report.classification(), Classification::Red);

    Ok(())
}

#[test]
fn groups_run_one_after_another() -> Result<()> {
    test_init();

    let started = Arc::new(Mutex::new(Vec::new()));
    let executor = {
        let started = started.clone();
        move |spec: &SpecId| {
            started
                .lock()
                .expect("lock not poisoned")
                .push(spec.as_str().to_owned());
            thread::sleep(Duration::from_millis(20));
            SpecOutput {
                stdout: "1 example, 0 failures\nFinished in 0.02 seconds\n".to_owned(),
                stderr: String::new(),
            }
        }
    };

    let spec_list = SpecList::from_groups([
        group("first/*", &["first/a", "first/b", "first/c"]),
        group("second/*", &["second/a", "second/b"]),
    ]);
    let mut builder = SpecRunnerBuilder::default();
    builder.set_live_output(LiveOutput::Discard);
    let report = builder
        .build(
            &spec_list,
            InProcessLauncher::new(executor, RetryPolicy::default()),
        )?
        .execute()?;

    assert_eq!(report.totals().examples, 5);
    assert_eq!(report.classification(), Classification::Green);

    let started = started.lock().expect("lock not poisoned");
    let first_second = started
        .iter()
        .position(|spec| spec.starts_with("second/"))
        .expect("second group ran");
    ensure!(
        started[..first_second]
            .iter()
            .all(|spec| spec.starts_with("first/"))
            && first_second == 3,
        "every spec in the first group started before the second group: {started:?}"
    );
    Ok(())
}

#[test]
fn max_workers_bounds_concurrency() -> Result<()> {
    test_init();

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let executor = {
        let running = running.clone();
        let peak = peak.clone();
        move |_: &SpecId| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(25));
            running.fetch_sub(1, Ordering::SeqCst);
            SpecOutput {
                stdout: "1 example, 0 failures, 0 errors, 1 pending\nFinished in 0.025 seconds\n"
                    .to_owned(),
                stderr: String::new(),
            }
        }
    };

    let specs: Vec<String> = (0..8).map(|n| format!("spec/{n}_spec.rb")).collect();
    let specs: Vec<&str> = specs.iter().map(String::as_str).collect();
    let spec_list = SpecList::from_groups([group("spec/*_spec.rb", &specs)]);

    let mut builder = SpecRunnerBuilder::default();
    builder
        .set_max_workers(MaxWorkers::Count(2))
        .set_live_output(LiveOutput::Discard);
    let report = builder
        .build(
            &spec_list,
            InProcessLauncher::new(executor, RetryPolicy::default()),
        )?
        .execute()?;

    assert_eq!(report.totals().specs_reported, 8);
    assert_eq!(report.totals().pending, 8);
    assert_eq!(report.classification(), Classification::Yellow);
    ensure!(
        peak.load(Ordering::SeqCst) <= 2,
        "at most 2 workers ran at once (peak: {})",
        peak.load(Ordering::SeqCst)
    );
    Ok(())
}

/// Forwards to an in-process launcher, except for specs it pretends to lose.
struct LosingLauncher<E> {
    inner: InProcessLauncher<E>,
}

impl<E> WorkerLauncher for LosingLauncher<E>
where
    E: specfan_runner::executor::SpecExecutor + Send + Sync + 'static,
{
    async fn launch(
        &self,
        spec: &SpecId,
        aggregator: SocketAddr,
    ) -> Result<WorkerExit, LaunchError> {
        match spec.as_str() {
            "spec/lost_spec.rb" => Ok(WorkerExit::Lost {
                reason: "worker exited with signal: 9 (SIGKILL)".to_owned(),
            }),
            "spec/panicked_spec.rb" => Err(LaunchError::Panicked {
                message: "executor blew up".to_owned(),
            }),
            _ => self.inner.launch(spec, aggregator).await,
        }
    }
}

#[test]
fn lost_workers_are_reported_without_changing_color() -> Result<()> {
    test_init();

    let spec_list = SpecList::from_groups([group(
        "spec/*_spec.rb",
        &[
            "spec/lost_spec.rb",
            "spec/panicked_spec.rb",
            "spec/passing_spec.rb",
        ],
    )]);
    let launcher = LosingLauncher {
        inner: InProcessLauncher::new(canned_output, RetryPolicy::default()),
    };
    let mut builder = SpecRunnerBuilder::default();
    builder.set_live_output(LiveOutput::Discard);
    let report = builder.build(&spec_list, launcher)?.execute()?;

    let totals = report.totals();
    assert_eq!(totals.lost_workers, 2);
    assert_eq!(totals.specs_reported, 1);
    assert_eq!(report.classification(), Classification::Green);
    ensure!(
        totals
            .captured_stderr
            .contains("spec/lost_spec.rb: worker exited with signal: 9 (SIGKILL)\n"),
        "lost worker noted: {}",
        totals.captured_stderr
    );
    ensure!(
        totals
            .captured_stderr
            .contains("spec/panicked_spec.rb: worker panicked: executor blew up\n"),
        "failed launch noted: {}",
        totals.captured_stderr
    );

    let rendered = report.render(ReportOptions::default());
    ensure!(
        rendered.contains("warning: 2 workers exited without delivering results"),
        "{rendered}"
    );
    Ok(())
}

#[test]
fn empty_run() -> Result<()> {
    test_init();

    let spec_list = SpecList::from_groups([group("spec/*_spec.rb", &[])]);
    let mut builder = SpecRunnerBuilder::default();
    builder.set_live_output(LiveOutput::Discard);
    let report = builder
        .build(
            &spec_list,
            InProcessLauncher::new(canned_output, RetryPolicy::default()),
        )?
        .execute()?;

    assert_eq!(report.totals().specs_reported, 0);
    assert_eq!(report.classification(), Classification::Green);
    Ok(())
}
