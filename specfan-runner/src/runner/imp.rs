// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{InProcessLauncher, WorkerExit, WorkerLauncher};
use crate::{
    aggregator::{Aggregator, LiveOutput},
    config::{MaxWorkers, RetryPolicy},
    errors::{DisplayErrorChain, SpecRunError, SpecRunnerBuildError},
    executor::SpecExecutor,
    helpers::plural,
    list::{SpecId, SpecList},
    remote::AggregatorServer,
    report::RenderedReport,
    time::stopwatch,
};
use futures::{StreamExt, stream};
use std::{net::SocketAddr, sync::Arc};
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Spec runner options.
#[derive(Debug, Default)]
pub struct SpecRunnerBuilder {
    max_workers: Option<MaxWorkers>,
    live_output: Option<LiveOutput>,
}

impl SpecRunnerBuilder {
    /// Sets the maximum number of workers alive at once.
    pub fn set_max_workers(&mut self, max_workers: MaxWorkers) -> &mut Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Sets where each spec's output is echoed as it arrives.
    pub fn set_live_output(&mut self, live_output: LiveOutput) -> &mut Self {
        self.live_output = Some(live_output);
        self
    }

    /// Creates a new spec runner.
    pub fn build<L: WorkerLauncher>(
        self,
        spec_list: &SpecList,
        launcher: L,
    ) -> Result<SpecRunner<'_, L>, SpecRunnerBuildError> {
        let max_workers = self.max_workers.unwrap_or_default().compute().max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("specfan-runner-worker")
            .build()
            .map_err(SpecRunnerBuildError::TokioRuntimeCreate)?;

        Ok(SpecRunner {
            spec_list,
            launcher,
            max_workers,
            aggregator: Arc::new(Aggregator::new(self.live_output.unwrap_or_default())),
            runtime,
        })
    }
}

/// The coordinator for a run.
///
/// Created using [`SpecRunnerBuilder::build`].
#[derive(Debug)]
pub struct SpecRunner<'a, L> {
    spec_list: &'a SpecList,
    launcher: L,
    max_workers: usize,
    aggregator: Arc<Aggregator>,
    runtime: Runtime,
}

impl<L: WorkerLauncher> SpecRunner<'_, L> {
    /// Returns the aggregator results are folded into.
    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Runs every spec, one group at a time, and renders the report.
    ///
    /// Every worker in a group exits before the next group starts. A worker that exits without
    /// delivering its result is recorded as lost rather than failing the run.
    pub fn execute(self) -> Result<RenderedReport, SpecRunError> {
        let stopwatch = stopwatch();
        info!(
            start_time = %stopwatch.start_time().format("%Y-%m-%d %H:%M:%S%.3f"),
            "running {} {} in {} {}",
            self.spec_list.spec_count(),
            plural::specs_str(self.spec_list.spec_count()),
            self.spec_list.groups().len(),
            if self.spec_list.groups().len() == 1 { "group" } else { "groups" },
        );

        let snapshot = self.runtime.block_on(async {
            let server = AggregatorServer::bind(self.aggregator.clone())
                .await
                .map_err(SpecRunError::AggregatorBind)?;
            let addr = server.addr();

            for group in self.spec_list.groups() {
                debug!(
                    pattern = %group.pattern,
                    count = group.specs.len(),
                    "starting group"
                );
                stream::iter(&group.specs)
                    .map(|spec| self.run_worker(spec, addr))
                    .buffer_unordered(self.max_workers)
                    .collect::<()>()
                    .await;
                debug!(pattern = %group.pattern, "group finished");
            }

            let snapshot = stopwatch.snapshot();
            server.shutdown().await;
            Ok::<_, SpecRunError>(snapshot)
        })?;

        self.aggregator.set_run_times(snapshot.run_times());
        let report = self.aggregator.report();
        info!(
            end_time = %snapshot.end_time().format("%Y-%m-%d %H:%M:%S%.3f"),
            classification = %report.classification(),
            "run finished in {:.3}s",
            snapshot.duration.as_secs_f64(),
        );
        Ok(report)
    }

    async fn run_worker(&self, spec: &SpecId, addr: SocketAddr) {
        match self.launcher.launch(spec, addr).await {
            Ok(WorkerExit::Delivered) => {
                debug!(%spec, "worker finished");
            }
            Ok(WorkerExit::Lost { reason }) => {
                self.aggregator.record_lost_worker(spec.as_str(), &reason);
            }
            Err(err) => {
                self.aggregator
                    .record_lost_worker(spec.as_str(), &DisplayErrorChain::new(err).to_string());
            }
        }
    }
}

/// Runs every spec in `spec_list` on in-process workers, echoing output to stdout.
///
/// Concurrency is unbounded and delivery uses the default retry policy. Use
/// [`SpecRunnerBuilder`] for anything else.
pub fn run_all<E>(spec_list: &SpecList, executor: E) -> Result<RenderedReport, SpecRunError>
where
    E: SpecExecutor + Send + Sync + 'static,
{
    let launcher = InProcessLauncher::new(executor, RetryPolicy::default());
    SpecRunnerBuilder::default()
        .build(spec_list, launcher)?
        .execute()
}
