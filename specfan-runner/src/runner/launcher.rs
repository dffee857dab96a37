// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::RetryPolicy,
    errors::{DisplayErrorChain, LaunchError},
    executor::SpecExecutor,
    list::SpecId,
    remote::RemoteHandle,
    worker::{WORKER_SUBCOMMAND_NAME, WorkerRunner},
};
use std::{
    any::Any,
    future::Future,
    net::SocketAddr,
    path::PathBuf,
    process::Stdio,
    sync::Arc,
};
use tracing::debug;

/// How a worker finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The worker delivered its result.
    Delivered,

    /// The worker exited without confirming delivery.
    Lost {
        /// A description of how the worker exited.
        reason: String,
    },
}

/// Starts a worker for one spec and waits for it to exit.
pub trait WorkerLauncher {
    /// Runs a worker for `spec` that delivers to the aggregator at `aggregator`, resolving once
    /// the worker has exited.
    fn launch(
        &self,
        spec: &SpecId,
        aggregator: SocketAddr,
    ) -> impl Future<Output = Result<WorkerExit, LaunchError>>;
}

/// Settings passed from the coordinator to each worker process.
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    /// The spec command.
    pub spec_command: String,

    /// Options passed to the spec command.
    pub run_options: String,

    /// Whether to ask the spec engine for colored output.
    pub force_color: bool,

    /// How to retry result delivery.
    pub delivery_retries: RetryPolicy,
}

impl WorkerSettings {
    /// Returns the arguments for the worker subcommand, not including the subcommand itself.
    pub fn to_args(&self, spec: &SpecId, aggregator: SocketAddr) -> Vec<String> {
        // serde_json only fails to serialize maps with non-string keys.
        let retries = serde_json::to_string(&self.delivery_retries)
            .expect("retry policies always serialize");

        let mut args = vec![
            format!("--aggregator={aggregator}"),
            format!("--spec-command={}", self.spec_command),
            format!("--run-options={}", self.run_options),
            format!("--delivery-retries={retries}"),
        ];
        if self.force_color {
            args.push("--force-color".to_owned());
        }
        args.push("--".to_owned());
        args.push(spec.as_str().to_owned());
        args
    }
}

/// Launches each worker as a separate OS process, by re-running a program with the hidden worker
/// subcommand.
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    program: PathBuf,
    leading_args: Vec<String>,
    settings: WorkerSettings,
}

impl ProcessLauncher {
    /// Creates a launcher that runs `program [leading_args...] __worker ...`.
    pub fn new(
        program: impl Into<PathBuf>,
        leading_args: Vec<String>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args,
            settings,
        }
    }

    /// Creates a launcher that re-runs the current executable.
    pub fn current_exe(settings: WorkerSettings) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, Vec::new(), settings))
    }
}

impl WorkerLauncher for ProcessLauncher {
    async fn launch(
        &self,
        spec: &SpecId,
        aggregator: SocketAddr,
    ) -> Result<WorkerExit, LaunchError> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(WORKER_SUBCOMMAND_NAME)
            .args(self.settings.to_args(spec, aggregator))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|err| LaunchError::Spawn {
            program: self.program.display().to_string(),
            err,
        })?;
        debug!(%spec, pid = ?child.id(), "spawned worker");

        let status = child.wait().await.map_err(|err| LaunchError::Wait { err })?;
        if status.success() {
            Ok(WorkerExit::Delivered)
        } else {
            Ok(WorkerExit::Lost {
                reason: format!("worker exited with {status}"),
            })
        }
    }
}

/// Runs each worker on a blocking thread within the coordinator process.
///
/// Results are still delivered through a [`RemoteHandle`], exactly as a worker process would.
#[derive(Debug)]
pub struct InProcessLauncher<E> {
    executor: Arc<E>,
    delivery_retries: RetryPolicy,
}

impl<E> InProcessLauncher<E> {
    /// Creates a new launcher that runs specs with `executor`.
    pub fn new(executor: E, delivery_retries: RetryPolicy) -> Self {
        Self {
            executor: Arc::new(executor),
            delivery_retries,
        }
    }
}

impl<E> WorkerLauncher for InProcessLauncher<E>
where
    E: SpecExecutor + Send + Sync + 'static,
{
    async fn launch(
        &self,
        spec: &SpecId,
        aggregator: SocketAddr,
    ) -> Result<WorkerExit, LaunchError> {
        let executor = self.executor.clone();
        let retries = self.delivery_retries;
        let spec = spec.clone();

        let join = tokio::task::spawn_blocking(move || {
            WorkerRunner::new(RemoteHandle::new(aggregator), retries).run(&spec, &*executor)
        });

        match join.await {
            Ok(Ok(_)) => Ok(WorkerExit::Delivered),
            Ok(Err(err)) => Ok(WorkerExit::Lost {
                reason: DisplayErrorChain::new(err).to_string(),
            }),
            Err(err) if err.is_panic() => Err(LaunchError::Panicked {
                message: panic_message(err.into_panic()),
            }),
            Err(_) => Err(LaunchError::Cancelled),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "(non-string panic payload)".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn worker_args() {
        let settings = WorkerSettings {
            spec_command: "bundle exec rspec".to_owned(),
            run_options: "-c".to_owned(),
            force_color: true,
            delivery_retries: RetryPolicy::new_without_delay(2),
        };
        let args = settings.to_args(
            &SpecId::new("spec/-odd_spec.rb"),
            SocketAddr::from(([127, 0, 0, 1], 4000)),
        );
        assert_eq!(
            args,
            [
                "--aggregator=127.0.0.1:4000",
                "--spec-command=bundle exec rspec",
                "--run-options=-c",
                r#"--delivery-retries={"backoff":"fixed","count":2,"delay":"0s","jitter":false}"#,
                "--force-color",
                "--",
                "spec/-odd_spec.rb",
            ]
        );
    }

    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new("owned".to_owned())), "owned");
        assert_eq!(panic_message(Box::new(42)), "(non-string panic payload)");
    }
}
