// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{ExpectedError, errors::Result};
use clap::Args;
use specfan_metadata::SpecfanExitCode;
use specfan_runner::{
    config::RetryPolicy,
    executor::CommandExecutor,
    list::SpecId,
    remote::RemoteHandle,
    worker::WorkerRunner,
};
use std::net::SocketAddr;

/// Arguments passed by the coordinator to each worker process.
#[derive(Debug, Args)]
pub(crate) struct WorkerOpts {
    /// Address of the coordinator's aggregator.
    #[arg(long, value_name = "ADDR")]
    aggregator: SocketAddr,

    /// Command used to run the spec.
    #[arg(long, allow_hyphen_values = true)]
    spec_command: String,

    /// Options passed to the spec command.
    #[arg(long, allow_hyphen_values = true, default_value = "")]
    run_options: String,

    /// Ask the spec engine for colored output.
    #[arg(long)]
    force_color: bool,

    /// Delivery retry policy, as JSON.
    #[arg(long, value_name = "JSON")]
    delivery_retries: Option<String>,

    /// The spec to run.
    #[arg(value_name = "SPEC")]
    spec: String,
}

impl WorkerOpts {
    pub(crate) fn exec(self) -> Result<i32> {
        let retries = match &self.delivery_retries {
            Some(input) => serde_json::from_str::<RetryPolicy>(input).map_err(|err| {
                ExpectedError::RetryPolicyParseError {
                    input: input.clone(),
                    err,
                }
            })?,
            None => RetryPolicy::default(),
        };
        let executor =
            CommandExecutor::new(&self.spec_command, &self.run_options, self.force_color)?;
        let worker = WorkerRunner::new(RemoteHandle::new(self.aggregator), retries);

        worker.run(&SpecId::new(self.spec), &executor)?;
        Ok(SpecfanExitCode::OK)
    }
}
