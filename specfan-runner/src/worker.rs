// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-spec unit of work.
//!
//! A worker runs exactly one spec, then delivers the captured output to the run's single
//! [`Aggregator`](crate::aggregator::Aggregator). Delivery is retried on connection-level failures
//! according to a [`RetryPolicy`]; nothing else is retried.

use crate::{
    config::RetryPolicy,
    errors::{DeliveryError, WorkerError},
    executor::SpecExecutor,
    list::SpecId,
};
use specfan_metadata::SpecResult;
use std::{sync::Arc, thread};
use tracing::{debug, error, warn};

/// The name of the hidden subcommand that runs a single worker.
pub const WORKER_SUBCOMMAND_NAME: &str = "__worker";

/// Something a worker can deliver its result to.
///
/// In a worker process this is a [`RemoteHandle`](crate::remote::RemoteHandle). The
/// [`Aggregator`](crate::aggregator::Aggregator) itself also implements this trait.
pub trait ResultSink {
    /// Delivers a single result.
    ///
    /// A sink must fold a given `delivery_id` at most once, so that a delivery whose
    /// acknowledgement was lost can be safely retried.
    fn deliver(&self, delivery_id: u64, result: &SpecResult) -> Result<(), DeliveryError>;
}

impl<S: ResultSink + ?Sized> ResultSink for &S {
    fn deliver(&self, delivery_id: u64, result: &SpecResult) -> Result<(), DeliveryError> {
        (**self).deliver(delivery_id, result)
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Arc<S> {
    fn deliver(&self, delivery_id: u64, result: &SpecResult) -> Result<(), DeliveryError> {
        (**self).deliver(delivery_id, result)
    }
}

/// The result of a successful delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// The identifier the result was delivered under.
    pub delivery_id: u64,

    /// The number of attempts it took, including the successful one.
    pub attempts: u32,
}

/// Runs one spec and delivers its result.
#[derive(Debug)]
pub struct WorkerRunner<S> {
    sink: S,
    retries: RetryPolicy,
}

impl<S: ResultSink> WorkerRunner<S> {
    /// Creates a new worker that delivers to `sink`, retrying as described by `retries`.
    pub fn new(sink: S, retries: RetryPolicy) -> Self {
        Self { sink, retries }
    }

    /// Executes `spec` and delivers the captured output.
    ///
    /// Success means the result was delivered. It says nothing about whether the spec passed.
    pub fn run<E>(&self, spec: &SpecId, executor: &E) -> Result<DeliveryOutcome, WorkerError>
    where
        E: SpecExecutor + ?Sized,
    {
        debug!(%spec, "executing spec");
        let output = executor.execute(spec);
        let result = SpecResult::new(spec.as_str(), output.stdout, output.stderr);
        self.deliver(&result)
    }

    /// Delivers an already-captured result.
    pub fn deliver(&self, result: &SpecResult) -> Result<DeliveryOutcome, WorkerError> {
        let delivery_id: u64 = rand::random();
        let mut backoff = self.retries.backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let err = match self.sink.deliver(delivery_id, result) {
                Ok(()) => {
                    debug!(spec = %result.id, delivery_id, attempts, "delivered result");
                    return Ok(DeliveryOutcome {
                        delivery_id,
                        attempts,
                    });
                }
                Err(err) if !err.is_transient() => {
                    return Err(WorkerError::Delivery {
                        spec: result.id.clone(),
                        err,
                    });
                }
                Err(err) => err,
            };

            match backoff.next() {
                Some(delay) => {
                    warn!(
                        pid = std::process::id(),
                        attempt = attempts,
                        "delivering result for `{}` failed, retrying in {delay:?}: {err}",
                        result.id,
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                None => {
                    error!(
                        pid = std::process::id(),
                        "giving up delivering result for `{}` after {attempts} attempts: {err}",
                        result.id,
                    );
                    return Err(WorkerError::DeliveryExhausted {
                        spec: result.id.clone(),
                        attempts,
                        err,
                    });
                }
            }
        }
    }
}
