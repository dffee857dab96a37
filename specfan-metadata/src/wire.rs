// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messages exchanged between workers and the aggregator.
//!
//! The channel is line-delimited JSON over a local TCP connection: each request is one line, and
//! the aggregator answers each request with exactly one response line.

use serde::{Deserialize, Serialize};

/// The captured output of a single spec, as produced by one worker.
///
/// A `SpecResult` is sent to the aggregator exactly once per successful delivery.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SpecResult {
    /// The identifier of the spec, typically its path.
    pub id: String,

    /// Everything the spec engine wrote to standard output.
    pub stdout: String,

    /// Everything the spec engine wrote to standard error.
    pub stderr: String,
}

impl SpecResult {
    /// Creates a new `SpecResult`.
    pub fn new(id: impl Into<String>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// A request sent by a worker to the aggregator.
///
/// Only adding a result is exposed: rendering the report stays within the coordinator process.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum AggregatorRequest {
    /// Fold a spec result into the run totals.
    Add {
        /// A worker-chosen identifier for this delivery. A retried delivery reuses its
        /// identifier, so the aggregator folds each delivery at most once.
        delivery_id: u64,

        /// The result to fold.
        result: SpecResult,
    },
}

impl AggregatorRequest {
    /// Serializes this request as a single newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Parses a request from a single line, with or without its trailing newline.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end_matches(['\n', '\r']))
    }
}

/// The aggregator's answer to an [`AggregatorRequest`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AggregatorResponse {
    /// The request was applied.
    Accepted,

    /// The request could not be understood and was not applied.
    Rejected {
        /// A human-readable reason.
        message: String,
    },
}

impl AggregatorResponse {
    /// Serializes this response as a single newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Parses a response from a single line, with or without its trailing newline.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end_matches(['\n', '\r']))
    }
}
