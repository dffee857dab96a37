// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for specfan.
//!
//! The basic flow of a run is:
//!
//! 1. [`list::SpecList`] enumerates spec identifiers, one group per glob.
//! 2. [`runner::SpecRunner`] publishes an [`aggregator::Aggregator`] behind a
//!    [`remote::AggregatorServer`], then launches one worker per spec.
//! 3. Each worker runs a [`worker::WorkerRunner`], which executes its spec through a
//!    [`executor::SpecExecutor`] and delivers the captured output through a
//!    [`remote::RemoteHandle`].
//! 4. Once every worker has exited, the aggregator renders a [`report::RenderedReport`].

pub mod aggregator;
pub mod config;
pub mod errors;
pub mod executor;
mod helpers;
pub mod list;
pub mod parse;
pub mod remote;
pub mod report;
pub mod runner;
pub mod time;
pub mod worker;
