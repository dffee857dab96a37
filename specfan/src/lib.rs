// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run every spec file in its own process and fold the results into one report.
//!
//! `specfan run <globs...>` discovers spec files, starts one worker process per spec, and prints
//! a single colorized summary once every worker has exited. See the `specfan-runner` crate for
//! the library underneath.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod worker;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, StderrStyles};
