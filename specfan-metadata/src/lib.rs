// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Data shared between the specfan coordinator and its worker processes.
//!
//! This crate is kept small and stable: it holds the documented
//! [exit codes](SpecfanExitCode) and the messages exchanged over the aggregator
//! channel.

mod exit_codes;
mod wire;

pub use exit_codes::*;
pub use wire::*;
