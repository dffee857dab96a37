// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Measuring how long a run takes.
//!
//! A run is timed twice over: the wall-clock duration measured by the coordinator, and the CPU
//! time (user and system) spent by the coordinator and every worker it waited on.

mod cpu;
mod stopwatch;

pub(crate) use cpu::*;
pub(crate) use stopwatch::*;

use std::time::Duration;

/// Times measured by the coordinator across an entire run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunTimes {
    /// Real, wall-clock time.
    pub real: Duration,

    /// User CPU time, if available on this platform.
    pub user: Option<Duration>,

    /// System CPU time, if available on this platform.
    pub system: Option<Duration>,
}

impl RunTimes {
    /// Creates run times with only a wall-clock duration.
    pub fn from_real(real: Duration) -> Self {
        Self {
            real,
            user: None,
            system: None,
        }
    }
}
