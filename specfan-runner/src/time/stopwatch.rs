// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking how long a run takes.
//!
//! A run records its start as a `DateTime` (realtime clock, for logging) and an `Instant`
//! (monotonic clock, for the reported duration).

use super::{CpuTimes, RunTimes};
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// The start state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
    cpu: Option<CpuTimes>,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            // These syscalls will happen imperceptibly close to each other, which is good enough
            // for our purposes.
            start_time: Local::now(),
            instant: Instant::now(),
            cpu: CpuTimes::now(),
        }
    }

    pub(crate) fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub(crate) fn snapshot(&self) -> StopwatchSnapshot {
        let cpu = match (self.cpu, CpuTimes::now()) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        };
        StopwatchSnapshot {
            start_time: self.start_time,
            duration: self.instant.elapsed(),
            cpu,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct StopwatchSnapshot {
    pub(crate) start_time: DateTime<Local>,
    pub(crate) duration: Duration,
    pub(crate) cpu: Option<CpuTimes>,
}

impl StopwatchSnapshot {
    pub(crate) fn end_time(&self) -> DateTime<Local> {
        self.start_time + self.duration
    }

    pub(crate) fn run_times(&self) -> RunTimes {
        RunTimes {
            real: self.duration,
            user: self.cpu.map(|cpu| cpu.user),
            system: self.cpu.map(|cpu| cpu.system),
        }
    }
}
