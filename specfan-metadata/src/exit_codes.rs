// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `specfan` failures.
///
/// `specfan` runs may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum SpecfanExitCode {}

impl SpecfanExitCode {
    /// No errors occurred and specfan exited normally.
    pub const OK: i32 = 0;

    /// No specs matched the provided globs, but no other errors occurred.
    pub const NO_SPECS_RUN: i32 = 4;

    /// A worker process could not start, or could not run its spec.
    pub const WORKER_ERROR: i32 = 70;

    /// A worker process ran out of attempts while delivering its result to the aggregator.
    pub const DELIVERY_FAILED: i32 = 71;

    /// A user issue happened while setting up a specfan invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more specs reported failures or errors.
    pub const SPEC_RUN_FAILED: i32 = 100;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
