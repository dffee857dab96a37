// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for specfan.
//!
//! specfan reads an embedded default config, then layers `.config/specfan.toml` (or a file passed
//! on the command line) on top of it. Settings are grouped into named profiles; any key a profile
//! doesn't set falls back to `[profile.default]`.

mod imp;
mod max_workers;
mod retry_policy;

pub use imp::*;
pub use max_workers::*;
pub use retry_policy::*;
