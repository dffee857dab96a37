// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The coordinator: fans specs out to workers and collects the report.
//!
//! The main structure in this module is [`SpecRunner`].

mod imp;
mod launcher;

pub use imp::*;
pub use launcher::*;
