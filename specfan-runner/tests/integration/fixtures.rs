// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use indoc::indoc;
use specfan_runner::{
    executor::SpecOutput,
    list::{SpecGroup, SpecId, SpecList},
};
use std::sync::Once;

pub(crate) const PASSING_STDOUT: &str = indoc! {"
    ....

    Finished in 0.5 seconds
    4 examples, 0 failures
"};

pub(crate) const FAILING_STDOUT: &str = indoc! {"
    .FF

    Failures:

      1) Widget renders
         Failure/Error: expected true, got false

    Finished in 1.25 seconds
    3 examples, 2 failures
"};

pub(crate) const CRASHED_STDOUT: &str = "Segmentation fault (core dumped)\n";

/// Returns canned spec engine output, keyed on the spec's file name.
pub(crate) fn canned_output(spec: &SpecId) -> SpecOutput {
    let name = spec.as_str().rsplit('/').next().unwrap_or_default();
    let (stdout, stderr) = match name {
        "passing_spec.rb" => (PASSING_STDOUT, "DEPRECATION: old matcher\n"),
        "failing_spec.rb" => (FAILING_STDOUT, ""),
        "crashed_spec.rb" => (CRASHED_STDOUT, "boom\n"),
        other => panic!("no canned output for {other}"),
    };
    SpecOutput {
        stdout: stdout.to_owned(),
        stderr: stderr.to_owned(),
    }
}

pub(crate) fn group(pattern: &str, specs: &[&str]) -> SpecGroup {
    SpecGroup {
        pattern: pattern.to_owned(),
        specs: specs.iter().copied().map(SpecId::new).collect(),
    }
}

pub(crate) fn three_spec_list() -> SpecList {
    SpecList::from_groups([group(
        "spec/*_spec.rb",
        &[
            "spec/crashed_spec.rb",
            "spec/failing_spec.rb",
            "spec/passing_spec.rb",
        ],
    )])
}

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        color_eyre::install().expect("color-eyre installed once");
    });
}
