// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that run the `specfan` binary against throwaway spec files.
//!
//! The spec engine is `sh`, which prints each spec file back as its own output.

#![cfg(unix)]

mod fixtures;

use fixtures::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use specfan_metadata::SpecfanExitCode;

#[test]
fn passing_run() {
    let project = SpecProject::new(&[
        ("spec/a_spec.rb", PASSING_SPEC),
        ("spec/b_spec.rb", PASSING_SPEC),
    ]);
    let mut args = vec!["run", "--color=never"];
    args.extend(CAT_SPEC);
    args.push("spec/*_spec.rb");
    let output = project.specfan(&args);

    assert_eq!(output.code, Some(SpecfanExitCode::OK), "{output}");
    for spec in ["spec/a_spec.rb", "spec/b_spec.rb"] {
        assert!(
            output.stdout.contains(&format!("\nRunning {spec}.\n")),
            "{output}"
        );
    }
    assert!(output.stdout.contains("Total actual time: 1.0\n"), "{output}");
    assert!(
        output
            .stdout
            .contains("6 examples, 0 failures, 0 errors, 0 pending, suite run in "),
        "{output}"
    );
    assert!(!output.stdout.contains('\x1b'), "no color requested: {output}");
}

#[test]
fn failing_run_is_red() {
    let project = SpecProject::new(&[
        ("spec/failing_spec.rb", FAILING_SPEC),
        ("spec/pending_spec.rb", PENDING_SPEC),
        ("spec/crashed_spec.rb", "Segmentation fault\n"),
    ]);
    let mut args = vec!["run", "--color=always", "-j", "2"];
    args.extend(CAT_SPEC);
    args.push("spec/*_spec.rb");
    let output = project.specfan(&args);

    assert_eq!(
        output.code,
        Some(SpecfanExitCode::SPEC_RUN_FAILED),
        "{output}"
    );
    assert!(
        output
            .stdout
            .contains("\x1b[31mTotal actual time: 1.25\n6 examples, 1 failures, 0 errors, 1 pending"),
        "{output}"
    );
    assert!(
        output.stdout.contains("spec/crashed_spec.rb: no timing marker"),
        "{output}"
    );
}

#[test]
fn pending_run_passes() {
    let project = SpecProject::new(&[("spec/pending_spec.rb", PENDING_SPEC)]);
    let mut args = vec!["run", "--color=always"];
    args.extend(CAT_SPEC);
    args.push("spec/pending_spec.rb");
    let output = project.specfan(&args);

    assert_eq!(output.code, Some(SpecfanExitCode::OK), "{output}");
    assert!(output.stdout.contains("\x1b[33mTotal actual time"), "{output}");
}

#[test]
fn no_specs_matched() {
    let project = SpecProject::new(&[("spec/a_spec.rb", PASSING_SPEC)]);
    let mut args = vec!["run"];
    args.extend(CAT_SPEC);
    args.push("test/*_test.rb");
    let output = project.specfan(&args);

    assert_eq!(output.code, Some(SpecfanExitCode::NO_SPECS_RUN), "{output}");
    assert!(output.stderr.contains("no specs matched"), "{output}");
}

#[test]
fn empty_spec_command_is_a_setup_error() {
    let project = SpecProject::new(&[("spec/a_spec.rb", PASSING_SPEC)]);
    let output = project.specfan(&["run", "--spec-command=", "spec/a_spec.rb"]);

    assert_eq!(output.code, Some(SpecfanExitCode::SETUP_ERROR), "{output}");
    assert!(output.stderr.contains("invalid spec command"), "{output}");
}

#[test]
fn profile_from_repo_config() {
    let project = SpecProject::new(&[
        ("spec/a_spec.rb", PASSING_SPEC),
        ("spec/slow_spec.rb", FAILING_SPEC),
    ]);
    project.write(
        ".config/specfan.toml",
        indoc! {r#"
            [profile.ci]
            spec-command = "sh"
            run-options = "-c 'cat \"$0\"'"
            exclude = ["spec/slow_spec.rb"]
            max-workers = 1
        "#},
    );

    let output = project.specfan(&["run", "--color=never", "-P", "ci", "spec/*_spec.rb"]);
    assert_eq!(output.code, Some(SpecfanExitCode::OK), "{output}");
    assert!(output.stdout.contains("Running spec/a_spec.rb."), "{output}");
    assert!(
        !output.stdout.contains("slow_spec"),
        "excluded spec didn't run: {output}"
    );

    let output = project.specfan(&["run", "-P", "nightly", "spec/*_spec.rb"]);
    assert_eq!(output.code, Some(SpecfanExitCode::SETUP_ERROR), "{output}");
    assert!(
        output
            .stderr
            .contains("profile `nightly` not found (known profiles: ci, default)"),
        "{output}"
    );
}

#[test]
fn list_groups_specs_by_glob() {
    let project = SpecProject::new(&[
        ("spec/models/user_spec.rb", PASSING_SPEC),
        ("spec/models/post_spec.rb", PASSING_SPEC),
        ("spec/requests/api_spec.rb", PASSING_SPEC),
    ]);
    let output = project.specfan(&[
        "list",
        "--color=never",
        "spec/models/*_spec.rb",
        "spec/requests/*_spec.rb",
    ]);

    assert_eq!(output.code, Some(SpecfanExitCode::OK), "{output}");
    assert_eq!(
        output.stdout,
        indoc! {"
            spec/models/*_spec.rb:
                spec/models/post_spec.rb
                spec/models/user_spec.rb
            spec/requests/*_spec.rb:
                spec/requests/api_spec.rb
        "}
    );
}

#[test]
fn worker_reports_unreachable_aggregator() {
    let project = SpecProject::new(&[("spec/a_spec.rb", PASSING_SPEC)]);
    // Port 1 on loopback refuses connections.
    let output = project.specfan(&[
        "__worker",
        "--aggregator=127.0.0.1:1",
        "--spec-command=sh",
        r#"--run-options=-c 'cat "$0"'"#,
        r#"--delivery-retries={"backoff":"fixed","count":1}"#,
        "--",
        "spec/a_spec.rb",
    ]);

    assert_eq!(
        output.code,
        Some(SpecfanExitCode::DELIVERY_FAILED),
        "{output}"
    );
    assert!(
        output
            .stderr
            .contains("gave up delivering result for `spec/a_spec.rb` after 2 attempts"),
        "{output}"
    );
}
