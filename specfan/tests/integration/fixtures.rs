// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use indoc::indoc;
use std::{fs, process::Output};

pub(crate) const SPECFAN_BIN: &str = env!("CARGO_BIN_EXE_specfan");

/// Spec engine arguments that print the spec file itself as the engine's output.
pub(crate) const CAT_SPEC: [&str; 2] = ["--spec-command=sh", r#"--run-options=-c 'cat "$0"'"#];

pub(crate) const PASSING_SPEC: &str = indoc! {"
    ...

    Finished in 0.5 seconds
    3 examples, 0 failures
"};

pub(crate) const PENDING_SPEC: &str = indoc! {"
    ..*.

    Finished in 0.25 seconds
    4 examples, 0 failures, 1 pending
"};

pub(crate) const FAILING_SPEC: &str = indoc! {"
    .F

    Finished in 1 seconds
    2 examples, 1 failure
"};

/// A temporary project with spec files under `spec/`.
pub(crate) struct SpecProject {
    dir: Utf8TempDir,
}

impl SpecProject {
    pub(crate) fn new(specs: &[(&str, &str)]) -> Self {
        let dir = camino_tempfile::Builder::new()
            .prefix("specfan-")
            .tempdir()
            .expect("created temp dir");
        let project = Self { dir };
        for (path, contents) in specs {
            project.write(path, contents);
        }
        project
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn write(&self, path: &str, contents: &str) {
        let path = self.root().join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("created parent dir");
        }
        fs::write(&path, contents).expect("wrote fixture file");
    }

    /// Runs specfan in the project root with the given arguments.
    pub(crate) fn specfan(&self, args: &[&str]) -> SpecfanOutput {
        let output = duct::cmd(SPECFAN_BIN, args)
            .dir(self.root())
            .env_remove("SPECFAN_PROFILE")
            .env_remove("SPECFAN_MAX_WORKERS")
            .env_remove("SPECFAN_COLOR")
            .env_remove("SPECFAN_VERBOSE")
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .expect("specfan ran");
        SpecfanOutput::new(output)
    }
}

pub(crate) struct SpecfanOutput {
    pub(crate) code: Option<i32>,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl SpecfanOutput {
    fn new(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl std::fmt::Display for SpecfanOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "exit code: {:?}", self.code)?;
        writeln!(f, "--- stdout ---\n{}", self.stdout)?;
        write!(f, "--- stderr ---\n{}", self.stderr)
    }
}
