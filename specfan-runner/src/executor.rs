// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The spec engine: runs one spec and captures what it prints.

use crate::{errors::SpecCommandParseError, list::SpecId};
use tracing::{debug, trace};

/// Captured output of one spec run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecOutput {
    /// Standard output, lossily decoded as UTF-8.
    pub stdout: String,

    /// Standard error, lossily decoded as UTF-8.
    pub stderr: String,
}

/// Runs a single spec, capturing its output.
///
/// Implementations never fail: an engine that can't be started, or that crashes, is reported
/// through the captured output like any other broken spec.
pub trait SpecExecutor {
    /// Runs `spec` to completion.
    fn execute(&self, spec: &SpecId) -> SpecOutput;
}

impl<F> SpecExecutor for F
where
    F: Fn(&SpecId) -> SpecOutput + Send + Sync,
{
    fn execute(&self, spec: &SpecId) -> SpecOutput {
        self(spec)
    }
}

/// Runs `<spec-command> <run-options...> <spec>` as a child process.
#[derive(Clone, Debug)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    force_color: bool,
}

impl CommandExecutor {
    /// Environment variables set on the engine when color is forced.
    pub const FORCE_COLOR_ENV: [(&'static str, &'static str); 2] =
        [("FORCE_COLOR", "1"), ("CLICOLOR_FORCE", "1")];

    /// Creates a new executor.
    ///
    /// Both `spec_command` and `run_options` are split with shell-word rules, so
    /// `spec_command = "bundle exec rspec"` works as expected.
    pub fn new(
        spec_command: &str,
        run_options: &str,
        force_color: bool,
    ) -> Result<Self, SpecCommandParseError> {
        let mut command = split(spec_command)?.into_iter();
        let program = command.next().ok_or(SpecCommandParseError::Empty)?;
        let mut args: Vec<_> = command.collect();
        args.extend(split(run_options)?);

        Ok(Self {
            program,
            args,
            force_color,
        })
    }

    /// Returns the program that's run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments passed before the spec.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns whether the engine is asked to emit colors.
    pub fn force_color(&self) -> bool {
        self.force_color
    }

    fn to_expression(&self, spec: &SpecId) -> duct::Expression {
        let mut expression = duct::cmd(
            self.program.as_str(),
            self.args
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(spec.as_str())),
        );
        if self.force_color {
            for (key, value) in Self::FORCE_COLOR_ENV {
                expression = expression.env(key, value);
            }
        }
        expression
    }
}

impl SpecExecutor for CommandExecutor {
    fn execute(&self, spec: &SpecId) -> SpecOutput {
        let expression = self.to_expression(spec);
        trace!("executing command: {:?}", expression);

        match expression
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
        {
            Ok(output) => {
                debug!(%spec, status = %output.status, "spec engine exited");
                SpecOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
            Err(err) => {
                debug!(%spec, "failed to spawn spec engine: {err}");
                SpecOutput {
                    stdout: String::new(),
                    stderr: format!("failed to run `{}` for {spec}: {err}", self.program),
                }
            }
        }
    }
}

fn split(input: &str) -> Result<Vec<String>, SpecCommandParseError> {
    shell_words::split(input).map_err(|err| SpecCommandParseError::Split {
        input: input.to_owned(),
        err,
    })
}
