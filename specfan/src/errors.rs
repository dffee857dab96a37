// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use owo_colors::OwoColorize;
use specfan_metadata::SpecfanExitCode;
use specfan_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are printed with display_to_stderr, which
// colorizes them.

/// An error that specfan knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed { err: std::io::Error },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { err: camino::FromPathBufError },
    #[error("could not determine current executable")]
    CurrentExeFailed { err: std::io::Error },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("spec command parse error")]
    SpecCommandParseError {
        #[from]
        err: SpecCommandParseError,
    },
    #[error("spec discovery error")]
    DiscoveryError {
        #[from]
        err: DiscoveryError,
    },
    #[error("spec run error")]
    SpecRunError {
        #[from]
        err: SpecRunError,
    },
    #[error("invalid delivery retry policy")]
    RetryPolicyParseError {
        input: String,
        err: serde_json::Error,
    },
    #[error("worker error")]
    WorkerError {
        #[from]
        err: WorkerError,
    },
    #[error("error writing {what}")]
    WriteOutputError {
        what: &'static str,
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::CurrentExeFailed { .. }
            | Self::ConfigParseError { .. }
            | Self::ProfileNotFound { .. }
            | Self::SpecCommandParseError { .. }
            | Self::DiscoveryError { .. }
            | Self::SpecRunError { .. }
            | Self::RetryPolicyParseError { .. } => SpecfanExitCode::SETUP_ERROR,
            Self::WorkerError {
                err: WorkerError::DeliveryExhausted { .. },
            } => SpecfanExitCode::DELIVERY_FAILED,
            Self::WorkerError { .. } => SpecfanExitCode::WORKER_ERROR,
            Self::WriteOutputError { .. } => SpecfanExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    err.as_path().display().style(styles.bold)
                );
                None
            }
            Self::CurrentExeFailed { err } => {
                error!("could not determine the path to specfan for launching workers");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse specfan config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ProfileNotFound { err } => {
                error!("{err}");
                None
            }
            Self::SpecCommandParseError { err } => {
                error!("invalid spec command");
                Some(err as &dyn Error)
            }
            Self::DiscoveryError { err } => {
                error!("failed to discover specs");
                Some(err as &dyn Error)
            }
            Self::SpecRunError { err } => {
                error!("spec run failed");
                Some(err as &dyn Error)
            }
            Self::RetryPolicyParseError { input, err } => {
                error!(
                    "invalid delivery retry policy `{}`",
                    input.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::WorkerError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteOutputError { what, err } => {
                error!("error writing {what}");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
