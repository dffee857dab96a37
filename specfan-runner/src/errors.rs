// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by specfan.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt, io, net::SocketAddr};
use thiserror::Error;

/// Displays an error followed by its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(err) = source {
            write!(f, "\n  - {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse specfan config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building or deserializing the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// The default profile is missing a key that every other profile falls back to.
    #[error("the default profile must set `{key}`")]
    DefaultProfileIncomplete {
        /// The missing key.
        key: &'static str,
    },
}

/// An error which indicates that a profile was requested but not known to specfan.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// An error that occurs while parsing a [`MaxWorkers`](crate::config::MaxWorkers) value.
#[derive(Clone, Debug, Error)]
#[error("unrecognized value for max-workers: {input}")]
pub struct MaxWorkersParseError {
    input: String,
}

impl MaxWorkersParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurs while parsing the spec command or its options.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecCommandParseError {
    /// The command line couldn't be split into words.
    #[error("failed to split `{input}` into arguments")]
    Split {
        /// The input that failed to split.
        input: String,

        /// The underlying error.
        #[source]
        err: shell_words::ParseError,
    },

    /// The spec command is empty.
    #[error("the spec command is empty")]
    Empty,
}

/// An error that occurs while discovering specs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// A spec or exclude glob is invalid.
    #[error("invalid glob `{pattern}`")]
    InvalidGlob {
        /// The pattern that failed to compile.
        pattern: String,

        /// The underlying error.
        #[source]
        err: globset::Error,
    },

    /// Walking a directory failed.
    #[error("error while walking `{root}`")]
    Walk {
        /// The directory being walked.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// A discovered path is not valid UTF-8.
    #[error("discovered path `{}` is not valid UTF-8", .path.display())]
    NonUtf8Path {
        /// The path.
        path: std::path::PathBuf,
    },
}

/// An error that occurs while delivering a spec result to the aggregator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeliveryError {
    /// Connecting to the aggregator failed.
    #[error("failed to connect to aggregator at {addr}")]
    Connect {
        /// The aggregator's address.
        addr: SocketAddr,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// Reading from or writing to the aggregator connection failed.
    #[error("I/O error talking to aggregator at {addr}")]
    Io {
        /// The aggregator's address.
        addr: SocketAddr,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The aggregator closed the connection before responding.
    #[error("aggregator at {addr} closed the connection without responding")]
    ConnectionClosed {
        /// The aggregator's address.
        addr: SocketAddr,
    },

    /// A message couldn't be encoded or decoded.
    #[error("malformed aggregator message")]
    Protocol {
        /// The underlying error.
        #[source]
        err: serde_json::Error,
    },

    /// The aggregator refused the request.
    #[error("aggregator rejected the result: {message}")]
    Rejected {
        /// The reason given by the aggregator.
        message: String,
    },
}

impl DeliveryError {
    /// Returns true if this is a connection-level failure that may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Io { .. } | Self::ConnectionClosed { .. } => true,
            Self::Protocol { .. } | Self::Rejected { .. } => false,
        }
    }
}

/// An error that occurs within a worker.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkerError {
    /// Delivery failed with an error that isn't worth retrying.
    #[error("failed to deliver result for `{spec}`")]
    Delivery {
        /// The spec whose result wasn't delivered.
        spec: String,

        /// The underlying error.
        #[source]
        err: DeliveryError,
    },

    /// Delivery kept failing until the retry policy was exhausted.
    #[error("gave up delivering result for `{spec}` after {attempts} attempts")]
    DeliveryExhausted {
        /// The spec whose result wasn't delivered.
        spec: String,

        /// The number of attempts made.
        attempts: u32,

        /// The error from the last attempt.
        #[source]
        err: DeliveryError,
    },
}

/// An error that occurs while launching or waiting for a worker.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// The worker process couldn't be spawned.
    #[error("failed to spawn worker `{program}`")]
    Spawn {
        /// The program being spawned.
        program: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// Waiting for the worker process failed.
    #[error("failed to wait for worker")]
    Wait {
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// An in-process worker panicked.
    #[error("worker panicked: {message}")]
    Panicked {
        /// The panic message, if it was a string.
        message: String,
    },

    /// An in-process worker was cancelled before it finished.
    #[error("worker was cancelled")]
    Cancelled,
}

/// An error that occurs while building a [`SpecRunner`](crate::runner::SpecRunner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] io::Error),
}

/// An error that occurs while executing a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecRunError {
    /// The aggregator couldn't be published on a local address.
    #[error("failed to bind aggregator listener")]
    AggregatorBind(#[source] io::Error),

    /// The runner couldn't be built.
    #[error(transparent)]
    Build(#[from] SpecRunnerBuildError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn display_error_chain() {
        let err = WorkerError::DeliveryExhausted {
            spec: "spec/a_spec.rb".to_owned(),
            attempts: 3,
            err: DeliveryError::Connect {
                addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
                err: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            },
        };
        assert_eq!(
            DisplayErrorChain::new(&err).to_string(),
            indoc! {"
                gave up delivering result for `spec/a_spec.rb` after 3 attempts
                  caused by:
                  - failed to connect to aggregator at 127.0.0.1:4000
                  - connection refused"}
        );
    }

    #[test]
    fn display_error_without_source() {
        assert_eq!(
            DisplayErrorChain::new(LaunchError::Cancelled).to_string(),
            "worker was cancelled"
        );
    }
}
