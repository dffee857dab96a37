// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{MaxWorkers, RetryPolicy, retry_policy::deserialize_retry_policy};
use crate::errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Configuration for specfan.
#[derive(Clone, Debug)]
pub struct SpecfanConfig {
    profiles: BTreeMap<String, ProfileImpl>,
}

impl SpecfanConfig {
    /// The location of the repository config, relative to the directory specfan runs in.
    pub const CONFIG_PATH: &'static str = ".config/specfan.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The name of the profile used if none is specified.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the config from the given file, or if not present from `.config/specfan.toml` in
    /// the given directory.
    ///
    /// If the file isn't specified and the directory doesn't have `.config/specfan.toml`, uses the
    /// default config options.
    pub fn from_sources(
        config_file: Option<&Utf8Path>,
        root: &Utf8Path,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, required): (Utf8PathBuf, bool) = match config_file {
            Some(file) => (file.to_owned(), true),
            None => (root.join(Self::CONFIG_PATH), false),
        };
        debug!(%config_file, required, "reading specfan config");

        let builder = Config::builder()
            .add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::new(config_file.as_str(), FileFormat::Toml).required(required));

        Self::build(&config_file, builder)
    }

    /// Returns the config with only the built-in defaults.
    pub fn default_config() -> Self {
        let builder =
            Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml));
        Self::build(Utf8Path::new("<default config>"), builder)
            .expect("default config is always valid")
    }

    /// Returns the profile with the given name, the default profile if not specified, or an error
    /// if a profile was specified but not found.
    pub fn profile(&self, name: Option<&str>) -> Result<SpecfanProfile<'_>, ProfileNotFound> {
        let name = name.unwrap_or(Self::DEFAULT_PROFILE);
        let (name, custom) = self
            .profiles
            .get_key_value(name)
            .ok_or_else(|| ProfileNotFound::new(name, self.profiles.keys()))?;
        let default = self
            .profiles
            .get(Self::DEFAULT_PROFILE)
            .expect("build() checks for the default profile");
        Ok(SpecfanProfile {
            name,
            custom,
            default,
        })
    }

    // ---
    // Helper methods
    // ---

    fn build(
        config_file: &Utf8Path,
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigParseError> {
        let deserialized: ConfigImpl = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| {
                ConfigParseError::new(config_file, ConfigParseErrorKind::BuildError(Box::new(err)))
            })?;

        let config = Self {
            profiles: deserialized.profile,
        };
        config.validate(config_file)?;
        Ok(config)
    }

    fn validate(&self, config_file: &Utf8Path) -> Result<(), ConfigParseError> {
        let incomplete =
            |key| ConfigParseError::new(config_file, ConfigParseErrorKind::DefaultProfileIncomplete { key });

        let Some(default) = self.profiles.get(Self::DEFAULT_PROFILE) else {
            return Err(incomplete("spec-command"));
        };
        if default.spec_command.is_none() {
            return Err(incomplete("spec-command"));
        }
        if default.run_options.is_none() {
            return Err(incomplete("run-options"));
        }
        if default.max_workers.is_none() {
            return Err(incomplete("max-workers"));
        }
        if default.force_color.is_none() {
            return Err(incomplete("force-color"));
        }
        Ok(())
    }
}

/// A specfan profile, with every unset key falling back to the default profile.
#[derive(Clone, Copy, Debug)]
pub struct SpecfanProfile<'cfg> {
    name: &'cfg str,
    custom: &'cfg ProfileImpl,
    default: &'cfg ProfileImpl,
}

impl<'cfg> SpecfanProfile<'cfg> {
    /// Returns the name of this profile.
    pub fn name(&self) -> &'cfg str {
        self.name
    }

    /// Returns the command used to run a single spec.
    pub fn spec_command(&self) -> &'cfg str {
        self.pick(|p| p.spec_command.as_deref())
    }

    /// Returns the options passed to the spec command.
    pub fn run_options(&self) -> &'cfg str {
        self.pick(|p| p.run_options.as_deref())
    }

    /// Returns the spec paths or globs that are never run.
    pub fn exclude(&self) -> &'cfg [String] {
        self.custom
            .exclude
            .as_deref()
            .or(self.default.exclude.as_deref())
            .unwrap_or_default()
    }

    /// Returns the maximum number of workers alive at once.
    pub fn max_workers(&self) -> MaxWorkers {
        self.pick(|p| p.max_workers)
    }

    /// Returns whether the spec engine is asked to emit colors.
    pub fn force_color(&self) -> bool {
        self.pick(|p| p.force_color)
    }

    /// Returns the policy workers use to retry delivering results.
    ///
    /// A configured table replaces the built-in [`RetryPolicy::default`] whole; the two are never
    /// merged key by key.
    pub fn delivery_retries(&self) -> RetryPolicy {
        self.custom
            .delivery_retries
            .or(self.default.delivery_retries)
            .unwrap_or_default()
    }

    fn pick<T>(&self, f: impl Fn(&'cfg ProfileImpl) -> Option<T>) -> T {
        f(self.custom)
            .or_else(|| f(self.default))
            .expect("validate() checks that the default profile sets every key")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigImpl {
    #[serde(default)]
    profile: BTreeMap<String, ProfileImpl>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ProfileImpl {
    #[serde(default)]
    spec_command: Option<String>,
    #[serde(default)]
    run_options: Option<String>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
    #[serde(default)]
    max_workers: Option<MaxWorkers>,
    #[serde(default)]
    force_color: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_retry_policy")]
    delivery_retries: Option<RetryPolicy>,
}
