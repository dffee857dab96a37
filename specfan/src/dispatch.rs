// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts},
    worker::WorkerOpts,
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Subcommand};
use owo_colors::{OwoColorize, Style};
use specfan_metadata::SpecfanExitCode;
use specfan_runner::{
    config::{MaxWorkers, SpecfanConfig, SpecfanProfile},
    errors::SpecRunError,
    executor::CommandExecutor,
    list::SpecList,
    report::ReportOptions,
    runner::{ProcessLauncher, SpecRunnerBuilder, WorkerSettings},
};
use std::io::Write;
use tracing::warn;

/// Run every spec file in its own process and fold the results into one report.
///
/// Each glob forms a group. Groups run one after another; the specs within a group run in
/// parallel.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct SpecfanApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl SpecfanApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        match &self.command {
            // Worker processes should never use coloring.
            Command::Worker(_) => OutputContext::color_never_init(),
            Command::Run(_) | Command::List(_) => self.output.init(),
        }
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        match self.command {
            Command::Run(opts) => opts.exec(output),
            Command::List(opts) => opts.exec(output),
            Command::Worker(opts) => opts.exec(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run specs
    Run(RunOpts),

    /// List the specs that would be run, grouped by glob
    List(ListOpts),

    /// Run a single spec and deliver its result to a coordinator
    #[command(name = specfan_runner::worker::WORKER_SUBCOMMAND_NAME, hide = true)]
    Worker(WorkerOpts),
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: .config/specfan.toml in the current directory]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// The specfan profile to use
    #[arg(long, short = 'P', env = "SPECFAN_PROFILE")]
    profile: Option<String>,
}

impl ConfigOpts {
    fn load(&self, root: &Utf8Path) -> Result<SpecfanConfig> {
        Ok(SpecfanConfig::from_sources(
            self.config_file.as_deref(),
            root,
        )?)
    }
}

#[derive(Debug, Args)]
struct DiscoveryOpts {
    /// Spec paths or globs; each one forms a group
    #[arg(required = true, value_name = "GLOB")]
    globs: Vec<String>,

    /// Spec paths or globs to skip, in addition to the profile's `exclude`
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,
}

impl DiscoveryOpts {
    fn discover(&self, profile: &SpecfanProfile<'_>, root: &Utf8Path) -> Result<SpecList> {
        let mut exclude = profile.exclude().to_vec();
        exclude.extend(self.exclude.iter().cloned());
        Ok(SpecList::discover(&self.globs, &exclude, root)?)
    }
}

#[derive(Debug, Args)]
struct RunOpts {
    #[clap(flatten)]
    config: ConfigOpts,

    #[clap(flatten)]
    discovery: DiscoveryOpts,

    /// Command used to run each spec, e.g. "bundle exec rspec"
    #[arg(long, allow_hyphen_values = true, value_name = "COMMAND")]
    spec_command: Option<String>,

    /// Options passed to the spec command before the spec path
    #[arg(long, allow_hyphen_values = true, value_name = "OPTIONS")]
    run_options: Option<String>,

    /// Maximum number of workers alive at once ("unbounded", "num-cpus", or an integer)
    #[arg(
        long,
        short = 'j',
        allow_negative_numbers = true,
        value_name = "N",
        env = "SPECFAN_MAX_WORKERS"
    )]
    max_workers: Option<MaxWorkers>,

    /// Ask the spec engine for colored output
    #[arg(long, overrides_with = "no_force_color")]
    force_color: bool,

    /// Don't ask the spec engine for colored output
    #[arg(long, overrides_with = "force_color")]
    no_force_color: bool,
}

impl RunOpts {
    fn force_color(&self, profile: &SpecfanProfile<'_>) -> bool {
        match (self.force_color, self.no_force_color) {
            (true, _) => true,
            (_, true) => false,
            (false, false) => profile.force_color(),
        }
    }

    fn exec(self, output: OutputContext) -> Result<i32> {
        let root = current_dir()?;
        let config = self.config.load(&root)?;
        let profile = config.profile(self.config.profile.as_deref())?;

        let settings = WorkerSettings {
            spec_command: self
                .spec_command
                .clone()
                .unwrap_or_else(|| profile.spec_command().to_owned()),
            run_options: self
                .run_options
                .clone()
                .unwrap_or_else(|| profile.run_options().to_owned()),
            force_color: self.force_color(&profile),
            delivery_retries: profile.delivery_retries(),
        };
        // Reject a malformed spec command before any worker starts.
        CommandExecutor::new(
            &settings.spec_command,
            &settings.run_options,
            settings.force_color,
        )?;

        let spec_list = self.discovery.discover(&profile, &root)?;
        if spec_list.is_empty() {
            warn!(
                "no specs matched {}",
                self.discovery.globs.join(", ").style(output.stderr_styles().bold)
            );
            return Ok(SpecfanExitCode::NO_SPECS_RUN);
        }

        let launcher = ProcessLauncher::current_exe(settings)
            .map_err(|err| ExpectedError::CurrentExeFailed { err })?;
        let mut builder = SpecRunnerBuilder::default();
        builder.set_max_workers(self.max_workers.unwrap_or_else(|| profile.max_workers()));
        let report = builder
            .build(&spec_list, launcher)
            .map_err(SpecRunError::from)?
            .execute()?;

        let mut stdout = std::io::stdout().lock();
        report
            .write_to(
                &mut stdout,
                ReportOptions {
                    colorize: output.colorize_stdout(),
                    verbose: output.verbose,
                },
            )
            .map_err(|err| ExpectedError::WriteOutputError {
                what: "report",
                err,
            })?;

        if report.classification().is_failure() {
            Ok(SpecfanExitCode::SPEC_RUN_FAILED)
        } else {
            Ok(SpecfanExitCode::OK)
        }
    }
}

#[derive(Debug, Args)]
struct ListOpts {
    #[clap(flatten)]
    config: ConfigOpts,

    #[clap(flatten)]
    discovery: DiscoveryOpts,
}

impl ListOpts {
    fn exec(self, output: OutputContext) -> Result<i32> {
        let root = current_dir()?;
        let config = self.config.load(&root)?;
        let profile = config.profile(self.config.profile.as_deref())?;
        let spec_list = self.discovery.discover(&profile, &root)?;

        let heading = if output.colorize_stdout() {
            Style::new().bold()
        } else {
            Style::new()
        };
        let mut stdout = std::io::stdout().lock();
        let write_err = |err| ExpectedError::WriteOutputError {
            what: "spec list",
            err,
        };
        for group in spec_list.groups() {
            writeln!(stdout, "{}:", group.pattern.style(heading)).map_err(write_err)?;
            for spec in &group.specs {
                writeln!(stdout, "    {spec}").map_err(write_err)?;
            }
        }
        stdout.flush().map_err(write_err)?;

        if spec_list.is_empty() {
            Ok(SpecfanExitCode::NO_SPECS_RUN)
        } else {
            Ok(SpecfanExitCode::OK)
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })
}
