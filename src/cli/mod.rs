//! Command-line interface definitions for the `stackreach` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::Parser;

/// Top-level CLI for the `stackreach` binary.
#[derive(Debug, Parser)]
#[command(
    name = "stackreach",
    about = "Validate OpenStack launch files and resolve instance SSH addresses",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Validate a launch file and print the normalised settings.
    #[command(
        name = "validate",
        about = "Validate a launch file and print the normalised settings"
    )]
    Validate(ValidateCommand),
    /// Resolve the address an SSH client should use for an instance.
    #[command(
        name = "resolve",
        about = "Resolve the address an SSH client should use for an instance"
    )]
    Resolve(ResolveCommand),
    /// List instances visible to the configured project.
    #[command(
        name = "instances",
        about = "List instances visible to the configured project"
    )]
    Instances,
}

/// Arguments for the `stackreach validate` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ValidateCommand {
    /// Path to a TOML launch file with `[launch]` and optional `[variables]`
    /// tables.
    #[arg(value_name = "FILE")]
    pub(crate) launch_file: Utf8PathBuf,
}

/// Arguments for the `stackreach resolve` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ResolveCommand {
    /// Path to the launch file the instance was created from.
    #[arg(value_name = "FILE")]
    pub(crate) launch_file: Utf8PathBuf,
    /// Identifier of the instance to resolve.
    #[arg(long, value_name = "ID")]
    pub(crate) instance_id: String,
    /// Decrypted OpenSSH private key used to prepare session credentials.
    #[arg(long, value_name = "PATH")]
    pub(crate) private_key: Option<Utf8PathBuf>,
    /// Stop after this many resolution attempts.
    ///
    /// Overrides `max_attempts` from configuration. The SSH timeout in the
    /// launch file still bounds the total wait.
    #[arg(long, value_name = "N")]
    pub(crate) max_attempts: Option<u32>,
}
