//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use pbix_archive::Compression;
use pbix_model::PartKind;

#[derive(Parser)]
#[command(
    name = "pbixproj",
    version,
    about = "Convert Power BI packages to and from diffable project folders",
    long_about = "Convert Power BI .pbix packages to and from project folders.\n\n\
                  extract writes every part as a canonical, diffable file;\n\
                  compile packs a project folder back into a package.\n\n\
                  Settings are also read from PBIXPROJ_* environment variables;\n\
                  flags take precedence."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format [default: pretty, or PBIXPROJ_LOG_FORMAT].
    #[arg(long = "log-format", value_enum, global = true)]
    pub log_format: Option<LogFormatArg>,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract a package into a project folder.
    Extract(ExtractArgs),

    /// Compile a project folder into a package.
    #[command(alias = "pack")]
    Compile(CompileArgs),

    /// List the parts of a package.
    Info(InfoArgs),

    /// List the PBIXPROJ_* environment settings.
    Settings,
}

/// Options shared by both conversion directions.
#[derive(Args)]
pub struct PartArgs {
    /// Part kinds whose failures are skipped instead of failing the run
    /// (slot names, CustomVisuals, StaticResources, Unrecognized).
    #[arg(long = "optional", value_name = "KIND", value_delimiter = ',')]
    pub optional: Vec<PartKind>,
}

#[derive(Parser)]
pub struct ExtractArgs {
    /// Package to extract.
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,

    /// Project folder to write (default: the package path without extension).
    #[arg(value_name = "PROJECT")]
    pub project: Option<PathBuf>,

    #[command(flatten)]
    pub parts: PartArgs,

    /// Write regenerated identifiers as found instead of restoring their
    /// recorded values.
    #[arg(long = "no-stable-ids")]
    pub no_stable_ids: bool,
}

#[derive(Parser)]
pub struct CompileArgs {
    /// Project folder to compile.
    #[arg(value_name = "PROJECT")]
    pub project: PathBuf,

    /// Package to write (default: <PROJECT>.pbix next to the folder).
    #[arg(value_name = "PACKAGE")]
    pub package: Option<PathBuf>,

    #[command(flatten)]
    pub parts: PartArgs,

    /// Compression of package entries [default: deflated, or PBIXPROJ_COMPRESSION].
    #[arg(long = "compression", value_name = "METHOD")]
    pub compression: Option<Compression>,
}

#[derive(Parser)]
pub struct InfoArgs {
    /// Package to inspect.
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
