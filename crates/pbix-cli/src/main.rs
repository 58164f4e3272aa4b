//! `pbixproj`: Power BI package and project folder converter.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use pbix_cli::logging::{LogConfig, LogFormat, init_logging};
use pbix_core::{ConversionError, Settings};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{run_compile, run_extract, run_info};
use crate::summary::{
    print_extract_summary, print_pack_summary, print_package_summary, print_settings,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(2);
        }
    };
    let log_config = log_config_from_cli(&cli, &settings);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let result = match &cli.command {
        Command::Extract(args) => run_extract(args, &settings).map(|o| print_extract_summary(&o)),
        Command::Compile(args) => run_compile(args, &settings).map(|o| print_pack_summary(&o)),
        Command::Info(args) => run_info(args).map(|s| print_package_summary(&s)),
        Command::Settings => {
            print_settings();
            Ok(())
        }
    };
    let exit_code = match result {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            if let Some(hint) = error
                .downcast_ref::<ConversionError>()
                .and_then(ConversionError::suggestion)
            {
                eprintln!("hint: {hint}");
            }
            1
        }
    };
    std::process::exit(exit_code);
}

/// Build logging configuration. Flags beat `RUST_LOG`, which beats the
/// `PBIXPROJ_LOG_*` settings.
fn log_config_from_cli(cli: &Cli, settings: &Settings) -> LogConfig {
    let explicit = cli.verbosity.is_present() || cli.log_level.is_some();
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        use_env_filter: !explicit,
        ..LogConfig::default()
    };
    if !explicit {
        config = config.with_directive(settings.log_level.clone());
    }
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        Some(LogFormatArg::Pretty) => LogFormat::Pretty,
        Some(LogFormatArg::Compact) => LogFormat::Compact,
        Some(LogFormatArg::Json) => LogFormat::Json,
        None => settings
            .log_format
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default(),
    };
    config = config.with_log_file(cli.log_file.clone());
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
