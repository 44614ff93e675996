mod cli;
mod commands;
mod config;
mod store;
mod system;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ConfigCommand};
use config::Settings;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub settings: Settings,
    /// Settings file given on the command line
    pub config_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "sysreconcile", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        settings: Settings::load(cli.config.as_deref())?,
        config_path: cli.config,
    };

    match cli.command {
        Command::Startup => commands::startup::run(&ctx),
        Command::Status => commands::status::run(&ctx),
        Command::Show(args) => commands::show::run(&ctx, args.json),
        Command::Apply(args) => commands::apply::run(&ctx, &args.file, args.yes, args.dry_run),
        Command::Edit(args) => commands::edit::run(&ctx, &args.file, args.dry_run),
        Command::Config(cmd) => match cmd {
            ConfigCommand::Show => commands::config::show(&ctx),
            ConfigCommand::Path => commands::config::path(&ctx),
        },
        Command::Completions { .. } => Ok(()),
    }
}
