mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, GlobalArgs};
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub global: GlobalArgs,
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

    let ctx = Context {
        quiet: cli.quiet,
        global: cli.global,
    };

    match cli.command {
        Command::Scan(args) => commands::scan::run(&ctx, &args),
        Command::Groups { tags } => commands::groups::run(&ctx, tags),
        Command::Evaluate(args) => commands::evaluate::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Backup(args) => commands::backup::run(&ctx, &args),
        Command::Restore(args) => commands::restore::run(&ctx, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tagwarden", &mut io::stdout());
            Ok(())
        }
    }
}
