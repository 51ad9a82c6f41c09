//! Command line interface for the concrete package concretizer.

use std::process::ExitCode;

use clap::Parser;
use concrete_cli::cli::{Cli, Command};
use log::{debug, error};
use simplelog::{Config, SimpleLogger};

mod commands;

use commands::solve;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    if SimpleLogger::init(level, Config::default()).is_err() {
        debug!("Not initializing another logger, as one is initialized already.");
    }

    let result = match cli.command {
        Command::Solve { args } => solve(args, &mut std::io::stdout()),
    };

    if let Err(error) = result {
        error!("{error}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
