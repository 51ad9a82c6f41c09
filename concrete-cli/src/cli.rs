//! Command line argument handling.

use std::{collections::BTreeSet, path::PathBuf, str::FromStr};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::Error;

/// Command line argument handling for the `concrete` executable.
#[derive(Clone, Debug, Parser)]
#[command(about, author, name = "concrete", version)]
pub struct Cli {
    /// Log verbosity level
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Available subcommands
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for the `concrete` executable.
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Concretize specs with the ASP solver
    ///
    /// Exits non-zero when the input is unsatisfiable; the conflicting
    /// constraints are reported as rule text.
    Solve {
        /// Arguments for the solve command
        #[command(flatten)]
        args: SolveArgs,
    },
}

/// What `--show` may display.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum ShowOption {
    /// The generated ASP program.
    Asp,
    /// The raw solver output.
    Output,
    /// The concretized solutions.
    Solutions,
}

/// Parses the comma separated `--show` list; `all` selects everything.
pub fn parse_show(show: &str) -> Result<BTreeSet<ShowOption>, Error> {
    let mut options = BTreeSet::new();
    for part in show.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part == "all" {
            options.extend([ShowOption::Asp, ShowOption::Output, ShowOption::Solutions]);
            continue;
        }
        options.insert(ShowOption::from_str(part).map_err(|_| Error::InvalidShowOption {
            option: part.to_string(),
        })?);
    }
    if options.is_empty() {
        options.insert(ShowOption::Solutions);
    }
    Ok(options)
}

/// How extensively the DAG is traversed when printing trees.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Cover {
    /// Visit every node once.
    #[default]
    Nodes,
    /// Visit every edge once.
    Edges,
    /// Expand every path through the DAG.
    Paths,
}

/// Command line arguments for the solve command.
#[derive(Clone, Debug, Parser)]
#[command(about = "Concretize specs using an ASP solver", author, version)]
pub struct SolveArgs {
    /// Outputs: a comma separated list of asp, output, solutions, or all
    #[arg(long, default_value = "solutions", value_name = "WHAT")]
    pub show: String,

    /// Number of solutions to search (0 for all)
    #[arg(long, default_value_t = 0, value_name = "N")]
    pub models: u32,

    /// Print concrete specs as YAML
    #[arg(short = 'y', long)]
    pub yaml: bool,

    /// Print concrete specs as JSON
    #[arg(short = 'j', long)]
    pub json: bool,

    /// How extensively to traverse the DAG
    #[arg(short = 'c', long, value_enum, default_value_t = Cover::Nodes)]
    pub cover: Cover,

    /// Show fully qualified package names
    #[arg(short = 'N', long)]
    pub namespaces: bool,

    /// Show dependency types
    #[arg(short = 't', long)]
    pub types: bool,

    /// Print out timers for different solve phases
    #[arg(long)]
    pub timers: bool,

    /// Print out solver statistics
    #[arg(long)]
    pub stats: bool,

    /// The package repository definition
    #[arg(long, value_name = "FILE")]
    pub repo: PathBuf,

    /// The packages configuration (preferences and externals)
    #[arg(long, value_name = "FILE")]
    pub packages: Option<PathBuf>,

    /// The compiler configuration
    #[arg(long, value_name = "FILE")]
    pub compilers: Option<PathBuf>,

    /// The platform description
    #[arg(long, value_name = "FILE")]
    pub platform: Option<PathBuf>,

    /// The target database
    #[arg(long, value_name = "FILE")]
    pub targets: Option<PathBuf>,

    /// Packages whose test dependencies take part in the solve
    #[arg(long, value_name = "PACKAGE")]
    pub with_tests: Vec<String>,

    /// Specs of packages
    #[arg(value_name = "SPEC", required = true)]
    pub specs: Vec<String>,
}
