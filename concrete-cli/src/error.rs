//! Error handling for the concrete CLI.

use std::path::PathBuf;

/// The error that can occur when running the CLI.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`concrete_solve::Error`].
    #[error(transparent)]
    Solve(#[from] concrete_solve::Error),

    /// A [`concrete_repo::Error`].
    #[error(transparent)]
    Repo(#[from] concrete_repo::Error),

    /// A [`concrete_config::Error`].
    #[error(transparent)]
    Config(#[from] concrete_config::Error),

    /// A [`concrete_types::Error`].
    #[error(transparent)]
    Types(#[from] concrete_types::Error),

    /// A file could not be read.
    #[error("Cannot read {path}: {source}")]
    Read {
        /// The offending path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("Cannot parse {path}: {message}")]
    Parse {
        /// The offending path.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },

    /// Output could not be written.
    #[error("Cannot write output: {0}")]
    Write(#[from] std::io::Error),

    /// A concrete spec could not be serialized.
    #[error("Cannot serialize spec: {0}")]
    Serialize(String),

    /// The `--show` list contains an unknown option.
    #[error("Invalid option for '--show': '{option}' (choose from: asp, output, solutions, all)")]
    InvalidShowOption {
        /// The rejected option.
        option: String,
    },

    /// The input specs are unsatisfiable.
    #[error("Unsatisfiable spec.")]
    Unsatisfiable,
}
