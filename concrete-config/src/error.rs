//! Error handling for concrete-config.

/// The error that can occur when working with configuration snapshots.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A [`concrete_types::Error`].
    #[error(transparent)]
    Types(#[from] concrete_types::Error),

    /// A compiler cannot produce code for a microarchitecture.
    #[error("Compiler {compiler}@{version} does not support microarchitecture {target}")]
    UnsupportedMicroarchitecture {
        /// The compiler name.
        compiler: String,
        /// The compiler version.
        version: String,
        /// The unsupported target.
        target: String,
    },

    /// A target name is not present in the target database.
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    /// A configuration entry is malformed.
    #[error("Invalid configuration for {scope}: {reason}")]
    InvalidEntry {
        /// The configuration scope, e.g. `packages:mpich`.
        scope: String,
        /// What is wrong with the entry.
        reason: String,
    },
}
