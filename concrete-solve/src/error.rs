//! Error handling for concrete-solve.

/// The error that can occur while setting up or running a solve.
///
/// An unsatisfiable solve is deliberately not an error: it is reported
/// through [`SolveResult::satisfiable`](crate::SolveResult) so that
/// callers can inspect the unsatisfiable cores.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`concrete_types::Error`].
    #[error(transparent)]
    Types(#[from] concrete_types::Error),

    /// A [`concrete_repo::Error`]; carries unknown-package failures.
    #[error(transparent)]
    Repo(#[from] concrete_repo::Error),

    /// A [`concrete_config::Error`]; carries configuration failures.
    #[error(transparent)]
    Config(#[from] concrete_config::Error),

    /// Strict compiler checking was requested for a compiler that is not
    /// configured.
    #[error("Compiler %{0} is not available")]
    UnavailableCompiler(String),

    /// An injected variant value failed validation.
    #[error("Invalid value '{value}' for variant {variant} of package {package}")]
    InvalidVariantValue {
        /// The package carrying the variant.
        package: String,
        /// The variant name.
        variant: String,
        /// The rejected value.
        value: String,
    },

    /// A grounding or backend inconsistency.
    #[error("Internal solver error: {0}")]
    Internal(String),
}
