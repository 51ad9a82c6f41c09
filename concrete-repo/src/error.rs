//! Error handling for concrete-repo.

/// The error that can occur when working with package repositories.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A [`concrete_types::Error`].
    #[error(transparent)]
    Types(#[from] concrete_types::Error),

    /// A referenced package does not exist in the repository.
    #[error("Package {0} not found in repository")]
    UnknownPackage(String),

    /// A package was added twice to the same repository.
    #[error("Package {0} is already present in the repository")]
    DuplicatePackage(String),

    /// A descriptor declares something inconsistent.
    #[error("Invalid descriptor for package {package}: {reason}")]
    InvalidDescriptor {
        /// The package whose descriptor is broken.
        package: String,
        /// What is wrong with it.
        reason: String,
    },
}
