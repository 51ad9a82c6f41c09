//! Error handling for concrete-types.

/// The error that can occur when working with concrete-types.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A version string could not be recognized.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// A version range string could not be recognized.
    #[error("Invalid version range: {0}")]
    InvalidVersionRange(String),

    /// A spec literal could not be recognized.
    #[error("Invalid spec literal '{literal}': {reason}")]
    InvalidSpecLiteral {
        /// The offending literal.
        literal: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A compiler flag category is not known.
    #[error("Invalid compiler flag category: {0}")]
    InvalidFlagCategory(String),

    /// A dependency type is not known.
    #[error("Invalid dependency type: {0}")]
    InvalidDependencyType(String),

    /// Two constraints cannot hold at the same time.
    #[error("Cannot constrain {package}: {lhs} is incompatible with {rhs}")]
    IncompatibleConstraint {
        /// The package node on which the clash occurred.
        package: String,
        /// The constraint already present.
        lhs: String,
        /// The constraint that could not be merged in.
        rhs: String,
    },

    /// A spec operation required a package name, but none was set.
    #[error("Spec has no package name")]
    AnonymousSpec,

    /// A spec node that must exist in a DAG is missing.
    #[error("Spec DAG has no node named {0}")]
    MissingNode(String),
}
