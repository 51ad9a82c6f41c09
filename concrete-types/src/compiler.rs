//! Compiler constraints on spec nodes.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{Version, VersionRequest};

/// A compiler constraint: a compiler name plus a version request.
///
/// Written as `%gcc@4.5:` in spec literals. A concrete compiler carries a
/// point version request.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CompilerConstraint {
    /// The compiler name, e.g. `gcc` or `clang`.
    pub name: String,
    /// The acceptable compiler versions.
    pub versions: VersionRequest,
}

impl CompilerConstraint {
    /// Creates a constraint on a compiler name with any version.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: VersionRequest::Any,
        }
    }

    /// Creates a concrete compiler from a name and a single version.
    pub fn concrete(name: &str, version: Version) -> Self {
        Self {
            name: name.to_string(),
            versions: VersionRequest::Exact(version),
        }
    }

    /// Returns the single version of a concrete compiler constraint.
    pub fn concrete_version(&self) -> Option<&Version> {
        self.versions.as_exact()
    }

    /// Returns whether the constraint pins name and version.
    pub fn is_concrete(&self) -> bool {
        self.concrete_version().is_some()
    }
}

impl Display for CompilerConstraint {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.name)?;
        if !self.versions.is_any() {
            write!(fmt, "@{}", self.versions)?;
        }
        Ok(())
    }
}
