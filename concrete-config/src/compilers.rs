//! Configured compilers.

use std::fmt::{Display, Formatter};

use concrete_types::{CompilerConstraint, FlagMap, Version};
use serde::{Deserialize, Serialize};

/// A compiler installation known to the configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CompilerEntry {
    /// The compiler name, e.g. `gcc`.
    pub name: String,
    /// The compiler version.
    pub version: Version,
    /// The operating system the compiler runs on.
    pub operating_system: String,
    /// Default compiler flags by category.
    #[serde(default)]
    pub flags: FlagMap,
    /// Modules that must be loaded to use the compiler.
    #[serde(default)]
    pub modules: Vec<String>,
}

impl CompilerEntry {
    /// Creates an entry without flags or modules.
    pub fn new(name: &str, version: Version, operating_system: &str) -> Self {
        Self {
            name: name.to_string(),
            version,
            operating_system: operating_system.to_string(),
            flags: FlagMap::new(),
            modules: Vec::new(),
        }
    }

    /// Returns the concrete compiler constraint this entry satisfies.
    pub fn constraint(&self) -> CompilerConstraint {
        CompilerConstraint::concrete(&self.name, self.version.clone())
    }

    /// Returns whether this entry satisfies `constraint`.
    pub fn satisfies(&self, constraint: &CompilerConstraint) -> bool {
        self.name == constraint.name && constraint.versions.satisfied_by(&self.version)
    }
}

impl Display for CompilerEntry {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}@{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use testresult::TestResult;

    use super::*;

    #[test]
    fn entry_satisfies_version_requests() -> TestResult {
        let entry = CompilerEntry::new("gcc", Version::from_str("4.5.0")?, "debian6");
        let mut constraint = CompilerConstraint::new("gcc");
        assert!(entry.satisfies(&constraint));

        constraint.versions = concrete_types::VersionRequest::from_str("4.5")?;
        assert!(entry.satisfies(&constraint));

        constraint.versions = concrete_types::VersionRequest::from_str("4.7:")?;
        assert!(!entry.satisfies(&constraint));

        assert!(!entry.satisfies(&CompilerConstraint::new("clang")));
        Ok(())
    }
}
