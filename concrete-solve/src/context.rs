//! The solve context: every process-wide input, snapshotted.

use std::collections::BTreeSet;

use concrete_config::{CompilerEntry, PackagesConfig, Platform, TargetDatabase};
use concrete_repo::{Repository, TestPolicy};

use crate::Error;

/// All inputs of a solve, gathered once and passed by reference.
///
/// Nothing in the setup or builder paths reads configuration from
/// anywhere else; mutating the underlying sources mid-solve is therefore
/// impossible by construction.
#[derive(Debug)]
pub struct SolveContext<'a> {
    /// The package repository.
    pub repo: &'a dyn Repository,
    /// The normalized `packages` configuration.
    pub packages: PackagesConfig,
    /// The configured compilers.
    pub compilers: &'a [CompilerEntry],
    /// The platform being solved for.
    pub platform: &'a Platform,
    /// The target database.
    pub targets: &'a TargetDatabase,
    /// Which packages may attach test dependencies.
    pub tests: TestPolicy,
    /// Whether input compilers must exist in the configuration.
    pub strict_compilers: bool,
}

impl<'a> SolveContext<'a> {
    /// Assembles a context, normalizing the packages configuration
    /// against the repository.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an external entry under a
    /// virtual key is malformed.
    pub fn new(
        repo: &'a dyn Repository,
        packages: &PackagesConfig,
        compilers: &'a [CompilerEntry],
        platform: &'a Platform,
        targets: &'a TargetDatabase,
    ) -> Result<Self, Error> {
        Ok(Self {
            repo,
            packages: packages.normalized(repo)?,
            compilers,
            platform,
            targets,
            tests: TestPolicy::None,
            strict_compilers: false,
        })
    }

    /// Sets the test dependency policy.
    pub fn with_tests(mut self, tests: TestPolicy) -> Self {
        self.tests = tests;
        self
    }

    /// Enables strict compiler existence checking.
    pub fn with_strict_compilers(mut self, strict: bool) -> Self {
        self.strict_compilers = strict;
        self
    }

    /// Returns the names of packages that must not be built from source.
    pub fn external_only_packages(&self) -> BTreeSet<String> {
        self.packages
            .iter()
            .filter(|(name, entry)| *name != "all" && !entry.buildable)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}
