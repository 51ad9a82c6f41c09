//! The microarchitecture target database.

use std::collections::BTreeMap;

use concrete_types::Version;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A microarchitecture target.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Target {
    /// The target name, e.g. `haswell`.
    pub name: String,
    /// The family the target belongs to, e.g. `x86_64`.
    pub family: String,
    /// The immediate parent targets.
    #[serde(default)]
    pub parents: Vec<String>,
    /// All ancestors, ordered nearest first and ending at the family.
    #[serde(default)]
    pub ancestors: Vec<String>,
    /// Per compiler name, the least compiler version that can generate
    /// code for this target.
    #[serde(default)]
    pub compilers: BTreeMap<String, Version>,
}

impl Target {
    /// Returns the optimization flags `compiler` needs for this target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMicroarchitecture`] when the compiler
    /// is unknown to the target or too old for it.
    pub fn optimization_flags(&self, compiler: &str, version: &Version) -> Result<String, Error> {
        let unsupported = || Error::UnsupportedMicroarchitecture {
            compiler: compiler.to_string(),
            version: version.to_string(),
            target: self.name.clone(),
        };
        let minimum = self.compilers.get(compiler).ok_or_else(unsupported)?;
        if version < minimum {
            return Err(unsupported());
        }
        Ok(format!("-march={}", self.name))
    }

    /// Returns whether this target is `other` or one of its ancestors.
    pub fn is_ancestor_of_or_self(&self, other: &Target) -> bool {
        self.name == other.name || other.ancestors.iter().any(|a| *a == self.name)
    }
}

/// The database of known targets, indexed by name.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TargetDatabase {
    targets: BTreeMap<String, Target>,
}

impl TargetDatabase {
    /// Creates a database from a list of targets.
    pub fn new(targets: impl IntoIterator<Item = Target>) -> Self {
        Self {
            targets: targets
                .into_iter()
                .map(|target| (target.name.clone(), target))
                .collect(),
        }
    }

    /// Returns the target named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTarget`] if the database has no such
    /// target.
    pub fn get(&self, name: &str) -> Result<&Target, Error> {
        self.targets
            .get(name)
            .ok_or_else(|| Error::UnknownTarget(name.to_string()))
    }

    /// Returns whether the database knows `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// Iterates over all targets in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Returns `name` and its ancestors, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTarget`] if `name` or one of its recorded
    /// ancestors is missing from the database.
    pub fn compatibility_family(&self, name: &str) -> Result<Vec<&Target>, Error> {
        let target = self.get(name)?;
        let mut family = vec![target];
        for ancestor in &target.ancestors {
            family.push(self.get(ancestor)?);
        }
        Ok(family)
    }

    /// Returns every target satisfying an inclusive range over the
    /// microarchitecture partial order.
    ///
    /// A target satisfies the lower bound when the bound is one of its
    /// ancestors (or itself), and the upper bound when it is an ancestor
    /// of the bound (or the bound itself).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTarget`] for an unknown bound.
    pub fn satisfying_range(
        &self,
        lo: Option<&str>,
        hi: Option<&str>,
    ) -> Result<Vec<&Target>, Error> {
        let lo = lo.map(|name| self.get(name)).transpose()?;
        let hi = hi.map(|name| self.get(name)).transpose()?;
        Ok(self
            .iter()
            .filter(|candidate| {
                lo.is_none_or(|lo| lo.is_ancestor_of_or_self(candidate))
                    && hi.is_none_or(|hi| candidate.is_ancestor_of_or_self(hi))
            })
            .collect())
    }

    /// Creates the sample `x86_64` database used by fixtures and demos.
    ///
    /// It covers the chain `x86_64 < core2 < nehalem < haswell` plus the
    /// unrelated family member `k10`, with `gcc` and `clang` support
    /// thresholds spread over the chain.
    pub fn mock_x86_64() -> Self {
        fn version(input: &str) -> Version {
            input.parse().expect("valid sample version")
        }

        let chain = ["x86_64", "core2", "nehalem", "haswell"];
        let mut targets = Vec::new();
        for (depth, name) in chain.iter().enumerate() {
            let mut ancestors: Vec<String> =
                chain[..depth].iter().rev().map(|a| a.to_string()).collect();
            let parents = ancestors.first().cloned().into_iter().collect();
            let mut compilers = BTreeMap::new();
            // Older gcc releases stop at nehalem; clang covers the chain.
            if depth < 3 {
                compilers.insert("gcc".to_string(), version("4.5"));
            } else {
                compilers.insert("gcc".to_string(), version("4.9"));
            }
            compilers.insert("clang".to_string(), version("3.3"));
            targets.push(Target {
                name: name.to_string(),
                family: "x86_64".to_string(),
                parents,
                ancestors,
                compilers,
            });
        }
        targets.push(Target {
            name: "k10".to_string(),
            family: "x86_64".to_string(),
            parents: vec!["x86_64".to_string()],
            ancestors: vec!["x86_64".to_string()],
            compilers: BTreeMap::from([("gcc".to_string(), version("4.5"))]),
        });
        Self::new(targets)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn optimization_flags_respect_support_thresholds() -> TestResult {
        let db = TargetDatabase::mock_x86_64();
        let haswell = db.get("haswell")?;

        assert_eq!(
            haswell.optimization_flags("gcc", &Version::from_str("4.9.3")?)?,
            "-march=haswell"
        );
        assert!(matches!(
            haswell.optimization_flags("gcc", &Version::from_str("4.5.0")?),
            Err(Error::UnsupportedMicroarchitecture { .. })
        ));
        assert!(matches!(
            haswell.optimization_flags("xlc", &Version::from_str("16.1")?),
            Err(Error::UnsupportedMicroarchitecture { .. })
        ));
        Ok(())
    }

    #[rstest]
    #[case(Some("core2"), None, &["core2", "haswell", "nehalem"])]
    #[case(None, Some("nehalem"), &["core2", "nehalem", "x86_64"])]
    #[case(Some("x86_64"), Some("x86_64"), &["x86_64"])]
    fn range_satisfaction(
        #[case] lo: Option<&str>,
        #[case] hi: Option<&str>,
        #[case] expected: &[&str],
    ) -> TestResult {
        let db = TargetDatabase::mock_x86_64();
        let names: Vec<&str> = db
            .satisfying_range(lo, hi)?
            .iter()
            .map(|target| target.name.as_str())
            .collect();
        assert_eq!(names, expected);
        Ok(())
    }

    #[test]
    fn compatibility_family_is_nearest_first() -> TestResult {
        let db = TargetDatabase::mock_x86_64();
        let names: Vec<&str> = db
            .compatibility_family("haswell")?
            .iter()
            .map(|target| target.name.as_str())
            .collect();
        assert_eq!(names, ["haswell", "nehalem", "core2", "x86_64"]);
        Ok(())
    }
}
