//! Dependency types and dependency type sets.

use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::Error;

/// The type of a dependency edge.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    EnumIter,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DepType {
    /// The dependency is needed at build time.
    Build,
    /// The dependency is linked into the dependent.
    Link,
    /// The dependency is needed at run time.
    Run,
    /// The dependency is only needed to test the dependent.
    Test,
}

/// An ordered set of [`DepType`]s carried by a dependency edge.
///
/// An empty set marks a pure constraint edge, e.g. one introduced by a
/// `^dep` fragment of a spec literal.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct DepTypes(BTreeSet<DepType>);

impl DepTypes {
    /// Creates an empty set of dependency types.
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Creates the default `build, link` set.
    pub fn build_link() -> Self {
        Self(BTreeSet::from([DepType::Build, DepType::Link]))
    }

    /// Creates the set of all dependency types.
    pub fn all() -> Self {
        Self(DepType::iter().collect())
    }

    /// Adds a dependency type to the set.
    pub fn insert(&mut self, deptype: DepType) {
        self.0.insert(deptype);
    }

    /// Returns whether the set contains `deptype`.
    pub fn contains(&self, deptype: DepType) -> bool {
        self.0.contains(&deptype)
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the contained types in their canonical order.
    pub fn iter(&self) -> impl Iterator<Item = DepType> + '_ {
        self.0.iter().copied()
    }

    /// Merges another set into this one.
    pub fn extend(&mut self, other: &DepTypes) {
        self.0.extend(other.iter());
    }
}

impl From<&[DepType]> for DepTypes {
    fn from(types: &[DepType]) -> Self {
        Self(types.iter().copied().collect())
    }
}

impl<const N: usize> From<[DepType; N]> for DepTypes {
    fn from(types: [DepType; N]) -> Self {
        Self(types.into_iter().collect())
    }
}

impl Display for DepTypes {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        let mut first = true;
        for deptype in self.iter() {
            if !first {
                write!(fmt, ",")?;
            }
            write!(fmt, "{deptype}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for DepTypes {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut types = DepTypes::none();
        for part in input.split(',').filter(|part| !part.is_empty()) {
            types.insert(
                DepType::from_str(part)
                    .map_err(|_| Error::InvalidDependencyType(part.to_string()))?,
            );
        }
        Ok(types)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[rstest]
    #[case("build,link", DepTypes::build_link())]
    #[case("build,link,run,test", DepTypes::all())]
    #[case("", DepTypes::none())]
    fn deptypes_parse_display(#[case] input: &str, #[case] expected: DepTypes) -> TestResult {
        let parsed = DepTypes::from_str(input)?;
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), input);
        Ok(())
    }

    #[test]
    fn deptypes_merge() {
        let mut types = DepTypes::from([DepType::Build]);
        types.extend(&DepTypes::from([DepType::Run]));
        assert!(types.contains(DepType::Build));
        assert!(types.contains(DepType::Run));
        assert!(!types.contains(DepType::Test));
    }
}
