//! Package versions and version requests.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use winnow::{
    ModalResult,
    Parser,
    combinator::{alt, eof, opt, terminated},
    token::take_while,
};

use crate::Error;

/// A single component of a [`Version`].
///
/// Components are compared numerically when both sides are numeric.
/// A numeric component always orders above an alphabetic one, so that
/// `1.2` is newer than `1.b`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum VersionPart {
    /// A numeric component, e.g. `27` in `2.27.1`.
    Numeric(u64),
    /// An alphabetic component, e.g. `rc1` in `3.0-rc1`.
    Alpha(String),
}

impl Ord for VersionPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionPart::Numeric(a), VersionPart::Numeric(b)) => a.cmp(b),
            (VersionPart::Alpha(a), VersionPart::Alpha(b)) => a.cmp(b),
            (VersionPart::Numeric(_), VersionPart::Alpha(_)) => Ordering::Greater,
            (VersionPart::Alpha(_), VersionPart::Numeric(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for VersionPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for VersionPart {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match self {
            VersionPart::Numeric(n) => write!(fmt, "{n}"),
            VersionPart::Alpha(s) => write!(fmt, "{s}"),
        }
    }
}

/// A package version.
///
/// A version is a sequence of numeric and alphabetic components separated
/// by `.`, `-` or `_`. The original string is retained for display, while
/// equality, ordering and hashing are defined over the component sequence.
///
/// The ordering implements the concretizer's comparison rules:
///
/// 1. the `develop` version orders above every other version,
/// 2. numeric components order above alphabetic ones,
/// 3. otherwise components compare pairwise, with the longer version
///    winning when one is a prefix of the other (`1.2.1` > `1.2`).
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use concrete_types::Version;
///
/// # fn main() -> Result<(), concrete_types::Error> {
/// assert!(Version::from_str("2.7.11")? < Version::from_str("3.5.1")?);
/// assert!(Version::from_str("develop")? > Version::from_str("999.9")?);
/// assert!(Version::from_str("1.2")? > Version::from_str("1.b")?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Deserialize, Eq, Serialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    raw: String,
    parts: Vec<VersionPart>,
}

impl Version {
    /// Recognizes a [`Version`] in a string slice.
    pub fn parser(value: &mut &str) -> ModalResult<Self> {
        let raw = take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
        })
        .parse_next(value)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: &str) -> Self {
        let mut parts = Vec::new();
        for chunk in raw.split(['.', '-', '_']) {
            if chunk.is_empty() {
                continue;
            }
            // A chunk such as "rc1" holds an alphabetic and a numeric run.
            let mut rest = chunk;
            while !rest.is_empty() {
                let numeric = rest.starts_with(|c: char| c.is_ascii_digit());
                let split = rest
                    .find(|c: char| c.is_ascii_digit() != numeric)
                    .unwrap_or(rest.len());
                let (run, tail) = rest.split_at(split);
                parts.push(match run.parse::<u64>() {
                    Ok(n) if numeric => VersionPart::Numeric(n),
                    _ => VersionPart::Alpha(run.to_string()),
                });
                rest = tail;
            }
        }
        Version {
            raw: raw.to_string(),
            parts,
        }
    }

    /// Returns the version components.
    pub fn parts(&self) -> &[VersionPart] {
        &self.parts
    }

    /// Returns whether this is a develop-like version.
    ///
    /// Develop versions order above all released versions but are avoided
    /// during concretization unless explicitly requested.
    pub fn is_develop(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, VersionPart::Alpha(s) if s == "develop"))
    }

    /// Returns whether this version is a component-wise prefix of `other`.
    ///
    /// Used for range boundaries: the upper bound of `1.2:1.4` admits
    /// `1.4.5` because `1.4` is a prefix of it.
    pub fn is_prefix_of(&self, other: &Version) -> bool {
        other.parts.len() >= self.parts.len() && other.parts[..self.parts.len()] == self.parts
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.is_develop()
            .cmp(&other.is_develop())
            .then_with(|| self.parts.cmp(&other.parts))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Version::parser
            .parse(input)
            .map_err(|_| Error::InvalidVersion(input.to_string()))
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(input: String) -> Result<Self, Self::Error> {
        Version::from_str(&input)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

impl Display for Version {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.raw)
    }
}

/// A version request carried by a spec.
///
/// A request is either unconstrained (`@:`), a half-open or closed range
/// (`@1.2:`, `@:3`, `@1.2:3.4`), or a point request (`@1.4`). Point
/// requests match prefix-inclusively, so `@1.4` is satisfied by `1.4.5`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "String", try_from = "String")]
pub enum VersionRequest {
    /// Any version is acceptable.
    Any,
    /// A single version, matched prefix-inclusively.
    Exact(Version),
    /// An inclusive range with optional bounds.
    Range {
        /// The lower bound, if any.
        lo: Option<Version>,
        /// The upper bound, if any.
        hi: Option<Version>,
    },
}

impl VersionRequest {
    /// Recognizes a [`VersionRequest`] in a string slice.
    pub fn parser(value: &mut &str) -> ModalResult<Self> {
        alt((
            (opt(Version::parser), ':', opt(Version::parser)).map(|(lo, _, hi)| match (lo, hi) {
                (None, None) => VersionRequest::Any,
                (lo, hi) => VersionRequest::Range { lo, hi },
            }),
            Version::parser.map(VersionRequest::Exact),
        ))
        .parse_next(value)
    }

    /// Returns whether `version` satisfies this request.
    pub fn satisfied_by(&self, version: &Version) -> bool {
        match self {
            VersionRequest::Any => true,
            VersionRequest::Exact(exact) => version == exact || exact.is_prefix_of(version),
            VersionRequest::Range { lo, hi } => {
                let above = lo.as_ref().is_none_or(|lo| version >= lo);
                let below = hi
                    .as_ref()
                    .is_none_or(|hi| version <= hi || hi.is_prefix_of(version));
                above && below
            }
        }
    }

    /// Returns whether the request leaves the version unconstrained.
    pub fn is_any(&self) -> bool {
        matches!(self, VersionRequest::Any)
    }

    /// Returns the single version of a point request, if this is one.
    pub fn as_exact(&self) -> Option<&Version> {
        match self {
            VersionRequest::Exact(version) => Some(version),
            _ => None,
        }
    }

    /// Intersects this request with another one.
    ///
    /// Returns the merged request, or `None` if the requests exclude each
    /// other (e.g. `@1.4` with `@2:`).
    pub fn intersect(&self, other: &VersionRequest) -> Option<VersionRequest> {
        match (self, other) {
            (VersionRequest::Any, r) | (r, VersionRequest::Any) => Some(r.clone()),
            (VersionRequest::Exact(a), VersionRequest::Exact(b)) => {
                if a == b {
                    Some(self.clone())
                } else if a.is_prefix_of(b) {
                    Some(other.clone())
                } else if b.is_prefix_of(a) {
                    Some(self.clone())
                } else {
                    None
                }
            }
            (VersionRequest::Exact(v), range @ VersionRequest::Range { .. })
            | (range @ VersionRequest::Range { .. }, VersionRequest::Exact(v)) => range
                .satisfied_by(v)
                .then(|| VersionRequest::Exact(v.clone())),
            (
                VersionRequest::Range { lo: alo, hi: ahi },
                VersionRequest::Range { lo: blo, hi: bhi },
            ) => {
                let lo = match (alo, blo) {
                    (Some(a), Some(b)) => Some(a.max(b).clone()),
                    (a, b) => a.as_ref().or(b.as_ref()).cloned(),
                };
                let hi = match (ahi, bhi) {
                    (Some(a), Some(b)) => Some(a.min(b).clone()),
                    (a, b) => a.as_ref().or(b.as_ref()).cloned(),
                };
                if let (Some(lo), Some(hi)) = (&lo, &hi) {
                    if lo > hi && !hi.is_prefix_of(lo) {
                        return None;
                    }
                }
                Some(VersionRequest::Range { lo, hi })
            }
        }
    }
}

impl FromStr for VersionRequest {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        terminated(VersionRequest::parser, eof)
            .parse_next(&mut &*input)
            .map_err(|_| Error::InvalidVersionRange(input.to_string()))
    }
}

impl TryFrom<String> for VersionRequest {
    type Error = Error;

    fn try_from(input: String) -> Result<Self, Self::Error> {
        VersionRequest::from_str(&input)
    }
}

impl From<VersionRequest> for String {
    fn from(request: VersionRequest) -> Self {
        request.to_string()
    }
}

impl Display for VersionRequest {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match self {
            VersionRequest::Any => write!(fmt, ":"),
            VersionRequest::Exact(version) => write!(fmt, "{version}"),
            VersionRequest::Range { lo, hi } => {
                if let Some(lo) = lo {
                    write!(fmt, "{lo}")?;
                }
                write!(fmt, ":")?;
                if let Some(hi) = hi {
                    write!(fmt, "{hi}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[rstest]
    #[case("2.7.11", "3.5.1", Ordering::Less)]
    #[case("1.2.1", "1.2", Ordering::Greater)]
    #[case("1.2", "1.b", Ordering::Greater)]
    #[case("develop", "999.9", Ordering::Greater)]
    #[case("1.4", "1.4", Ordering::Equal)]
    #[case("1.10", "1.9", Ordering::Greater)]
    #[case("3.0-rc1", "3.0", Ordering::Greater)]
    fn version_ordering(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) -> TestResult {
        let a = Version::from_str(a)?;
        let b = Version::from_str(b)?;
        assert_eq!(a.cmp(&b), expected);
        Ok(())
    }

    #[rstest]
    #[case("1.4", "1.4.5", true)]
    #[case("1.4", "1.40", false)]
    #[case("1.4.5", "1.4", false)]
    fn version_prefix(#[case] prefix: &str, #[case] version: &str, #[case] expected: bool) -> TestResult {
        let prefix = Version::from_str(prefix)?;
        let version = Version::from_str(version)?;
        assert_eq!(prefix.is_prefix_of(&version), expected);
        Ok(())
    }

    #[rstest]
    #[case(":", "1.0", true)]
    #[case("1.1", "1.1", true)]
    #[case("1.1", "1.1.2", true)]
    #[case("1.1", "1.2", false)]
    #[case("1.2:3.4", "2.0", true)]
    #[case("1.2:3.4", "3.4.5", true)]
    #[case("1.2:3.4", "3.5", false)]
    #[case("1.2:", "1.1", false)]
    #[case(":3", "3.9", true)]
    #[case(":3", "4.0", false)]
    fn request_satisfaction(
        #[case] request: &str,
        #[case] version: &str,
        #[case] expected: bool,
    ) -> TestResult {
        let request = VersionRequest::from_str(request)?;
        let version = Version::from_str(version)?;
        assert_eq!(request.satisfied_by(&version), expected);
        Ok(())
    }

    #[rstest]
    #[case("1.2:3.4")]
    #[case("1.2:")]
    #[case(":3.4")]
    #[case(":")]
    #[case("2.7.11")]
    fn request_roundtrip(#[case] input: &str) -> TestResult {
        assert_eq!(VersionRequest::from_str(input)?.to_string(), input);
        Ok(())
    }

    #[rstest]
    #[case("1:3", "2:4", Some("2:3"))]
    #[case(":", "1.4", Some("1.4"))]
    #[case("1.4", "2:", None)]
    #[case("1.2:1.6", "1.4", Some("1.4"))]
    fn request_intersection(
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: Option<&str>,
    ) -> TestResult {
        let a = VersionRequest::from_str(a)?;
        let b = VersionRequest::from_str(b)?;
        assert_eq!(
            a.intersect(&b).map(|r| r.to_string()),
            expected.map(|s| s.to_string())
        );
        Ok(())
    }
}
