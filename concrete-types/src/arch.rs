//! Architecture constraints: platform, operating system and target.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A target request: either a concrete microarchitecture name or a range
/// over the partial order of microarchitectures (`x86_64:haswell`).
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "String", try_from = "String")]
pub enum TargetRequest {
    /// A single named target.
    Exact(String),
    /// A range with optional bounds, both inclusive.
    Range {
        /// The least acceptable target, if any.
        lo: Option<String>,
        /// The greatest acceptable target, if any.
        hi: Option<String>,
    },
}

impl TargetRequest {
    /// Returns the target name of a concrete request.
    pub fn as_exact(&self) -> Option<&str> {
        match self {
            TargetRequest::Exact(name) => Some(name),
            TargetRequest::Range { .. } => None,
        }
    }
}

impl FromStr for TargetRequest {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Some((lo, hi)) = input.split_once(':') {
            let bound = |side: &str| (!side.is_empty()).then(|| side.to_string());
            Ok(TargetRequest::Range {
                lo: bound(lo),
                hi: bound(hi),
            })
        } else if input.is_empty() {
            Err(Error::InvalidSpecLiteral {
                literal: input.to_string(),
                reason: "empty target".to_string(),
            })
        } else {
            Ok(TargetRequest::Exact(input.to_string()))
        }
    }
}

impl TryFrom<String> for TargetRequest {
    type Error = Error;

    fn try_from(input: String) -> Result<Self, Self::Error> {
        TargetRequest::from_str(&input)
    }
}

impl From<TargetRequest> for String {
    fn from(request: TargetRequest) -> Self {
        request.to_string()
    }
}

impl Display for TargetRequest {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match self {
            TargetRequest::Exact(name) => write!(fmt, "{name}"),
            TargetRequest::Range { lo, hi } => write!(
                fmt,
                "{}:{}",
                lo.as_deref().unwrap_or(""),
                hi.as_deref().unwrap_or("")
            ),
        }
    }
}

/// The architecture constraint of a spec node.
///
/// An abstract spec leaves any of the three fields unset; a concrete spec
/// fixes all of them, with a concrete target.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ArchConstraint {
    /// The platform, e.g. `test` or `linux`.
    pub platform: Option<String>,
    /// The operating system, e.g. `debian6`.
    pub os: Option<String>,
    /// The target microarchitecture request.
    pub target: Option<TargetRequest>,
}

impl ArchConstraint {
    /// Returns whether no architecture field is constrained.
    pub fn is_empty(&self) -> bool {
        self.platform.is_none() && self.os.is_none() && self.target.is_none()
    }

    /// Returns whether all three fields are fixed with a concrete target.
    pub fn is_concrete(&self) -> bool {
        self.platform.is_some()
            && self.os.is_some()
            && self
                .target
                .as_ref()
                .is_some_and(|target| target.as_exact().is_some())
    }
}

impl Display for ArchConstraint {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        let mut first = true;
        let mut field = |fmt: &mut Formatter, key: &str, value: String| -> std::fmt::Result {
            if !first {
                write!(fmt, " ")?;
            }
            first = false;
            write!(fmt, "{key}={value}")
        };
        if let Some(platform) = &self.platform {
            field(fmt, "platform", platform.clone())?;
        }
        if let Some(os) = &self.os {
            field(fmt, "os", os.clone())?;
        }
        if let Some(target) = &self.target {
            field(fmt, "target", target.to_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[rstest]
    #[case("haswell", TargetRequest::Exact("haswell".to_string()))]
    #[case(
        "x86_64:",
        TargetRequest::Range { lo: Some("x86_64".to_string()), hi: None }
    )]
    #[case(
        ":haswell",
        TargetRequest::Range { lo: None, hi: Some("haswell".to_string()) }
    )]
    fn target_request_parsing(#[case] input: &str, #[case] expected: TargetRequest) -> TestResult {
        let parsed = TargetRequest::from_str(input)?;
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), input);
        Ok(())
    }
}
