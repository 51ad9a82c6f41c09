//! Variant values on spec nodes.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// The value assigned to a variant on a spec node.
///
/// Boolean variants use the canonical strings `true` and `false`, which
/// the spec literal syntax sugars as `+name` and `~name`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum VariantValue {
    /// The wildcard `*`: any value is acceptable, no clause is emitted.
    Any,
    /// A single value.
    Single(String),
    /// An ordered set of values for a multi-valued variant.
    Multi(Vec<String>),
}

impl VariantValue {
    /// Creates the boolean `true` value.
    pub fn enabled() -> Self {
        VariantValue::Single("true".to_string())
    }

    /// Creates the boolean `false` value.
    pub fn disabled() -> Self {
        VariantValue::Single("false".to_string())
    }

    /// Parses a raw value token from a spec literal.
    ///
    /// `*` becomes the wildcard, a comma separated token becomes a
    /// multi-value, everything else a single value.
    pub fn from_token(token: &str) -> Self {
        if token == "*" {
            VariantValue::Any
        } else if token.contains(',') {
            VariantValue::Multi(token.split(',').map(str::to_string).collect())
        } else {
            VariantValue::Single(token.to_string())
        }
    }

    /// Returns every concrete value carried by this assignment.
    ///
    /// The wildcard yields nothing.
    pub fn values(&self) -> &[String] {
        match self {
            VariantValue::Any => &[],
            VariantValue::Single(value) => std::slice::from_ref(value),
            VariantValue::Multi(values) => values,
        }
    }

    /// Returns whether this is the wildcard value.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, VariantValue::Any)
    }

    /// Returns the single value, if this assignment holds exactly one.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            VariantValue::Single(value) => Some(value),
            _ => None,
        }
    }

    /// Appends a value, turning a single assignment into a multi one.
    ///
    /// Values already present are not duplicated.
    pub fn append(&mut self, value: &str) {
        let mut values = match std::mem::replace(self, VariantValue::Any) {
            VariantValue::Any => Vec::new(),
            VariantValue::Single(existing) => vec![existing],
            VariantValue::Multi(existing) => existing,
        };
        if !values.iter().any(|existing| existing == value) {
            values.push(value.to_string());
        }
        *self = VariantValue::Multi(values);
    }
}

impl Display for VariantValue {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match self {
            VariantValue::Any => write!(fmt, "*"),
            VariantValue::Single(value) => write!(fmt, "{value}"),
            VariantValue::Multi(values) => write!(fmt, "{}", values.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("*", VariantValue::Any)]
    #[case("bar", VariantValue::Single("bar".to_string()))]
    #[case(
        "a,b",
        VariantValue::Multi(vec!["a".to_string(), "b".to_string()])
    )]
    fn value_from_token(#[case] token: &str, #[case] expected: VariantValue) {
        assert_eq!(VariantValue::from_token(token), expected);
    }

    #[test]
    fn append_deduplicates() {
        let mut value = VariantValue::Single("a".to_string());
        value.append("b");
        value.append("a");
        assert_eq!(value.values(), ["a".to_string(), "b".to_string()]);
    }
}
