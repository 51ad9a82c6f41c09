//! Compiler flag categories and ordered flag maps.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::Error;

/// A category of compiler flags that can be set on a spec node.
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
pub enum FlagCategory {
    /// Flags for the C compiler.
    Cflags,
    /// Flags for the C preprocessor.
    Cppflags,
    /// Flags for the C++ compiler.
    Cxxflags,
    /// Flags for the Fortran compiler.
    Fflags,
    /// Libraries passed to the linker.
    Ldlibs,
    /// Flags passed to the linker.
    Ldflags,
}

impl FlagCategory {
    /// Returns all valid flag categories in canonical order.
    pub fn all() -> impl Iterator<Item = FlagCategory> {
        FlagCategory::iter()
    }

    /// Parses a category name, mapping failure onto [`Error`].
    pub fn from_name(name: &str) -> Result<Self, Error> {
        FlagCategory::from_str(name).map_err(|_| Error::InvalidFlagCategory(name.to_string()))
    }
}

/// An ordered map from flag category to flag tokens.
///
/// Order within a category is meaningful: later flags take higher
/// precedence on the compile line.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct FlagMap(BTreeMap<FlagCategory, Vec<String>>);

impl FlagMap {
    /// Creates an empty flag map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the flags of `category`, if any were set.
    pub fn get(&self, category: FlagCategory) -> Option<&[String]> {
        self.0.get(&category).map(Vec::as_slice)
    }

    /// Appends a single flag to `category`.
    pub fn push(&mut self, category: FlagCategory, flag: &str) {
        self.0.entry(category).or_default().push(flag.to_string());
    }

    /// Replaces the flags of `category` with `flags`.
    pub fn set(&mut self, category: FlagCategory, flags: Vec<String>) {
        self.0.insert(category, flags);
    }

    /// Iterates over categories and their flag lists in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (FlagCategory, &[String])> {
        self.0
            .iter()
            .map(|(category, flags)| (*category, flags.as_slice()))
    }

    /// Returns whether no flags are set at all.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Merges `other` into this map, with [`extend_flag_list`] semantics
    /// per category.
    pub fn extend(&mut self, other: &FlagMap) {
        for (category, flags) in other.iter() {
            extend_flag_list(self.0.entry(category).or_default(), flags);
        }
    }
}

impl Display for FlagMap {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        let mut first = true;
        for (category, flags) in self.iter() {
            if flags.is_empty() {
                continue;
            }
            if !first {
                write!(fmt, " ")?;
            }
            write!(fmt, "{category}=\"{}\"", flags.join(" "))?;
            first = false;
        }
        Ok(())
    }
}

/// Extends a flag list, preserving order and precedence.
///
/// New flags land at the end of the list. A flag that is already present
/// is moved to the end instead, so that it takes higher precedence on the
/// compile line.
pub fn extend_flag_list(flag_list: &mut Vec<String>, new_flags: &[String]) {
    for flag in new_flags {
        flag_list.retain(|existing| existing != flag);
        flag_list.push(flag.clone());
    }
}

/// Returns whether two flag maps contain the same flags per category,
/// regardless of order.
pub fn same_flag_sets(a: &FlagMap, b: &FlagMap) -> bool {
    FlagCategory::all().all(|category| {
        let lhs: BTreeSet<&String> = a.get(category).unwrap_or_default().iter().collect();
        let rhs: BTreeSet<&String> = b.get(category).unwrap_or_default().iter().collect();
        lhs == rhs
    })
}
