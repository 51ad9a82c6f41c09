#![doc = include_str!("../README.md")]

mod arch;
mod compiler;
mod deptype;
mod error;
mod flags;
mod parser;
mod spec;
mod variant;
mod version;

pub use arch::{ArchConstraint, TargetRequest};
pub use compiler::CompilerConstraint;
pub use deptype::{DepType, DepTypes};
pub use error::Error;
pub use flags::{FlagCategory, FlagMap, extend_flag_list, same_flag_sets};
pub use spec::{ExternalAttributes, Spec, SpecNode, SpecRecord};
pub use variant::VariantValue;
pub use version::{Version, VersionPart, VersionRequest};
