#![doc = include_str!("../README.md")]

mod compilers;
mod error;
mod packages;
mod platform;
mod targets;

pub use compilers::CompilerEntry;
pub use error::Error;
pub use packages::{ExternalEntry, PackageConfigEntry, PackagesConfig};
pub use platform::Platform;
pub use targets::{Target, TargetDatabase};
