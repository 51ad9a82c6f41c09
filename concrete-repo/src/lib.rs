#![doc = include_str!("../README.md")]

mod closure;
mod descriptor;
mod error;
mod repository;

pub use closure::{TestPolicy, check_packages_exist, possible_dependencies};
pub use descriptor::{
    ConflictClause,
    DependencyClause,
    PackageBuilder,
    PackageDescriptor,
    ProvidesClause,
    VariantDomain,
    VariantSchema,
    VersionMeta,
};
pub use error::Error;
pub use repository::{MemoryRepository, Repository};
