//! The repository trait and an in-memory implementation.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
};

use crate::{Error, PackageDescriptor};

/// Read access to a package repository.
///
/// The concretizer treats the repository as immutable for the duration of
/// a solve.
pub trait Repository: Debug {
    /// Returns the namespace of this repository, e.g. `builtin`.
    fn namespace(&self) -> &str;

    /// Returns the descriptor of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPackage`] if no such package exists.
    fn get(&self, name: &str) -> Result<&PackageDescriptor, Error>;

    /// Returns whether a package named `name` exists.
    fn exists(&self, name: &str) -> bool;

    /// Returns whether `name` is a virtual name: provided by at least one
    /// package while not being a package itself.
    fn is_virtual(&self, name: &str) -> bool;

    /// Returns all providers of a virtual name in repository order.
    fn providers_for(&self, virtual_name: &str) -> Vec<&PackageDescriptor>;

    /// Returns all package names in repository order.
    fn package_names(&self) -> Vec<&str>;
}

/// An in-memory [`Repository`].
///
/// Repository order is package name order, which keeps every solve over
/// the same repository deterministic.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository {
    namespace: String,
    packages: BTreeMap<String, PackageDescriptor>,
    providers: BTreeMap<String, BTreeSet<String>>,
}

impl MemoryRepository {
    /// Creates an empty repository with a namespace.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            packages: BTreeMap::new(),
            providers: BTreeMap::new(),
        }
    }

    /// Adds a descriptor to the repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePackage`] if the name is already taken.
    pub fn add(&mut self, descriptor: PackageDescriptor) -> Result<(), Error> {
        if self.packages.contains_key(&descriptor.name) {
            return Err(Error::DuplicatePackage(descriptor.name));
        }
        for virtual_name in descriptor.provided_virtuals() {
            self.providers
                .entry(virtual_name.to_string())
                .or_default()
                .insert(descriptor.name.clone());
        }
        self.packages.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Adds several descriptors at once.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; earlier descriptors stay
    /// added.
    pub fn add_all(
        &mut self,
        descriptors: impl IntoIterator<Item = PackageDescriptor>,
    ) -> Result<(), Error> {
        for descriptor in descriptors {
            self.add(descriptor)?;
        }
        Ok(())
    }
}

impl Repository for MemoryRepository {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get(&self, name: &str) -> Result<&PackageDescriptor, Error> {
        self.packages
            .get(name)
            .ok_or_else(|| Error::UnknownPackage(name.to_string()))
    }

    fn exists(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    fn is_virtual(&self, name: &str) -> bool {
        !self.exists(name) && self.providers.contains_key(name)
    }

    fn providers_for(&self, virtual_name: &str) -> Vec<&PackageDescriptor> {
        self.providers
            .get(virtual_name)
            .into_iter()
            .flatten()
            .filter_map(|provider| self.packages.get(provider))
            .collect()
    }

    fn package_names(&self) -> Vec<&str> {
        self.packages.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::PackageBuilder;

    #[test]
    fn virtuals_are_names_with_providers_only() -> TestResult {
        let mut repo = MemoryRepository::new("builtin.mock");
        repo.add(PackageBuilder::new("mpich").provides("mpi@:3").build()?)?;
        repo.add(PackageBuilder::new("zmpi").provides("mpi@10.0:").build()?)?;

        assert!(repo.is_virtual("mpi"));
        assert!(!repo.is_virtual("mpich"));
        assert!(!repo.is_virtual("nope"));
        assert_eq!(
            repo.providers_for("mpi")
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>(),
            vec!["mpich", "zmpi"]
        );
        Ok(())
    }

    #[test]
    fn duplicate_packages_are_rejected() -> TestResult {
        let mut repo = MemoryRepository::new("builtin.mock");
        repo.add(PackageBuilder::new("a").build()?)?;
        assert!(matches!(
            repo.add(PackageBuilder::new("a").build()?),
            Err(Error::DuplicatePackage(_))
        ));
        Ok(())
    }
}
