//! World closing: the transitive closure of possible dependencies.

use std::collections::BTreeSet;

use concrete_types::{DepType, DepTypes, Spec};
use log::debug;

use crate::{Error, Repository};

/// Which packages may attach their test-type dependencies.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum TestPolicy {
    /// Test dependencies are skipped everywhere.
    #[default]
    None,
    /// Test dependencies are followed for every package.
    All,
    /// Test dependencies are followed for the named packages only.
    Packages(BTreeSet<String>),
}

impl TestPolicy {
    /// Returns whether test dependencies of `package` are in scope.
    pub fn tests_for(&self, package: &str) -> bool {
        match self {
            TestPolicy::None => false,
            TestPolicy::All => true,
            TestPolicy::Packages(packages) => packages.contains(package),
        }
    }
}

/// Ensures every package referenced by the input specs exists, either as
/// a real package or as a virtual name.
///
/// # Errors
///
/// Returns [`Error::UnknownPackage`] naming the first missing package.
pub fn check_packages_exist(repo: &dyn Repository, specs: &[Spec]) -> Result<(), Error> {
    for spec in specs {
        for node in spec.traverse() {
            if !repo.exists(&node.name) && !repo.is_virtual(&node.name) {
                return Err(Error::UnknownPackage(node.name.clone()));
            }
        }
    }
    Ok(())
}

/// Computes the closed world of packages reachable from `specs`.
///
/// Walks every dependency clause of every reachable package for the
/// requested `deptypes`. Virtual names encountered on the way are added
/// to `virtuals` and expanded to all of their providers. Test
/// dependencies are followed according to `tests`; build dependencies of
/// packages in `external_only` are not followed, since externals never
/// drag build edges into the DAG.
///
/// # Errors
///
/// Returns [`Error::UnknownPackage`] if a clause references a name that
/// is neither a package nor a virtual.
pub fn possible_dependencies(
    repo: &dyn Repository,
    specs: &[Spec],
    virtuals: &mut BTreeSet<String>,
    deptypes: &DepTypes,
    tests: &TestPolicy,
    external_only: &BTreeSet<String>,
) -> Result<BTreeSet<String>, Error> {
    let mut closed = BTreeSet::new();
    let mut queue: Vec<String> = Vec::new();

    let enqueue = |name: &str,
                   queue: &mut Vec<String>,
                   virtuals: &mut BTreeSet<String>|
     -> Result<(), Error> {
        if repo.is_virtual(name) {
            virtuals.insert(name.to_string());
            for provider in repo.providers_for(name) {
                queue.push(provider.name.clone());
            }
            Ok(())
        } else if repo.exists(name) {
            queue.push(name.to_string());
            Ok(())
        } else {
            Err(Error::UnknownPackage(name.to_string()))
        }
    };

    for spec in specs {
        for node in spec.traverse() {
            enqueue(&node.name, &mut queue, virtuals)?;
        }
    }

    while let Some(name) = queue.pop() {
        if !closed.insert(name.clone()) {
            continue;
        }
        let descriptor = repo.get(&name)?;
        for clause in &descriptor.dependencies {
            let in_scope = clause.types.iter().any(|deptype| {
                deptypes.contains(deptype)
                    && match deptype {
                        DepType::Test => tests.tests_for(&name),
                        DepType::Build => !external_only.contains(&name),
                        _ => true,
                    }
            });
            if !in_scope {
                debug!(
                    "Skipping out-of-scope dependency {} -> {}.",
                    name,
                    clause.spec.root_name()
                );
                continue;
            }
            enqueue(clause.spec.root_name(), &mut queue, virtuals)?;
        }
    }

    Ok(closed)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use testresult::TestResult;

    use super::*;
    use crate::{MemoryRepository, PackageBuilder};

    fn mock_repo() -> Result<MemoryRepository, Error> {
        let mut repo = MemoryRepository::new("builtin.mock");
        repo.add_all([
            PackageBuilder::new("mpileaks")
                .version("2.3")
                .depends_on("callpath")
                .depends_on("mpi")
                .build()?,
            PackageBuilder::new("callpath")
                .version("1.0")
                .depends_on("mpi")
                .build()?,
            PackageBuilder::new("mpich").version("3.0").provides("mpi@:3").build()?,
            PackageBuilder::new("zmpi").version("10.0").provides("mpi@10.0:").build()?,
            PackageBuilder::new("a")
                .version("1.0")
                .depends_on_when("b", "test", None)
                .build()?,
            PackageBuilder::new("b").version("1.0").build()?,
        ])?;
        Ok(repo)
    }

    #[test]
    fn closure_expands_virtual_providers() -> TestResult {
        let repo = mock_repo()?;
        let specs = vec![Spec::from_str("mpileaks")?];
        let mut virtuals = BTreeSet::new();
        let closed = possible_dependencies(
            &repo,
            &specs,
            &mut virtuals,
            &DepTypes::all(),
            &TestPolicy::None,
            &BTreeSet::new(),
        )?;

        assert!(virtuals.contains("mpi"));
        for pkg in ["mpileaks", "callpath", "mpich", "zmpi"] {
            assert!(closed.contains(pkg), "{pkg} missing from closure");
        }
        assert!(!closed.contains("mpi"));
        Ok(())
    }

    #[test]
    fn test_dependencies_follow_the_policy() -> TestResult {
        let repo = mock_repo()?;
        let specs = vec![Spec::from_str("a")?];

        let mut virtuals = BTreeSet::new();
        let without = possible_dependencies(
            &repo,
            &specs,
            &mut virtuals,
            &DepTypes::all(),
            &TestPolicy::None,
            &BTreeSet::new(),
        )?;
        assert!(!without.contains("b"));

        let with = possible_dependencies(
            &repo,
            &specs,
            &mut virtuals,
            &DepTypes::all(),
            &TestPolicy::Packages(BTreeSet::from(["a".to_string()])),
            &BTreeSet::new(),
        )?;
        assert!(with.contains("b"));
        Ok(())
    }

    #[test]
    fn unknown_packages_are_fatal() -> TestResult {
        let repo = mock_repo()?;
        let specs = vec![Spec::from_str("nosuchpackage")?];
        assert_eq!(
            check_packages_exist(&repo, &specs),
            Err(Error::UnknownPackage("nosuchpackage".to_string()))
        );
        Ok(())
    }
}
