//! Loading repositories and configuration snapshots from TOML files.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    str::FromStr,
};

use concrete_config::{CompilerEntry, PackagesConfig, Platform, TargetDatabase};
use concrete_repo::{MemoryRepository, PackageBuilder};
use concrete_types::Version;
use serde::Deserialize;

use crate::Error;

fn read(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    toml::from_str(&read(path)?).map_err(|error| Error::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}

/// The on-disk repository schema.
#[derive(Debug, Deserialize)]
struct RepoFile {
    namespace: String,
    #[serde(default)]
    packages: Vec<PackageFile>,
}

#[derive(Debug, Deserialize)]
struct PackageFile {
    name: String,
    #[serde(default)]
    versions: Vec<VersionFile>,
    #[serde(default)]
    variants: Vec<VariantFile>,
    #[serde(default)]
    dependencies: Vec<DependencyFile>,
    #[serde(default)]
    provides: Vec<ProvidesFile>,
    #[serde(default)]
    conflicts: Vec<ConflictFile>,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    version: String,
    #[serde(default)]
    preferred: bool,
    #[serde(default)]
    deprecated: bool,
}

#[derive(Debug, Deserialize)]
struct VariantFile {
    name: String,
    /// One of `bool`, `single`, `multi` or `open`.
    kind: String,
    default: String,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DependencyFile {
    spec: String,
    #[serde(default = "default_dependency_types")]
    types: String,
    #[serde(default)]
    when: Option<String>,
}

fn default_dependency_types() -> String {
    "build,link".to_string()
}

#[derive(Debug, Deserialize)]
struct ProvidesFile {
    spec: String,
    #[serde(default)]
    when: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConflictFile {
    constraint: String,
    #[serde(default)]
    when: Option<String>,
}

fn build_package(file: &PackageFile, path: &Path) -> Result<concrete_repo::PackageDescriptor, Error> {
    let mut builder = PackageBuilder::new(&file.name);
    for version in &file.versions {
        builder = if version.preferred {
            builder.preferred_version(&version.version)
        } else if version.deprecated {
            builder.deprecated_version(&version.version)
        } else {
            builder.version(&version.version)
        };
    }
    for variant in &file.variants {
        let values: Vec<&str> = variant.values.iter().map(String::as_str).collect();
        builder = match variant.kind.as_str() {
            "bool" => builder.bool_variant(&variant.name, variant.default == "true"),
            "single" => builder.single_variant(&variant.name, &variant.default, &values),
            "multi" => {
                let defaults: Vec<&str> = variant.default.split(',').collect();
                builder.multi_variant(&variant.name, &defaults, &values)
            }
            "open" => builder.open_variant(&variant.name, &variant.default, None),
            other => {
                return Err(Error::Parse {
                    path: path.to_path_buf(),
                    message: format!(
                        "unknown variant kind '{other}' on package {}",
                        file.name
                    ),
                });
            }
        };
    }
    for dependency in &file.dependencies {
        builder =
            builder.depends_on_when(&dependency.spec, &dependency.types, dependency.when.as_deref());
    }
    for provides in &file.provides {
        builder = match &provides.when {
            Some(when) => builder.provides_when(&provides.spec, when),
            None => builder.provides(&provides.spec),
        };
    }
    for conflict in &file.conflicts {
        builder = builder.conflicts(&conflict.constraint, conflict.when.as_deref());
    }
    Ok(builder.build()?)
}

/// Loads a package repository definition.
pub fn load_repo(path: &Path) -> Result<MemoryRepository, Error> {
    let file: RepoFile = parse(path)?;
    let mut repo = MemoryRepository::new(&file.namespace);
    for package in &file.packages {
        repo.add(build_package(package, path)?)?;
    }
    Ok(repo)
}

/// Loads the packages configuration; missing files mean no preferences.
pub fn load_packages(path: Option<&PathBuf>) -> Result<PackagesConfig, Error> {
    match path {
        Some(path) => parse(path),
        None => Ok(PackagesConfig::default()),
    }
}

#[derive(Debug, Deserialize)]
struct CompilersFile {
    #[serde(default)]
    compilers: Vec<CompilerEntry>,
}

/// Loads the compiler list; without a file, a single `gcc@4.5.0` on the
/// platform's default OS is assumed.
pub fn load_compilers(
    path: Option<&PathBuf>,
    platform: &Platform,
) -> Result<Vec<CompilerEntry>, Error> {
    match path {
        Some(path) => {
            let file: CompilersFile = parse(path)?;
            Ok(file.compilers)
        }
        None => Ok(vec![CompilerEntry::new(
            "gcc",
            Version::from_str("4.5.0")?,
            &platform.default_os,
        )]),
    }
}

/// Loads the platform description; the mock platform is the default.
pub fn load_platform(path: Option<&PathBuf>) -> Result<Platform, Error> {
    match path {
        Some(path) => parse(path),
        None => Ok(Platform::mock()),
    }
}

/// Loads the target database; the sample x86_64 chain is the default.
pub fn load_targets(path: Option<&PathBuf>) -> Result<TargetDatabase, Error> {
    match path {
        Some(path) => parse(path),
        None => Ok(TargetDatabase::mock_x86_64()),
    }
}

/// Splits a repeated `--with-tests` argument into a test policy set.
pub fn test_packages(packages: &[String]) -> BTreeSet<String> {
    packages
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use concrete_repo::Repository;
    use testresult::TestResult;

    use super::*;

    const REPO: &str = r#"
        namespace = "builtin.mock"

        [[packages]]
        name = "mpileaks"

        [[packages.versions]]
        version = "2.3"

        [[packages.versions]]
        version = "2.2"
        preferred = true

        [[packages.variants]]
        name = "debug"
        kind = "bool"
        default = "false"

        [[packages.dependencies]]
        spec = "mpi"

        [[packages]]
        name = "mpich"

        [[packages.versions]]
        version = "3.0.4"

        [[packages.provides]]
        spec = "mpi@:3"
    "#;

    #[test]
    fn repositories_load_from_toml() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(REPO.as_bytes())?;

        let repo = load_repo(file.path())?;
        assert_eq!(repo.namespace(), "builtin.mock");
        assert!(repo.exists("mpileaks"));
        assert!(repo.is_virtual("mpi"));

        let mpileaks = repo.get("mpileaks")?;
        assert_eq!(mpileaks.versions.len(), 2);
        assert_eq!(mpileaks.dependencies.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_configuration_files_fall_back_to_defaults() -> TestResult {
        let platform = load_platform(None)?;
        assert_eq!(platform.name, "test");

        let compilers = load_compilers(None, &platform)?;
        assert_eq!(compilers.len(), 1);
        assert_eq!(compilers[0].operating_system, platform.default_os);

        assert!(load_packages(None)?.all().is_none());
        assert!(load_targets(None)?.contains("x86_64"));
        Ok(())
    }

    #[test]
    fn test_package_lists_split_on_commas() {
        let packages = test_packages(&["a,b".to_string(), "c".to_string()]);
        assert_eq!(packages.len(), 3);
        assert!(packages.contains("b"));
    }
}
