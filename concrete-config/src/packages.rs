//! Per-package preferences and external installations.

use std::{
    collections::BTreeMap,
    str::FromStr,
};

use concrete_repo::Repository;
use concrete_types::{CompilerConstraint, Spec, VariantValue, Version};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::Error;

fn default_buildable() -> bool {
    true
}

/// One external installation of a package.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExternalEntry {
    /// The spec literal describing the installation, e.g.
    /// `externaltool@1.0%gcc@4.5.0`.
    pub spec: String,
    /// The installation prefix.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Modules that make the installation available.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Free-form extra attributes.
    #[serde(default)]
    pub extra_attributes: BTreeMap<String, String>,
}

impl ExternalEntry {
    /// Parses the external's spec literal.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::InvalidEntry`] naming the literal if it does
    /// not parse or has no package name.
    pub fn parsed_spec(&self) -> Result<Spec, Error> {
        let spec = Spec::from_str(&self.spec).map_err(|e| Error::InvalidEntry {
            scope: "packages".to_string(),
            reason: e.to_string(),
        })?;
        if !spec.is_named() {
            return Err(Error::InvalidEntry {
                scope: "packages".to_string(),
                reason: format!("external spec '{}' has no package name", self.spec),
            });
        }
        Ok(spec)
    }
}

/// Preferences and externals for one package (or for `all`).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PackageConfigEntry {
    /// Preferred versions, most preferred first.
    #[serde(default)]
    pub version: Vec<String>,
    /// Preferred compilers as literals, most preferred first.
    #[serde(default)]
    pub compiler: Vec<String>,
    /// Preferred providers per virtual name, most preferred first.
    #[serde(default)]
    pub providers: BTreeMap<String, Vec<String>>,
    /// Preferred variant fragments, e.g. `+debug mpi=mpich`.
    #[serde(default)]
    pub variants: Vec<String>,
    /// Preferred targets, most preferred first.
    #[serde(default)]
    pub target: Vec<String>,
    /// Whether the package may be built from source.
    #[serde(default = "default_buildable")]
    pub buildable: bool,
    /// External installations of the package.
    #[serde(default)]
    pub externals: Vec<ExternalEntry>,
}

impl Default for PackageConfigEntry {
    fn default() -> Self {
        Self {
            version: Vec::new(),
            compiler: Vec::new(),
            providers: BTreeMap::new(),
            variants: Vec::new(),
            target: Vec::new(),
            buildable: true,
            externals: Vec::new(),
        }
    }
}

impl PackageConfigEntry {
    /// Parses the compiler preference literals, in preference order.
    ///
    /// Unparsable entries are skipped with a debug message rather than
    /// failing the solve; they cannot express a preference.
    pub fn compiler_preferences(&self) -> Vec<CompilerConstraint> {
        self.compiler
            .iter()
            .filter_map(|literal| match Spec::from_str(&format!("%{literal}")) {
                Ok(spec) => spec.root().compiler.clone(),
                Err(error) => {
                    debug!("Skipping compiler preference {literal:?}: {error}");
                    None
                }
            })
            .collect()
    }

    /// Parses the variant preference fragments into a value map.
    pub fn preferred_variants(&self) -> BTreeMap<String, VariantValue> {
        let mut preferred = BTreeMap::new();
        for fragment in &self.variants {
            match Spec::from_str(fragment) {
                Ok(spec) => {
                    for (name, value) in &spec.root().variants {
                        preferred.insert(name.clone(), value.clone());
                    }
                }
                Err(error) => debug!("Skipping variant preference {fragment:?}: {error}"),
            }
        }
        preferred
    }

    /// Returns the rank of `version` in the preference list, if listed.
    ///
    /// Rank 0 is the most preferred entry.
    pub fn version_rank(&self, version: &Version) -> Option<usize> {
        self.version
            .iter()
            .position(|preferred| Version::from_str(preferred).as_ref() == Ok(version))
    }
}

/// The `packages` configuration section: preferences and externals per
/// package, plus the `all` defaults.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PackagesConfig(BTreeMap<String, PackageConfigEntry>);

impl PackagesConfig {
    /// Creates a configuration from explicit entries.
    pub fn new(entries: BTreeMap<String, PackageConfigEntry>) -> Self {
        Self(entries)
    }

    /// Returns the entry of `package`, if configured.
    pub fn get(&self, package: &str) -> Option<&PackageConfigEntry> {
        self.0.get(package)
    }

    /// Returns the `all` defaults entry, if configured.
    pub fn all(&self) -> Option<&PackageConfigEntry> {
        self.0.get("all")
    }

    /// Iterates over the per-package entries in name order, `all`
    /// included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageConfigEntry)> {
        self.0.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Inserts or replaces the entry of `package`.
    pub fn insert(&mut self, package: &str, entry: PackageConfigEntry) {
        self.0.insert(package.to_string(), entry);
    }

    /// Normalizes the configuration against a repository.
    ///
    /// Entries keyed by a virtual name are translated onto the virtual's
    /// providers: `buildable: false` propagates to every provider and
    /// each external lands on the package its spec literal names. The
    /// virtual keys themselves disappear from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if an external spec literal under a virtual key
    /// cannot be parsed.
    pub fn normalized(&self, repo: &dyn Repository) -> Result<PackagesConfig, Error> {
        let mut normalized: BTreeMap<String, PackageConfigEntry> = BTreeMap::new();
        let mut virtual_entries = Vec::new();

        for (name, entry) in &self.0 {
            if name != "all" && repo.is_virtual(name) {
                virtual_entries.push((name.clone(), entry.clone()));
            } else {
                normalized.insert(name.clone(), entry.clone());
            }
        }

        for (virtual_name, entry) in virtual_entries {
            if !entry.buildable {
                for provider in repo.providers_for(&virtual_name) {
                    normalized
                        .entry(provider.name.clone())
                        .or_default()
                        .buildable = false;
                }
            }
            for external in &entry.externals {
                let provider = external.parsed_spec()?.root_name().to_string();
                normalized
                    .entry(provider)
                    .or_default()
                    .externals
                    .push(external.clone());
            }
        }

        Ok(PackagesConfig(normalized))
    }
}

#[cfg(test)]
mod tests {
    use concrete_repo::{MemoryRepository, PackageBuilder};
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    use super::*;

    fn mpi_repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new("builtin.mock");
        repo.add_all([
            PackageBuilder::new("mpich")
                .version("3.0.4")
                .provides("mpi@:3")
                .build()
                .expect("valid descriptor"),
            PackageBuilder::new("zmpi")
                .version("10.0")
                .provides("mpi@10.0:")
                .build()
                .expect("valid descriptor"),
        ])
        .expect("no duplicates");
        repo
    }

    #[test]
    fn virtual_entries_translate_onto_providers() -> TestResult {
        let config: PackagesConfig = toml::from_str(
            r#"
            [mpi]
            buildable = false

            [[mpi.externals]]
            spec = "mpich@3.0.4"
            prefix = "/opt/mpich"
            "#,
        )?;

        let normalized = config.normalized(&mpi_repo())?;
        assert!(normalized.get("mpi").is_none());
        let mpich = normalized.get("mpich").expect("provider entry created");
        assert!(!mpich.buildable);
        assert_eq!(mpich.externals.len(), 1);
        assert_eq!(mpich.externals[0].prefix.as_deref(), Some("/opt/mpich"));
        let zmpi = normalized.get("zmpi").expect("provider entry created");
        assert!(!zmpi.buildable);
        assert!(zmpi.externals.is_empty());
        Ok(())
    }

    #[test]
    fn preferences_parse_from_fragments() -> TestResult {
        let entry: PackageConfigEntry = toml::from_str(
            r#"
            version = ["2.7.11", "3.5.1"]
            compiler = ["gcc@4.5.0", "clang"]
            variants = ["+debug mpi=mpich"]
            "#,
        )?;

        assert_eq!(
            entry.version_rank(&Version::from_str("2.7.11")?),
            Some(0)
        );
        assert_eq!(entry.version_rank(&Version::from_str("9.9")?), None);

        let compilers = entry.compiler_preferences();
        assert_eq!(compilers.len(), 2);
        assert_eq!(compilers[0].name, "gcc");

        let variants = entry.preferred_variants();
        assert_eq!(variants.get("debug"), Some(&VariantValue::enabled()));
        assert_eq!(
            variants.get("mpi"),
            Some(&VariantValue::Single("mpich".to_string()))
        );
        Ok(())
    }
}
