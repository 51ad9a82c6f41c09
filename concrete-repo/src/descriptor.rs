//! Package descriptors: the repository-side view of a package.

use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
};

use concrete_types::{DepTypes, Spec, VariantValue, Version, VersionRequest};

use crate::Error;

/// Metadata attached to a declared package version.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VersionMeta {
    /// Whether the descriptor marks this version as preferred.
    pub preferred: bool,
    /// Whether this version is deprecated and must not be concretized.
    pub deprecated: bool,
}

/// The value domain of a variant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VariantDomain {
    /// The boolean domain `true` / `false`.
    Bool,
    /// An enumerated set of values.
    Enumerated(BTreeSet<String>),
    /// A disjoint union of value sets for a multi-valued variant.
    ///
    /// The union is flattened when enumerating possible values.
    DisjointSets(Vec<BTreeSet<String>>),
    /// An open domain: any value is structurally acceptable.
    Open,
}

/// The schema of a variant declared by a package.
#[derive(Clone, Debug)]
pub struct VariantSchema {
    /// Whether the variant holds a single value.
    pub single: bool,
    /// The default value(s); exactly one for single-valued variants.
    pub defaults: Vec<String>,
    /// The domain of acceptable values.
    pub domain: VariantDomain,
    /// An acceptance predicate for open domains.
    pub validator: Option<fn(&str) -> bool>,
}

impl VariantSchema {
    /// Enumerates every possible value of the variant.
    ///
    /// Disjoint unions are flattened. A variant with no enumerable values
    /// falls back to its defaults, so that every variant has at least one
    /// possible value.
    pub fn possible_values(&self) -> BTreeSet<String> {
        let values = match &self.domain {
            VariantDomain::Bool => BTreeSet::from(["true".to_string(), "false".to_string()]),
            VariantDomain::Enumerated(values) => values.clone(),
            VariantDomain::DisjointSets(sets) => {
                sets.iter().flat_map(|set| set.iter().cloned()).collect()
            }
            VariantDomain::Open => BTreeSet::new(),
        };
        if values.is_empty() {
            self.defaults.iter().cloned().collect()
        } else {
            values
        }
    }

    /// Returns whether `value` is acceptable for this variant.
    pub fn validate(&self, value: &VariantValue) -> bool {
        if value.is_wildcard() {
            return true;
        }
        value.values().iter().all(|value| match &self.domain {
            VariantDomain::Bool => value == "true" || value == "false",
            VariantDomain::Enumerated(values) => values.contains(value),
            VariantDomain::DisjointSets(sets) => sets.iter().any(|set| set.contains(value)),
            VariantDomain::Open => self.validator.is_none_or(|accepts| accepts(value)),
        })
    }
}

/// A `depends_on` clause of a package.
#[derive(Clone, Debug)]
pub struct DependencyClause {
    /// The constraint on the dependency; its root names the dependency.
    pub spec: Spec,
    /// The dependency types of the clause.
    pub types: DepTypes,
    /// The activation condition on the dependent.
    ///
    /// A trivial condition activates the dependency unconditionally.
    pub condition: Spec,
}

/// A `provides` clause: the package satisfies a virtual name.
#[derive(Clone, Debug)]
pub struct ProvidesClause {
    /// The virtual name being provided.
    pub virtual_name: String,
    /// The virtual versions covered by the provider.
    pub versions: VersionRequest,
    /// The condition under which the provider applies.
    pub condition: Spec,
}

/// A conflict between a trigger and a forbidden constraint.
#[derive(Clone, Debug)]
pub struct ConflictClause {
    /// The constraint that must not hold when the trigger does.
    pub constraint: Spec,
    /// The triggering sub-spec.
    pub trigger: Spec,
}

/// A package as declared by its repository.
#[derive(Clone, Debug)]
pub struct PackageDescriptor {
    /// The package name.
    pub name: String,
    /// Declared versions with their metadata.
    pub versions: BTreeMap<Version, VersionMeta>,
    /// Declared variants by name.
    pub variants: BTreeMap<String, VariantSchema>,
    /// Dependency clauses in declaration order.
    pub dependencies: Vec<DependencyClause>,
    /// Provides clauses in declaration order.
    pub provides: Vec<ProvidesClause>,
    /// Conflict clauses in declaration order.
    pub conflicts: Vec<ConflictClause>,
}

impl PackageDescriptor {
    /// Returns the metadata of a declared version, if declared.
    pub fn version_meta(&self, version: &Version) -> Option<&VersionMeta> {
        self.versions.get(version)
    }

    /// Returns the names of all virtuals this package can provide.
    pub fn provided_virtuals(&self) -> BTreeSet<&str> {
        self.provides
            .iter()
            .map(|clause| clause.virtual_name.as_str())
            .collect()
    }

    /// Returns whether this package declares a provider clause for
    /// `virtual_name`.
    pub fn provides_virtual(&self, virtual_name: &str) -> bool {
        self.provides
            .iter()
            .any(|clause| clause.virtual_name == virtual_name)
    }
}

/// A fluent builder for [`PackageDescriptor`]s.
///
/// Spec-shaped arguments are literals, parsed and validated by
/// [`PackageBuilder::build`].
#[derive(Clone, Debug)]
pub struct PackageBuilder {
    name: String,
    versions: Vec<(String, VersionMeta)>,
    variants: Vec<(String, VariantSchema)>,
    dependencies: Vec<(String, String, Option<String>)>,
    provides: Vec<(String, Option<String>)>,
    conflicts: Vec<(String, Option<String>)>,
}

impl PackageBuilder {
    /// Starts a descriptor for `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: Vec::new(),
            variants: Vec::new(),
            dependencies: Vec::new(),
            provides: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Declares a version.
    pub fn version(mut self, version: &str) -> Self {
        self.versions.push((version.to_string(), VersionMeta::default()));
        self
    }

    /// Declares a preferred version.
    pub fn preferred_version(mut self, version: &str) -> Self {
        self.versions.push((
            version.to_string(),
            VersionMeta {
                preferred: true,
                deprecated: false,
            },
        ));
        self
    }

    /// Declares a deprecated version.
    pub fn deprecated_version(mut self, version: &str) -> Self {
        self.versions.push((
            version.to_string(),
            VersionMeta {
                preferred: false,
                deprecated: true,
            },
        ));
        self
    }

    /// Declares a boolean variant with a default.
    pub fn bool_variant(mut self, name: &str, default: bool) -> Self {
        self.variants.push((
            name.to_string(),
            VariantSchema {
                single: true,
                defaults: vec![if default { "true" } else { "false" }.to_string()],
                domain: VariantDomain::Bool,
                validator: None,
            },
        ));
        self
    }

    /// Declares a single-valued variant over an enumerated domain.
    pub fn single_variant(mut self, name: &str, default: &str, values: &[&str]) -> Self {
        self.variants.push((
            name.to_string(),
            VariantSchema {
                single: true,
                defaults: vec![default.to_string()],
                domain: VariantDomain::Enumerated(values.iter().map(|v| v.to_string()).collect()),
                validator: None,
            },
        ));
        self
    }

    /// Declares a multi-valued variant over an enumerated domain.
    pub fn multi_variant(mut self, name: &str, defaults: &[&str], values: &[&str]) -> Self {
        self.variants.push((
            name.to_string(),
            VariantSchema {
                single: false,
                defaults: defaults.iter().map(|v| v.to_string()).collect(),
                domain: VariantDomain::Enumerated(values.iter().map(|v| v.to_string()).collect()),
                validator: None,
            },
        ));
        self
    }

    /// Declares a multi-valued variant over a disjoint union of sets.
    pub fn disjoint_variant(mut self, name: &str, defaults: &[&str], sets: &[&[&str]]) -> Self {
        self.variants.push((
            name.to_string(),
            VariantSchema {
                single: false,
                defaults: defaults.iter().map(|v| v.to_string()).collect(),
                domain: VariantDomain::DisjointSets(
                    sets.iter()
                        .map(|set| set.iter().map(|v| v.to_string()).collect())
                        .collect(),
                ),
                validator: None,
            },
        ));
        self
    }

    /// Declares a single-valued variant over an open domain, optionally
    /// guarded by an acceptance predicate.
    pub fn open_variant(mut self, name: &str, default: &str, validator: Option<fn(&str) -> bool>) -> Self {
        self.variants.push((
            name.to_string(),
            VariantSchema {
                single: true,
                defaults: vec![default.to_string()],
                domain: VariantDomain::Open,
                validator,
            },
        ));
        self
    }

    /// Declares an unconditional `build, link` dependency.
    pub fn depends_on(self, spec: &str) -> Self {
        self.depends_on_when(spec, "build,link", None)
    }

    /// Declares an unconditional dependency with explicit types.
    pub fn depends_on_types(self, spec: &str, types: &str) -> Self {
        self.depends_on_when(spec, types, None)
    }

    /// Declares a dependency with explicit types and an optional
    /// activation condition on the dependent.
    pub fn depends_on_when(mut self, spec: &str, types: &str, when: Option<&str>) -> Self {
        self.dependencies.push((
            spec.to_string(),
            types.to_string(),
            when.map(str::to_string),
        ));
        self
    }

    /// Declares that the package provides a virtual, e.g. `mpi@1:10.0`.
    pub fn provides(mut self, virtual_spec: &str) -> Self {
        self.provides.push((virtual_spec.to_string(), None));
        self
    }

    /// Declares a conditional provides clause.
    pub fn provides_when(mut self, virtual_spec: &str, when: &str) -> Self {
        self.provides
            .push((virtual_spec.to_string(), Some(when.to_string())));
        self
    }

    /// Declares a conflict with an optional trigger condition.
    pub fn conflicts(mut self, constraint: &str, when: Option<&str>) -> Self {
        self.conflicts
            .push((constraint.to_string(), when.map(str::to_string)));
        self
    }

    /// Parses and validates the collected declarations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when a literal does not parse,
    /// a dependency spec is anonymous, or a variant default falls outside
    /// its domain.
    pub fn build(self) -> Result<PackageDescriptor, Error> {
        let invalid = |reason: String| Error::InvalidDescriptor {
            package: self.name.clone(),
            reason,
        };

        let mut versions = BTreeMap::new();
        for (version, meta) in &self.versions {
            let version = Version::from_str(version).map_err(|e| invalid(e.to_string()))?;
            versions.insert(version, *meta);
        }

        let mut variants = BTreeMap::new();
        for (name, schema) in &self.variants {
            if schema.single && schema.defaults.len() != 1 {
                return Err(invalid(format!(
                    "single-valued variant {name} must have exactly one default"
                )));
            }
            for default in &schema.defaults {
                let value = VariantValue::Single(default.clone());
                if !schema.validate(&value) {
                    return Err(invalid(format!(
                        "default {default} of variant {name} is outside its domain"
                    )));
                }
            }
            variants.insert(name.clone(), schema.clone());
        }

        let parse_condition = |when: &Option<String>| -> Result<Spec, Error> {
            match when {
                None => Ok(Spec::new(&self.name)),
                Some(when) => Ok(Spec::from_str(when)
                    .map_err(|e| invalid(e.to_string()))?
                    .with_default_name(&self.name)),
            }
        };

        let mut dependencies = Vec::new();
        for (spec, types, when) in &self.dependencies {
            let spec = Spec::from_str(spec).map_err(|e| invalid(e.to_string()))?;
            if !spec.is_named() {
                return Err(invalid("dependency spec has no package name".to_string()));
            }
            let types = DepTypes::from_str(types).map_err(|e| invalid(e.to_string()))?;
            if types.is_empty() {
                return Err(invalid(format!(
                    "dependency on {} declares no types",
                    spec.root_name()
                )));
            }
            dependencies.push(DependencyClause {
                spec,
                types,
                condition: parse_condition(when)?,
            });
        }

        let mut provides = Vec::new();
        for (virtual_spec, when) in &self.provides {
            let spec = Spec::from_str(virtual_spec).map_err(|e| invalid(e.to_string()))?;
            if !spec.is_named() {
                return Err(invalid("provides clause has no virtual name".to_string()));
            }
            provides.push(ProvidesClause {
                virtual_name: spec.root_name().to_string(),
                versions: spec.root().versions.clone(),
                condition: parse_condition(when)?,
            });
        }

        let mut conflicts = Vec::new();
        for (constraint, when) in &self.conflicts {
            let constraint = Spec::from_str(constraint)
                .map_err(|e| invalid(e.to_string()))?
                .with_default_name(&self.name);
            conflicts.push(ConflictClause {
                constraint,
                trigger: parse_condition(when)?,
            });
        }

        Ok(PackageDescriptor {
            name: self.name,
            versions,
            variants,
            dependencies,
            provides,
            conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn builder_assembles_a_descriptor() -> TestResult {
        let descriptor = PackageBuilder::new("mpileaks")
            .version("2.3")
            .preferred_version("2.2")
            .bool_variant("debug", false)
            .depends_on("callpath")
            .depends_on_when("mpi@10.0", "build,link", Some("+debug"))
            .build()?;

        assert_eq!(descriptor.name, "mpileaks");
        assert_eq!(descriptor.versions.len(), 2);
        assert!(
            descriptor
                .version_meta(&Version::from_str("2.2")?)
                .is_some_and(|meta| meta.preferred)
        );

        let conditional = &descriptor.dependencies[1];
        assert_eq!(conditional.spec.root_name(), "mpi");
        assert_eq!(conditional.condition.root_name(), "mpileaks");
        assert!(!conditional.condition.is_trivial());
        assert!(descriptor.dependencies[0].condition.is_trivial());
        Ok(())
    }

    #[rstest]
    #[case(VariantDomain::Bool, "true", true)]
    #[case(VariantDomain::Bool, "maybe", false)]
    #[case(VariantDomain::Open, "anything", true)]
    fn variant_validation(
        #[case] domain: VariantDomain,
        #[case] value: &str,
        #[case] expected: bool,
    ) {
        let schema = VariantSchema {
            single: true,
            defaults: vec!["true".to_string()],
            domain,
            validator: None,
        };
        assert_eq!(
            schema.validate(&VariantValue::Single(value.to_string())),
            expected
        );
    }

    #[test]
    fn disjoint_sets_flatten_into_possible_values() {
        let schema = VariantSchema {
            single: false,
            defaults: vec!["a".to_string()],
            domain: VariantDomain::DisjointSets(vec![
                BTreeSet::from(["a".to_string(), "b".to_string()]),
                BTreeSet::from(["c".to_string()]),
            ]),
            validator: None,
        };
        assert_eq!(
            schema.possible_values(),
            BTreeSet::from(["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn default_outside_domain_is_rejected() {
        let result = PackageBuilder::new("broken")
            .single_variant("fmt", "yaml", &["json", "toml"])
            .build();
        assert!(matches!(result, Err(Error::InvalidDescriptor { .. })));
    }
}
