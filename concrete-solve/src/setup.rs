//! Problem setup: walking the closed world and emitting facts and rules.
//!
//! Setup owns no solver state. It walks the repository, the configuration
//! snapshots and the input specs, and calls the driver's assertion API in
//! a deterministic order, so that two solves over byte-identical inputs
//! generate byte-identical programs.

use std::collections::{BTreeMap, BTreeSet};

use concrete_repo::{check_packages_exist, possible_dependencies};
use concrete_types::{
    CompilerConstraint,
    DepType,
    DepTypes,
    Spec,
    SpecNode,
    TargetRequest,
    Version,
    VersionRequest,
};
use log::debug;

use crate::{
    Error,
    SolveContext,
    asp::{AspAnd, AspFunction},
    driver::Driver,
    fun,
};

/// Whether clauses are generated for rule heads (setters) or rule bodies
/// (final values).
///
/// The two alphabets are parallel: every head functor renames onto a body
/// functor, while the reverse direction is partial.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ClauseMode {
    /// Setter functors, used when injecting constraints.
    Head,
    /// Getter functors, used when matching the final assignment.
    Body,
}

impl ClauseMode {
    fn platform(self) -> &'static str {
        match self {
            ClauseMode::Head => "node_platform_set",
            ClauseMode::Body => "node_platform",
        }
    }

    fn os(self) -> &'static str {
        match self {
            ClauseMode::Head => "node_os_set",
            ClauseMode::Body => "node_os",
        }
    }

    fn target(self) -> &'static str {
        match self {
            ClauseMode::Head => "node_target_set",
            ClauseMode::Body => "node_target",
        }
    }

    fn variant(self) -> &'static str {
        match self {
            ClauseMode::Head => "variant_set",
            ClauseMode::Body => "variant_value",
        }
    }

    fn compiler(self) -> &'static str {
        match self {
            ClauseMode::Head => "node_compiler_hard",
            ClauseMode::Body => "node_compiler",
        }
    }

    fn compiler_version(self) -> &'static str {
        match self {
            ClauseMode::Head => "node_compiler_version_hard",
            ClauseMode::Body => "node_compiler_version",
        }
    }

    fn flag(self) -> &'static str {
        match self {
            ClauseMode::Head => "node_flag_set",
            ClauseMode::Body => "node_flag",
        }
    }
}

/// One candidate provider for a virtual name.
#[derive(Clone, Debug)]
struct ProviderCandidate {
    provider: String,
    versions: VersionRequest,
    atom: AspFunction,
}

/// Generates the fact and rule base for one solve.
#[derive(Debug)]
pub struct SolverSetup<'a, 'ctx> {
    ctx: &'a SolveContext<'ctx>,
    possible_versions: BTreeMap<String, BTreeSet<Version>>,
    possible_virtuals: BTreeSet<String>,
    possible_compilers: Vec<CompilerConstraint>,
    version_constraints: BTreeSet<(String, VersionRequest)>,
    target_constraints: BTreeSet<(String, TargetRequest)>,
    compiler_version_constraints: BTreeSet<(String, CompilerConstraint)>,
    virtual_constraints: BTreeSet<(String, VersionRequest)>,
    providers_by_virtual: BTreeMap<String, Vec<ProviderCandidate>>,
}

impl<'a, 'ctx> SolverSetup<'a, 'ctx> {
    /// Returns the repository with the context lifetime, so that
    /// descriptor borrows do not tie up `self`.
    fn repo(&self) -> &'ctx dyn concrete_repo::Repository {
        self.ctx.repo
    }

    /// Creates a setup over a solve context.
    pub fn new(ctx: &'a SolveContext<'ctx>) -> Self {
        Self {
            ctx,
            possible_versions: BTreeMap::new(),
            possible_virtuals: BTreeSet::new(),
            possible_compilers: Vec::new(),
            version_constraints: BTreeSet::new(),
            target_constraints: BTreeSet::new(),
            compiler_version_constraints: BTreeSet::new(),
            virtual_constraints: BTreeSet::new(),
            providers_by_virtual: BTreeMap::new(),
        }
    }

    /// Generates the complete program for `specs` through `r#gen`.
    ///
    /// # Errors
    ///
    /// Fails synchronously, before any solving, on unknown packages,
    /// unavailable compilers under strict checking, invalid injected
    /// variant values and malformed configuration.
    pub fn setup(&mut self, r#gen: &mut Driver, specs: &[Spec]) -> Result<(), Error> {
        check_packages_exist(self.ctx.repo, specs)?;

        self.possible_virtuals = specs
            .iter()
            .map(|spec| spec.root_name())
            .filter(|name| self.ctx.repo.is_virtual(name))
            .map(str::to_string)
            .collect();

        let external_only = self.ctx.external_only_packages();
        let packages = possible_dependencies(
            self.ctx.repo,
            specs,
            &mut self.possible_virtuals,
            &DepTypes::all(),
            &self.ctx.tests,
            &external_only,
        )?;

        self.possible_compilers = self.generate_possible_compilers(r#gen, specs)?;
        self.build_version_dict(&packages, specs);

        r#gen.h1("General Constraints");
        self.available_compilers(r#gen);
        self.compiler_defaults(r#gen);
        self.compiler_supports_os(r#gen);

        self.platform_defaults(r#gen);
        self.os_defaults(r#gen, specs);
        self.target_defaults(r#gen, specs)?;

        self.virtual_providers(r#gen)?;
        self.provider_defaults(r#gen);
        self.external_packages(r#gen)?;
        self.flag_defaults(r#gen);

        r#gen.h1("Package Constraints");
        for package in &packages {
            r#gen.h2(&format!("Package rules: {package}"));
            self.pkg_rules(r#gen, package)?;
            r#gen.h2(&format!("Package preferences: {package}"));
            self.preferred_variants(r#gen, package);
            self.preferred_targets(r#gen, package);
            self.preferred_versions(r#gen, package);
        }

        r#gen.h1("Spec Constraints");
        let mut ordered: Vec<&Spec> = specs.iter().collect();
        ordered.sort_by_key(|spec| spec.root_name().to_string());
        for spec in ordered {
            if self.ctx.repo.is_virtual(spec.root_name()) {
                r#gen.fact(fun!(virtual_root(spec.root_name())));
            } else {
                r#gen.fact(fun!(root(spec.root_name())));
            }
            for node in spec.traverse() {
                r#gen.h2(&format!("Spec: {node}"));
                self.inject_spec_node(r#gen, node)?;
            }
        }

        r#gen.h1("Virtual Constraints");
        self.define_virtual_constraints(r#gen);

        r#gen.h1("Version Constraints");
        self.define_version_constraints(r#gen);

        r#gen.h1("Compiler Version Constraints");
        self.define_compiler_version_constraints(r#gen);

        r#gen.h1("Target Constraints");
        self.define_target_constraints(r#gen)?;

        Ok(())
    }

    /// Returns the clauses a spec node mandates.
    fn spec_clauses(&mut self, node: &SpecNode, mode: ClauseMode) -> Vec<AspFunction> {
        let mut clauses = Vec::new();
        let name = &node.name;

        clauses.push(fun!(node(name)));

        match &node.versions {
            VersionRequest::Any => {}
            versions => {
                if node.is_concrete() {
                    if let Some(version) = node.concrete_version() {
                        clauses.push(fun!(version(name, version)));
                    }
                } else {
                    self.version_constraints
                        .insert((name.clone(), versions.clone()));
                    clauses.push(fun!(version_satisfies(name, versions)));
                }
            }
        }

        if let Some(platform) = &node.arch.platform {
            clauses.push(AspFunction::new(
                mode.platform(),
                vec![name.into(), platform.into()],
            ));
        }
        if let Some(os) = &node.arch.os {
            clauses.push(AspFunction::new(mode.os(), vec![name.into(), os.into()]));
        }
        if let Some(target) = &node.arch.target {
            match target.as_exact() {
                Some(exact) if self.ctx.targets.contains(exact) => {
                    clauses.push(AspFunction::new(
                        mode.target(),
                        vec![name.into(), exact.into()],
                    ));
                }
                _ => {
                    self.target_constraints
                        .insert((name.clone(), target.clone()));
                    clauses.push(fun!(node_target_satisfies(name, target.to_string())));
                }
            }
        }

        for (vname, value) in &node.variants {
            for v in value.values() {
                clauses.push(AspFunction::new(
                    mode.variant(),
                    vec![name.into(), vname.into(), v.into()],
                ));
            }
        }

        if let Some(compiler) = &node.compiler {
            clauses.push(AspFunction::new(
                mode.compiler(),
                vec![name.into(), (&compiler.name).into()],
            ));
            if let Some(version) = compiler.concrete_version() {
                clauses.push(AspFunction::new(
                    mode.compiler_version(),
                    vec![name.into(), (&compiler.name).into(), version.into()],
                ));
            } else if !compiler.versions.is_any() {
                clauses.push(fun!(node_compiler_version_satisfies(
                    name,
                    &compiler.name,
                    &compiler.versions
                )));
                self.compiler_version_constraints
                    .insert((name.clone(), compiler.clone()));
            }
        }

        for (category, flags) in node.flags.iter() {
            for flag in flags {
                clauses.push(AspFunction::new(
                    mode.flag(),
                    vec![name.into(), category.to_string().into(), flag.into()],
                ));
            }
        }

        clauses
    }

    /// Returns the body clauses of every node of a condition spec.
    fn spec_traverse_clauses(&mut self, condition: &Spec) -> Vec<AspFunction> {
        let mut clauses = Vec::new();
        for node in condition.traverse() {
            clauses.extend(self.spec_clauses(node, ClauseMode::Body));
        }
        clauses
    }

    fn generate_possible_compilers(
        &self,
        r#gen: &mut Driver,
        specs: &[Spec],
    ) -> Result<Vec<CompilerConstraint>, Error> {
        let mut cspecs: BTreeSet<CompilerConstraint> = self
            .ctx
            .compilers
            .iter()
            .map(|entry| entry.constraint())
            .collect();

        // Compilers mentioned on the command line extend the pool unless
        // strict checking is enabled.
        for spec in specs {
            for node in spec.traverse() {
                let Some(compiler) = &node.compiler else {
                    continue;
                };
                if !compiler.is_concrete() {
                    continue;
                }
                if cspecs.contains(compiler) {
                    continue;
                }
                if self.ctx.strict_compilers {
                    return Err(Error::UnavailableCompiler(compiler.to_string()));
                }
                if let Some(version) = compiler.concrete_version() {
                    r#gen.fact(fun!(allow_compiler(&compiler.name, version)));
                }
                cspecs.insert(compiler.clone());
            }
        }

        Ok(cspecs.into_iter().collect())
    }

    fn build_version_dict(&mut self, packages: &BTreeSet<String>, specs: &[Spec]) {
        for package in packages {
            if let Ok(descriptor) = self.ctx.repo.get(package) {
                self.possible_versions
                    .entry(package.clone())
                    .or_default()
                    .extend(descriptor.versions.keys().cloned());
            }
        }
        for spec in specs {
            for node in spec.traverse() {
                if let Some(version) = node.versions.as_exact() {
                    self.possible_versions
                        .entry(node.name.clone())
                        .or_default()
                        .insert(version.clone());
                }
            }
        }
    }

    fn available_compilers(&self, r#gen: &mut Driver) {
        r#gen.h2("Available compilers");
        let mut by_name: BTreeMap<&str, BTreeSet<&Version>> = BTreeMap::new();
        for compiler in &self.possible_compilers {
            if let Some(version) = compiler.concrete_version() {
                by_name.entry(&compiler.name).or_default().insert(version);
            }
        }
        for (name, versions) in by_name {
            r#gen.fact(fun!(compiler(name)));
            for version in versions {
                r#gen.fact(fun!(compiler_version(name, version)));
            }
            r#gen.newline();
        }
    }

    /// Returns the rank of `compiler` in a preference list, or the list
    /// length when unlisted, so that unlisted compilers keep their
    /// relative order under a stable sort.
    fn compiler_preference_rank(
        preferences: &[CompilerConstraint],
        compiler: &CompilerConstraint,
    ) -> usize {
        compiler
            .concrete_version()
            .and_then(|version| {
                preferences.iter().position(|preference| {
                    preference.name == compiler.name && preference.versions.satisfied_by(version)
                })
            })
            .unwrap_or(preferences.len())
    }

    fn sorted_compilers_by_preference(&self, package: &str) -> Vec<CompilerConstraint> {
        let mut compilers = self.possible_compilers.clone();
        compilers.sort_by(|a, b| b.cmp(a));
        let preferences = self
            .ctx
            .packages
            .get(package)
            .map(|entry| entry.compiler_preferences())
            .unwrap_or_default();
        compilers.sort_by_key(|compiler| Self::compiler_preference_rank(&preferences, compiler));
        compilers
    }

    fn compiler_defaults(&self, r#gen: &mut Driver) {
        r#gen.h2("Default compiler preferences");
        for (i, compiler) in self.sorted_compilers_by_preference("all").iter().enumerate() {
            if let Some(version) = compiler.concrete_version() {
                r#gen.fact(fun!(default_compiler_preference(
                    &compiler.name,
                    version,
                    i
                )));
            }
        }
    }

    fn compiler_supports_os(&self, r#gen: &mut Driver) {
        r#gen.h2("Compiler operating systems");
        for entry in self.ctx.compilers {
            r#gen.fact(fun!(compiler_supports_os(
                &entry.name,
                &entry.version,
                &entry.operating_system
            )));
        }
    }

    fn package_compiler_defaults(&self, r#gen: &mut Driver, package: &str) {
        let has_preferences = self
            .ctx
            .packages
            .get(package)
            .is_some_and(|entry| !entry.compiler.is_empty());
        if !has_preferences {
            return;
        }
        let matches = self.sorted_compilers_by_preference(package);
        for (i, compiler) in matches.iter().rev().enumerate() {
            if let Some(version) = compiler.concrete_version() {
                r#gen.fact(fun!(node_compiler_preference(
                    package,
                    &compiler.name,
                    version,
                    -((i as i64) * 100)
                )));
            }
        }
    }

    fn platform_defaults(&self, r#gen: &mut Driver) {
        r#gen.h2("Default platform");
        r#gen.fact(fun!(node_platform_default(&self.ctx.platform.name)));
    }

    fn os_defaults(&self, r#gen: &mut Driver, specs: &[Spec]) {
        r#gen.h2("Possible operating systems");
        let platform = self.ctx.platform;
        let mut possible = BTreeSet::from([
            platform.front_os.clone(),
            platform.back_os.clone(),
            platform.default_os.clone(),
        ]);
        for spec in specs {
            for node in spec.traverse() {
                if let Some(os) = &node.arch.os {
                    possible.insert(os.clone());
                }
            }
        }
        for os in &possible {
            r#gen.fact(fun!(os(os)));
        }
        r#gen.fact(fun!(node_os_default(&platform.default_os)));
    }

    fn target_defaults(&mut self, r#gen: &mut Driver, specs: &[Spec]) -> Result<(), Error> {
        r#gen.h2("Target compatibility");

        let uarch = self.ctx.targets.get(&self.ctx.platform.default_target)?;
        let mut compatible = self
            .ctx
            .targets
            .compatibility_family(&self.ctx.platform.default_target)?;
        let mut best_targets = BTreeSet::from([uarch.family.clone()]);

        for compiler in &self.possible_compilers {
            let Some(version) = compiler.concrete_version() else {
                continue;
            };
            let supported: Vec<_> = compatible
                .iter()
                .filter(|target| {
                    target
                        .optimization_flags(&compiler.name, version)
                        .is_ok()
                })
                .collect();
            if supported.is_empty() {
                continue;
            }
            for target in &supported {
                best_targets.insert(target.name.clone());
                r#gen.fact(fun!(compiler_supports_target(
                    &compiler.name,
                    version,
                    &target.name
                )));
            }
            r#gen.fact(fun!(compiler_supports_target(
                &compiler.name,
                version,
                &uarch.family
            )));
        }

        // Targets explicitly requested by the input extend compatibility.
        for spec in specs {
            for node in spec.traverse() {
                let Some(TargetRequest::Exact(name)) = &node.arch.target else {
                    continue;
                };
                let target = self.ctx.targets.get(name)?;
                if !compatible.iter().any(|t| t.name == target.name) {
                    compatible.push(target);
                }
            }
        }

        let mut best_weight = 0_i64;
        for target in &compatible {
            r#gen.fact(fun!(target(&target.name)));
            r#gen.fact(fun!(target_family(&target.name, &target.family)));
            for parent in &target.parents {
                r#gen.fact(fun!(target_parent(&target.name, parent)));
            }
            if best_targets.contains(&target.name) {
                r#gen.fact(fun!(default_target_weight(&target.name, best_weight)));
                best_weight += 1;
            } else {
                r#gen.fact(fun!(default_target_weight(&target.name, 100_i64)));
            }
            r#gen.newline();
        }
        Ok(())
    }

    fn virtual_providers(&mut self, r#gen: &mut Driver) -> Result<(), Error> {
        r#gen.h2("Virtual providers");
        for virtual_name in self.possible_virtuals.clone() {
            r#gen.fact(AspFunction::new("virtual", vec![(&virtual_name).into()]));
            let mut index = 0_usize;
            for provider in self.repo().providers_for(&virtual_name) {
                let clauses: Vec<_> = provider
                    .provides
                    .iter()
                    .filter(|clause| clause.virtual_name == virtual_name)
                    .cloned()
                    .collect();
                for provides in clauses {
                    let provides_atom = fun!(provides_virtual(&provider.name, &virtual_name));
                    let possible_atom =
                        fun!(possible_provider(&virtual_name, &provider.name, index));
                    self.providers_by_virtual
                        .entry(virtual_name.clone())
                        .or_default()
                        .push(ProviderCandidate {
                            provider: provider.name.clone(),
                            versions: provides.versions.clone(),
                            atom: possible_atom.clone(),
                        });

                    let body = self.spec_traverse_clauses(&provides.condition);
                    let but_node: Vec<_> = body
                        .iter()
                        .filter(|clause| clause.name() != "node")
                        .cloned()
                        .collect();
                    if but_node.is_empty() {
                        r#gen.fact(provides_atom);
                    } else {
                        r#gen.rule(provides_atom, AspAnd::new(but_node));
                    }
                    for clause in body {
                        r#gen.rule(clause, AspAnd::new(vec![possible_atom.clone()]));
                    }
                    r#gen.newline();
                    index += 1;
                }
            }
            r#gen.newline();
        }
        Ok(())
    }

    fn virtual_preferences(
        &self,
        r#gen: &mut Driver,
        package: &str,
        fact: impl Fn(&str, &str, usize) -> AspFunction,
    ) {
        let Some(entry) = self.ctx.packages.get(package) else {
            return;
        };
        for (virtual_name, providers) in &entry.providers {
            if !self.possible_virtuals.contains(virtual_name) {
                continue;
            }
            for (i, provider) in providers.iter().enumerate() {
                r#gen.fact(fact(virtual_name, provider, i + 10));
            }
        }
    }

    fn provider_defaults(&self, r#gen: &mut Driver) {
        r#gen.h2("Default virtual providers");
        self.virtual_preferences(r#gen, "all", |virtual_name, provider, i| {
            fun!(default_provider_preference(virtual_name, provider, i))
        });
    }

    fn external_packages(&mut self, r#gen: &mut Driver) -> Result<(), Error> {
        r#gen.h1("External packages");
        let packages: Vec<(String, _)> = self
            .ctx
            .packages
            .iter()
            .filter(|(name, _)| *name != "all")
            .map(|(name, entry)| (name.to_string(), entry.clone()))
            .collect();

        for (package, entry) in packages {
            if entry.externals.is_empty() {
                // A configured package without externals can never be
                // external.
                r#gen.fact_negated(fun!(external(&package)));
                continue;
            }

            r#gen.h2(&format!("External package: {package}"));
            if !entry.buildable {
                r#gen.fact(fun!(external_only(&package)));
            }

            let mut parsed = Vec::new();
            for (id, external) in entry.externals.iter().enumerate() {
                let spec = external.parsed_spec()?;
                let version = spec
                    .root()
                    .concrete_version()
                    .cloned()
                    .ok_or_else(|| {
                        concrete_config::Error::InvalidEntry {
                            scope: format!("packages:{package}"),
                            reason: format!(
                                "external spec '{}' must pin a single version",
                                external.spec
                            ),
                        }
                    })?;
                parsed.push((version, id, spec));
            }

            let mut by_version: Vec<(Version, usize)> = parsed
                .iter()
                .map(|(version, id, _)| (version.clone(), *id))
                .collect();
            by_version.sort();
            for (weight, (version, id)) in by_version.iter().enumerate() {
                r#gen.fact(fun!(external_version_declared(
                    &package,
                    version,
                    -((weight as i64) + 1),
                    *id
                )));
            }

            let mut spec_ids = Vec::new();
            for (_, id, spec) in &parsed {
                r#gen.newline();
                let spec_id = fun!(external_spec(&package, *id));
                let mut clauses = Vec::new();
                for node in spec.traverse() {
                    clauses.extend(self.spec_clauses(node, ClauseMode::Body));
                }
                r#gen.rule(spec_id.clone(), AspAnd::new(clauses.clone()));
                for clause in clauses {
                    r#gen.rule(clause, AspAnd::new(vec![spec_id.clone()]));
                }
                spec_ids.push(spec_id);
            }

            r#gen.newline();
            r#gen.one_of_iff(fun!(external(&package)), spec_ids);
        }
        Ok(())
    }

    fn flag_defaults(&self, r#gen: &mut Driver) {
        r#gen.h2("Compiler flag defaults");
        for category in concrete_types::FlagCategory::all() {
            r#gen.fact(fun!(flag_type(category.to_string())));
        }
        r#gen.newline();
        for entry in self.ctx.compilers {
            for (category, flags) in entry.flags.iter() {
                for flag in flags {
                    r#gen.fact(fun!(compiler_version_flag(
                        &entry.name,
                        &entry.version,
                        category.to_string(),
                        flag
                    )));
                }
            }
        }
    }

    fn pkg_version_rules(&self, r#gen: &mut Driver, package: &str) {
        let priority: BTreeMap<Version, usize> = self
            .ctx
            .packages
            .get(package)
            .map(|entry| {
                entry
                    .version
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| Some((v.parse().ok()?, i)))
                    .collect()
            })
            .unwrap_or_default();

        let Some(versions) = self.possible_versions.get(package) else {
            return;
        };
        let Ok(descriptor) = self.ctx.repo.get(package) else {
            return;
        };

        // The sort key orders the factors that pick a version: explicit
        // user order, the preferred flag, then latest non-develop.
        let mut ordered: Vec<&Version> = versions.iter().collect();
        ordered.sort_by_key(|version| {
            let user_rank = -(priority.get(version).copied().unwrap_or(0) as i64);
            let preferred = descriptor
                .version_meta(version)
                .is_some_and(|meta| meta.preferred);
            (user_rank, preferred, !version.is_develop(), (*version).clone())
        });
        ordered.reverse();

        for (i, version) in ordered.iter().enumerate() {
            r#gen.fact(fun!(version_declared(package, *version, i)));
        }
    }

    fn conflict_rules(&mut self, r#gen: &mut Driver, package: &str) -> Result<(), Error> {
        let descriptor = self.repo().get(package)?;
        for conflict in descriptor.conflicts.clone() {
            let mut body_spec = Spec::new(package);
            body_spec.constrain(&conflict.constraint)?;
            body_spec.constrain(&conflict.trigger)?;

            let clauses: Vec<_> = self
                .spec_traverse_clauses(&body_spec)
                .into_iter()
                // Conflicts reference the final compiler assignment, not
                // the user's hard request.
                .filter(|clause| clause.name() != "node_compiler_hard")
                .collect();

            r#gen.integrity_constraint(
                AspAnd::new(clauses),
                Some(AspAnd::new(vec![fun!(external(package))])),
            );
        }
        Ok(())
    }

    fn package_dependencies_rules(&mut self, r#gen: &mut Driver, package: &str) -> Result<(), Error> {
        let descriptor = self.repo().get(package)?;
        let mut clauses = descriptor.dependencies.clone();
        clauses.sort_by_key(|clause| {
            (
                clause.spec.root_name().to_string(),
                clause.condition.to_string(),
            )
        });

        for clause in &clauses {
            let dependency = clause.spec.root_name().to_string();
            for deptype in clause.types.iter() {
                if deptype == DepType::Test && !self.ctx.tests.tests_for(package) {
                    continue;
                }
                let head = fun!(declared_dependency(
                    package,
                    &dependency,
                    deptype.to_string()
                ));
                if clause.condition.is_trivial() {
                    r#gen.fact(head);
                } else {
                    let body = self.spec_traverse_clauses(&clause.condition);
                    r#gen.rule(head, AspAnd::new(body));
                }
            }

            if self.ctx.repo.is_virtual(&dependency) {
                self.possible_virtuals.insert(dependency.clone());
                let versions = clause.spec.root().versions.clone();
                let mut body = vec![fun!(real_node(package))];
                body.extend(self.spec_traverse_clauses(&clause.condition));
                r#gen.rule(
                    fun!(single_provider_for(&dependency, &versions)),
                    AspAnd::new(body),
                );
                self.virtual_constraints.insert((dependency, versions));
            } else {
                let dep_clauses = self.spec_clauses(clause.spec.root(), ClauseMode::Head);
                for dep_clause in dep_clauses {
                    let mut body = vec![fun!(depends_on(package, &dependency))];
                    body.extend(self.spec_traverse_clauses(&clause.condition));
                    r#gen.rule(dep_clause, AspAnd::new(body));
                }
            }
            r#gen.newline();
        }
        Ok(())
    }

    fn pkg_rules(&mut self, r#gen: &mut Driver, package: &str) -> Result<(), Error> {
        self.pkg_version_rules(r#gen, package);
        r#gen.newline();

        let descriptor = self.repo().get(package)?;
        for (name, schema) in descriptor.variants.clone() {
            r#gen.fact(fun!(variant(package, &name)));
            if schema.single {
                r#gen.fact(fun!(variant_single_value(package, &name)));
            }
            for default in &schema.defaults {
                r#gen.fact(fun!(variant_default_value_from_package_py(
                    package, &name, default
                )));
            }
            for value in schema.possible_values() {
                r#gen.fact(fun!(variant_possible_value(package, &name, &value)));
            }
            r#gen.newline();
        }

        self.conflict_rules(r#gen, package)?;
        self.package_compiler_defaults(r#gen, package);
        self.package_dependencies_rules(r#gen, package)?;
        self.virtual_preferences(r#gen, package, |virtual_name, provider, i| {
            fun!(pkg_provider_preference(package, virtual_name, provider, i))
        });
        Ok(())
    }

    fn preferred_variants(&self, r#gen: &mut Driver, package: &str) {
        let Some(entry) = self.ctx.packages.get(package) else {
            return;
        };
        for (name, value) in entry.preferred_variants() {
            for v in value.values() {
                r#gen.fact(fun!(variant_default_value_from_packages_yaml(
                    package, &name, v
                )));
            }
        }
    }

    fn preferred_targets(&self, r#gen: &mut Driver, package: &str) {
        let Some(entry) = self.ctx.packages.get(package) else {
            return;
        };
        let preferred = entry
            .target
            .iter()
            .find(|name| self.ctx.targets.contains(name));
        if let Some(target) = preferred {
            r#gen.fact(fun!(package_target_weight(target, package, -30_i64)));
        }
    }

    fn preferred_versions(&self, r#gen: &mut Driver, package: &str) {
        let Some(entry) = self.ctx.packages.get(package) else {
            return;
        };
        for (i, version) in entry.version.iter().rev().enumerate() {
            match version.parse::<Version>() {
                Ok(version) => r#gen.fact(fun!(preferred_version_declared(
                    package,
                    &version,
                    -((i as i64) + 1)
                ))),
                Err(error) => debug!("Skipping version preference {version:?}: {error}"),
            }
        }
    }

    fn inject_spec_node(&mut self, r#gen: &mut Driver, node: &SpecNode) -> Result<(), Error> {
        if self.ctx.repo.is_virtual(&node.name) {
            self.possible_virtuals.insert(node.name.clone());
            let versions = node.versions.clone();
            r#gen.fact(fun!(virtual_node(&node.name)));
            r#gen.fact(fun!(single_provider_for(&node.name, &versions)));
            self.virtual_constraints.insert((node.name.clone(), versions));
            return Ok(());
        }

        let clauses = self.spec_clauses(node, ClauseMode::Head);
        for clause in clauses {
            r#gen.fact(clause.clone());
            if clause.name() != "variant_set" {
                continue;
            }

            let variant_name = clause.args()[1].raw();
            match variant_name.as_str() {
                // dev_path and patches are injected from the command
                // line or from files, never declared by descriptors.
                "dev_path" => {
                    r#gen.fact(fun!(variant(&node.name, "dev_path")));
                    r#gen.fact(fun!(variant_single_value(&node.name, "dev_path")));
                }
                "patches" => {
                    r#gen.fact(fun!(variant(&node.name, "patches")));
                }
                _ => {
                    let descriptor = self.repo().get(&node.name)?;
                    let value = node
                        .variants
                        .get(&variant_name)
                        .cloned()
                        .unwrap_or(concrete_types::VariantValue::Any);
                    let valid = descriptor
                        .variants
                        .get(&variant_name)
                        .is_some_and(|schema| schema.validate(&value));
                    if !valid {
                        return Err(Error::InvalidVariantValue {
                            package: node.name.clone(),
                            variant: variant_name,
                            value: value.to_string(),
                        });
                    }
                }
            }
            // Echo the value as possible, so open-ended variants may
            // carry values the descriptor does not enumerate.
            r#gen.fact(AspFunction::new(
                "variant_possible_value",
                clause.args().to_vec(),
            ));
        }
        Ok(())
    }

    fn define_virtual_constraints(&mut self, r#gen: &mut Driver) {
        for (virtual_name, versions) in self.virtual_constraints.clone() {
            r#gen.h2(&format!("Virtual spec: {virtual_name}@{versions}"));
            let candidates = self
                .providers_by_virtual
                .get(&virtual_name)
                .cloned()
                .unwrap_or_default();
            let possible: Vec<AspFunction> = candidates
                .iter()
                .filter(|candidate| candidate.versions.intersect(&versions).is_some())
                .map(|candidate| candidate.atom.clone())
                .collect();
            debug!(
                "Virtual {virtual_name}@{versions} has {} possible providers: {:?}.",
                possible.len(),
                candidates
                    .iter()
                    .map(|c| c.provider.as_str())
                    .collect::<Vec<_>>()
            );
            r#gen.one_of_iff(
                fun!(single_provider_for(&virtual_name, &versions)),
                possible,
            );
            r#gen.newline();
        }
    }

    fn define_version_constraints(&mut self, r#gen: &mut Driver) {
        for (package, versions) in self.version_constraints.clone() {
            let possible = self
                .possible_versions
                .get(&package)
                .cloned()
                .unwrap_or_default();
            let mut allowed: Vec<&Version> = possible
                .iter()
                .filter(|v| versions.satisfied_by(v))
                .collect();

            // Account for a variable number of version components: an
            // exactly matching declared version wins over prefix matches.
            if let Some(exact) = versions.as_exact() {
                if possible.contains(exact) {
                    allowed = vec![exact];
                }
            }

            if allowed.len() == possible.len() {
                // The range imposes no constraint.
                continue;
            }

            let predicates: Vec<AspFunction> = allowed
                .iter()
                .map(|v| fun!(version(&package, *v)))
                .collect();
            r#gen.one_of_iff(fun!(version_satisfies(&package, &versions)), predicates);
            r#gen.newline();
        }
    }

    fn define_compiler_version_constraints(&mut self, r#gen: &mut Driver) {
        for (package, constraint) in self.compiler_version_constraints.clone() {
            let possible: Vec<AspFunction> = self
                .possible_compilers
                .iter()
                .filter(|compiler| {
                    compiler.name == constraint.name
                        && compiler
                            .concrete_version()
                            .is_some_and(|v| constraint.versions.satisfied_by(v))
                })
                .filter_map(|compiler| {
                    let version = compiler.concrete_version()?;
                    Some(fun!(node_compiler_version(
                        &package,
                        &compiler.name,
                        version
                    )))
                })
                .collect();

            r#gen.one_of_iff(
                fun!(node_compiler_version_satisfies(
                    &package,
                    &constraint.name,
                    &constraint.versions
                )),
                possible,
            );
            r#gen.newline();
        }
    }

    fn define_target_constraints(&mut self, r#gen: &mut Driver) -> Result<(), Error> {
        for (package, request) in self.target_constraints.clone() {
            let allowed: Vec<&concrete_config::Target> = match &request {
                TargetRequest::Exact(name) => {
                    // Recorded only when the name is unknown; nothing can
                    // satisfy it.
                    debug!("Target {name} is not in the target database.");
                    Vec::new()
                }
                TargetRequest::Range { lo, hi } => self
                    .ctx
                    .targets
                    .satisfying_range(lo.as_deref(), hi.as_deref())?,
            };

            let predicates: Vec<AspFunction> = allowed
                .iter()
                .map(|target| fun!(node_target(&package, &target.name)))
                .collect();
            r#gen.one_of_iff(
                fun!(node_target_satisfies(&package, request.to_string())),
                predicates,
            );
            r#gen.newline();
        }
        Ok(())
    }
}
