//! Rebuilding concrete specs from a stable model.

use std::collections::{BTreeMap, BTreeSet};

use concrete_types::{
    CompilerConstraint,
    DepType,
    DepTypes,
    ExternalAttributes,
    FlagCategory,
    Spec,
    SpecNode,
    TargetRequest,
    VariantValue,
    Version,
    VersionRequest,
    extend_flag_list,
    same_flag_sets,
};
use log::debug;

use crate::{Error, SolveContext, asp::AspFunction};

/// Rebuilds a set of concrete specs from the atoms of a stable model.
///
/// Atoms are applied in a fixed priority order so that construction
/// invariants hold: `node` atoms create specs first, `node_compiler`
/// atoms follow, everything else comes after.
#[derive(Debug)]
pub struct SpecBuilder<'a, 'ctx> {
    ctx: &'a SolveContext<'ctx>,
    input_specs: &'a [Spec],
}

#[derive(Debug, Default)]
struct BuildState {
    nodes: BTreeMap<String, SpecNode>,
    edges: BTreeMap<String, BTreeMap<String, DepTypes>>,
    flag_sources: BTreeMap<String, BTreeSet<String>>,
    flag_compiler_defaults: BTreeSet<String>,
}

impl BuildState {
    fn node_mut(&mut self, package: &str) -> Result<&mut SpecNode, Error> {
        self.nodes.get_mut(package).ok_or_else(|| {
            Error::Internal(format!("model atom references unknown node {package}"))
        })
    }

    /// Ancestors of `package` in the reconstructed DAG, dependents
    /// first, the package itself last.
    fn ancestors_post_order(&self, package: &str) -> Vec<String> {
        fn visit(
            state: &BuildState,
            package: &str,
            visited: &mut BTreeSet<String>,
            out: &mut Vec<String>,
        ) {
            if !visited.insert(package.to_string()) {
                return;
            }
            let mut parents: Vec<&String> = state
                .edges
                .iter()
                .filter(|(_, deps)| deps.contains_key(package))
                .map(|(parent, _)| parent)
                .collect();
            parents.sort_unstable();
            let parents: Vec<String> = parents.into_iter().cloned().collect();
            for parent in &parents {
                visit(state, parent, visited, out);
            }
            out.push(package.to_string());
        }

        let mut visited = BTreeSet::new();
        let mut out = Vec::new();
        visit(self, package, &mut visited, &mut out);
        out
    }
}

impl<'a, 'ctx> SpecBuilder<'a, 'ctx> {
    /// Creates a builder for one model reconstruction.
    pub fn new(ctx: &'a SolveContext<'ctx>, input_specs: &'a [Spec]) -> Self {
        Self { ctx, input_specs }
    }

    /// Rebuilds all concrete specs from the shown atoms of a model.
    ///
    /// Returns the concrete DAG rooted at every concretized package.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] on malformed model atoms, inconsistent
    /// flag sets, or when a deprecated version was chosen.
    pub fn build_specs(&self, atoms: &[AspFunction]) -> Result<BTreeMap<String, Spec>, Error> {
        let mut ordered: Vec<&AspFunction> = atoms.iter().collect();
        // Atoms come back in no particular order; apply object-creating
        // actions first.
        ordered.sort_by_key(|atom| match atom.name() {
            "node" => -2_i8,
            "node_compiler" => -1,
            _ => 0,
        });

        let mut state = BuildState::default();
        for atom in ordered {
            self.apply(&mut state, atom)?;
        }

        self.reorder_flags(&mut state)?;
        self.assign_namespaces(&mut state);
        self.inject_patches(&mut state);
        self.ensure_external_paths(&mut state);
        self.reapply_dev_paths(&mut state);
        self.check_deprecated(&state)?;

        let mut specs = BTreeMap::new();
        for name in state.nodes.keys() {
            let mut spec = Spec::from_parts(name, &state.nodes, &state.edges)?;
            spec.mark_concrete();
            specs.insert(name.clone(), spec);
        }
        Ok(specs)
    }

    fn apply(&self, state: &mut BuildState, atom: &AspFunction) -> Result<(), Error> {
        let arg = |i: usize| -> Result<String, Error> {
            atom.args().get(i).map(|a| a.raw()).ok_or_else(|| {
                Error::Internal(format!("model atom {atom} is missing argument {i}"))
            })
        };

        match atom.name() {
            "node" => {
                let package = arg(0)?;
                state
                    .nodes
                    .entry(package.clone())
                    .or_insert_with(|| SpecNode::new(&package));
            }
            "node_platform" => {
                let package = arg(0)?;
                state.node_mut(&package)?.arch.platform = Some(arg(1)?);
            }
            "node_os" => {
                let package = arg(0)?;
                state.node_mut(&package)?.arch.os = Some(arg(1)?);
            }
            "node_target" => {
                let package = arg(0)?;
                state.node_mut(&package)?.arch.target = Some(TargetRequest::Exact(arg(1)?));
            }
            "version" => {
                let package = arg(0)?;
                let version: Version = arg(1)?
                    .parse()
                    .map_err(|e| Error::Internal(format!("bad model version: {e}")))?;
                state.node_mut(&package)?.versions = VersionRequest::Exact(version);
            }
            "node_compiler" => {
                let package = arg(0)?;
                state.node_mut(&package)?.compiler = Some(CompilerConstraint::new(&arg(1)?));
            }
            "node_compiler_version" => {
                let package = arg(0)?;
                let name = arg(1)?;
                let version: Version = arg(2)?
                    .parse()
                    .map_err(|e| Error::Internal(format!("bad compiler version: {e}")))?;
                let node = state.node_mut(&package)?;
                match &mut node.compiler {
                    Some(compiler) if compiler.name == name => {
                        compiler.versions = VersionRequest::Exact(version);
                    }
                    _ => node.compiler = Some(CompilerConstraint::concrete(&name, version)),
                }
            }
            "variant_value" => {
                let package = arg(0)?;
                let name = arg(1)?;
                let value = arg(2)?;
                self.set_variant(state, &package, &name, &value)?;
            }
            "node_flag" => {
                let package = arg(0)?;
                let category = FlagCategory::from_name(&arg(1)?)?;
                state.node_mut(&package)?.flags.push(category, &arg(2)?);
            }
            "node_flag_compiler_default" => {
                state.flag_compiler_defaults.insert(arg(0)?);
            }
            "node_flag_source" => {
                let package = arg(0)?;
                state
                    .flag_sources
                    .entry(package)
                    .or_default()
                    .insert(arg(1)?);
            }
            "no_flags" => {
                let package = arg(0)?;
                let category = FlagCategory::from_name(&arg(1)?)?;
                state.node_mut(&package)?.flags.set(category, Vec::new());
            }
            "external_spec" => {
                let package = arg(0)?;
                let index = atom.args().get(1).and_then(|a| a.as_int()).ok_or_else(|| {
                    Error::Internal(format!("model atom {atom} has no external index"))
                })? as usize;
                self.attach_external(state, &package, index)?;
            }
            "depends_on" => {
                let package = arg(0)?;
                let dependency = arg(1)?;
                let deptype: DepType = arg(2)?
                    .parse()
                    .map_err(|_| Error::Internal(format!("bad dependency type in {atom}")))?;
                state
                    .edges
                    .entry(package)
                    .or_default()
                    .entry(dependency)
                    .or_default()
                    .insert(deptype);
            }
            unknown => {
                // Not every shown atom maps to a build action.
                debug!("No build action for model atom {unknown}: {atom}.");
            }
        }
        Ok(())
    }

    fn set_variant(
        &self,
        state: &mut BuildState,
        package: &str,
        name: &str,
        value: &str,
    ) -> Result<(), Error> {
        let node = state.node_mut(package)?;
        match name {
            "dev_path" => {
                node.variants
                    .entry(name.to_string())
                    .or_insert_with(|| VariantValue::Single(value.to_string()));
            }
            "patches" => {
                node.variants
                    .entry(name.to_string())
                    .or_insert_with(|| VariantValue::Multi(Vec::new()))
                    .append(value);
            }
            _ => {
                if let Some(existing) = node.variants.get_mut(name) {
                    existing.append(value);
                    return Ok(());
                }
                let single = self
                    .ctx
                    .repo
                    .get(package)
                    .ok()
                    .and_then(|descriptor| descriptor.variants.get(name))
                    .is_none_or(|schema| schema.single);
                let fresh = if single {
                    VariantValue::Single(value.to_string())
                } else {
                    VariantValue::Multi(vec![value.to_string()])
                };
                node.variants.insert(name.to_string(), fresh);
            }
        }
        Ok(())
    }

    fn attach_external(
        &self,
        state: &mut BuildState,
        package: &str,
        index: usize,
    ) -> Result<(), Error> {
        let entry = self
            .ctx
            .packages
            .get(package)
            .and_then(|entry| entry.externals.get(index))
            .ok_or_else(|| {
                Error::Internal(format!(
                    "model chose external {index} of {package}, which is not configured"
                ))
            })?;
        state.node_mut(package)?.external = Some(ExternalAttributes {
            prefix: entry.prefix.clone(),
            modules: entry.modules.clone(),
            extra_attributes: entry.extra_attributes.clone(),
        });
        Ok(())
    }

    /// Orders compiler flags so that a node's own flags come last on its
    /// compile line, after any flags inherited from its dependents.
    fn reorder_flags(&self, state: &mut BuildState) -> Result<(), Error> {
        // Nodes without explicit flags inherit the compiler's flag order.
        for package in state.flag_compiler_defaults.clone() {
            let node = state.node_mut(&package)?;
            let Some(compiler) = node.compiler.clone() else {
                continue;
            };
            let entry = self
                .ctx
                .compilers
                .iter()
                .find(|entry| compiler.concrete_version() == Some(&entry.version) && compiler.name == entry.name);
            let Some(entry) = entry else {
                continue;
            };
            if !same_flag_sets(&node.flags, &entry.flags) {
                return Err(Error::Internal(format!(
                    "compiler default flags of {package} diverge from the model"
                )));
            }
            for (category, flags) in entry.flags.iter() {
                node.flags.set(category, flags.to_vec());
            }
        }

        // Index input spec nodes by name; they carry the original flag
        // order of each source.
        let mut command_line_nodes: BTreeMap<&str, &SpecNode> = BTreeMap::new();
        for spec in self.input_specs {
            for node in spec.traverse() {
                command_line_nodes.insert(&node.name, node);
            }
        }

        for (package, sources) in state.flag_sources.clone() {
            let order = state.ancestors_post_order(&package);
            let mut sorted_sources: Vec<&String> = sources
                .iter()
                .filter(|source| order.iter().any(|name| name == *source))
                .collect();
            sorted_sources
                .sort_by_key(|source| order.iter().position(|name| name == *source));

            let mut merged = concrete_types::FlagMap::new();
            for source in sorted_sources {
                let Some(source_node) = command_line_nodes.get(source.as_str()) else {
                    continue;
                };
                for (category, flags) in source_node.flags.iter() {
                    let mut existing = merged.get(category).unwrap_or_default().to_vec();
                    extend_flag_list(&mut existing, flags);
                    merged.set(category, existing);
                }
            }

            let node = state.node_mut(&package)?;
            if !same_flag_sets(&node.flags, &merged) {
                return Err(Error::Internal(format!(
                    "flags of {package} diverge from their sources"
                )));
            }
            for (category, flags) in merged.iter() {
                node.flags.set(category, flags.to_vec());
            }
        }
        Ok(())
    }

    fn assign_namespaces(&self, state: &mut BuildState) {
        let namespace = self.ctx.repo.namespace().to_string();
        for node in state.nodes.values_mut() {
            node.namespace = Some(namespace.clone());
        }
    }

    /// Carries `patches` variants over from the input, for nodes whose
    /// patch list is fixed by the request rather than the repository.
    fn inject_patches(&self, state: &mut BuildState) {
        for spec in self.input_specs {
            for input in spec.traverse() {
                let Some(patches) = input.variants.get("patches") else {
                    continue;
                };
                if let Some(node) = state.nodes.get_mut(&input.name) {
                    node.variants
                        .entry("patches".to_string())
                        .or_insert_with(|| patches.clone());
                }
            }
        }
    }

    /// Synthesizes a prefix for externals that only declare modules.
    fn ensure_external_paths(&self, state: &mut BuildState) {
        for node in state.nodes.values_mut() {
            let Some(external) = &mut node.external else {
                continue;
            };
            if external.prefix.is_none() {
                if let Some(module) = external.modules.first() {
                    external.prefix = Some(format!("/opt/modules/{module}"));
                }
            }
        }
    }

    fn reapply_dev_paths(&self, state: &mut BuildState) {
        for spec in self.input_specs {
            for input in spec.traverse() {
                let Some(dev_path) = input.dev_path() else {
                    continue;
                };
                if let Some(node) = state.nodes.get_mut(&input.name) {
                    node.variants.insert(
                        "dev_path".to_string(),
                        VariantValue::Single(dev_path.to_string()),
                    );
                }
            }
        }
    }

    fn check_deprecated(&self, state: &BuildState) -> Result<(), Error> {
        for node in state.nodes.values() {
            let Some(version) = node.concrete_version() else {
                continue;
            };
            let deprecated = self
                .ctx
                .repo
                .get(&node.name)
                .ok()
                .and_then(|descriptor| descriptor.version_meta(version))
                .is_some_and(|meta| meta.deprecated);
            if deprecated {
                return Err(Error::Internal(format!(
                    "deprecated version {version} of {} was selected",
                    node.name
                )));
            }
        }
        Ok(())
    }
}
