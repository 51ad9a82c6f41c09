//! Abstract and concrete spec DAGs.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    ArchConstraint,
    CompilerConstraint,
    DepTypes,
    Error,
    FlagMap,
    VariantValue,
    Version,
    VersionRequest,
    parser,
};

/// Attributes of a package resolved to an external installation.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ExternalAttributes {
    /// The installation prefix, e.g. `/usr`.
    pub prefix: Option<String>,
    /// Loadable modules that make the installation available.
    pub modules: Vec<String>,
    /// Free-form extra attributes from configuration.
    pub extra_attributes: BTreeMap<String, String>,
}

/// A single node of a spec DAG.
///
/// An abstract node leaves fields open (version ranges, unset
/// architecture, wildcard variants); a concrete node fixes all of them.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SpecNode {
    /// The package name. Empty on an anonymous constraint spec.
    pub name: String,
    /// The acceptable versions.
    pub versions: VersionRequest,
    /// Variant assignments by variant name.
    pub variants: BTreeMap<String, VariantValue>,
    /// The compiler constraint, if any.
    pub compiler: Option<CompilerConstraint>,
    /// The architecture constraint.
    pub arch: ArchConstraint,
    /// Compiler flags by category.
    pub flags: FlagMap,
    /// The repository namespace, assigned on concretization.
    pub namespace: Option<String>,
    /// External attributes, present when resolved to an external package.
    pub external: Option<ExternalAttributes>,
    concrete: bool,
}

impl SpecNode {
    /// Creates an unconstrained node for a package name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: VersionRequest::Any,
            variants: BTreeMap::new(),
            compiler: None,
            arch: ArchConstraint::default(),
            flags: FlagMap::new(),
            namespace: None,
            external: None,
            concrete: false,
        }
    }

    /// Returns the single version of the node, if it requests exactly one.
    pub fn concrete_version(&self) -> Option<&Version> {
        self.versions.as_exact()
    }

    /// Returns whether the node has been sealed as concrete.
    pub fn is_concrete(&self) -> bool {
        self.concrete
    }

    /// Returns the node's `dev_path` variant value, if set.
    pub fn dev_path(&self) -> Option<&str> {
        self.variants
            .get("dev_path")
            .and_then(VariantValue::as_single)
    }

    /// Returns whether the node carries no constraints beyond its name.
    pub fn is_unconstrained(&self) -> bool {
        self.versions.is_any()
            && self.variants.is_empty()
            && self.compiler.is_none()
            && self.arch.is_empty()
            && self.flags.is_empty()
            && self.external.is_none()
    }

    /// Merges the constraints of `other` into this node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleConstraint`] if the two nodes cannot
    /// describe the same package instance.
    pub fn constrain(&mut self, other: &SpecNode) -> Result<(), Error> {
        let clash = |lhs: String, rhs: String| Error::IncompatibleConstraint {
            package: self.name.clone(),
            lhs,
            rhs,
        };

        self.versions = self
            .versions
            .intersect(&other.versions)
            .ok_or_else(|| clash(self.versions.to_string(), other.versions.to_string()))?;

        for (name, value) in &other.variants {
            match self.variants.get_mut(name) {
                None => {
                    self.variants.insert(name.clone(), value.clone());
                }
                Some(existing) if existing == value || value.is_wildcard() => {}
                Some(existing) if existing.is_wildcard() => {
                    *existing = value.clone();
                }
                Some(existing) => match existing {
                    VariantValue::Multi(_) => {
                        for v in value.values() {
                            existing.append(v);
                        }
                    }
                    _ => {
                        return Err(clash(
                            format!("{name}={existing}"),
                            format!("{name}={value}"),
                        ));
                    }
                },
            }
        }

        match (&mut self.compiler, &other.compiler) {
            (_, None) => {}
            (None, Some(compiler)) => self.compiler = Some(compiler.clone()),
            (Some(mine), Some(theirs)) => {
                if mine.name != theirs.name {
                    return Err(clash(format!("%{mine}"), format!("%{theirs}")));
                }
                mine.versions = mine
                    .versions
                    .intersect(&theirs.versions)
                    .ok_or_else(|| clash(format!("%{mine}"), format!("%{theirs}")))?;
            }
        }

        merge_field(&mut self.arch.platform, &other.arch.platform, "platform")
            .map_err(|(lhs, rhs)| clash(lhs, rhs))?;
        merge_field(&mut self.arch.os, &other.arch.os, "os").map_err(|(lhs, rhs)| clash(lhs, rhs))?;
        merge_field(&mut self.arch.target, &other.arch.target, "target")
            .map_err(|(lhs, rhs)| clash(lhs, rhs))?;

        self.flags.extend(&other.flags);
        if self.external.is_none() {
            self.external = other.external.clone();
        }
        Ok(())
    }
}

fn merge_field<T: Clone + Display + PartialEq>(
    mine: &mut Option<T>,
    theirs: &Option<T>,
    key: &str,
) -> Result<(), (String, String)> {
    match (&mine, theirs) {
        (_, None) => Ok(()),
        (None, Some(value)) => {
            *mine = Some(value.clone());
            Ok(())
        }
        (Some(lhs), Some(rhs)) if *lhs == *rhs => Ok(()),
        (Some(lhs), Some(rhs)) => Err((format!("{key}={lhs}"), format!("{key}={rhs}"))),
    }
}

impl Display for SpecNode {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.name)?;
        if !self.versions.is_any() {
            write!(fmt, "@{}", self.versions)?;
        }
        if let Some(compiler) = &self.compiler {
            write!(fmt, "%{compiler}")?;
        }
        for (name, value) in &self.variants {
            match value.as_single() {
                Some("true") => write!(fmt, "+{name}")?,
                Some("false") => write!(fmt, "~{name}")?,
                _ => write!(fmt, " {name}={value}")?,
            }
        }
        if !self.flags.is_empty() {
            write!(fmt, " {}", self.flags)?;
        }
        if !self.arch.is_empty() {
            write!(fmt, " {}", self.arch)?;
        }
        Ok(())
    }
}

/// A spec: a constraint bundle over a package node and its dependency
/// subtree.
///
/// Nodes are keyed by package name (each package appears at most once per
/// DAG) and edges carry dependency-type sets. The same dependency node may
/// be reached from several parents.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Spec {
    root: String,
    nodes: BTreeMap<String, SpecNode>,
    edges: BTreeMap<String, BTreeMap<String, DepTypes>>,
}

impl Spec {
    /// Creates a spec with a single unconstrained root node.
    pub fn new(name: &str) -> Self {
        Self::from_node(SpecNode::new(name))
    }

    /// Creates a spec from a single root node.
    pub fn from_node(node: SpecNode) -> Self {
        let root = node.name.clone();
        let mut nodes = BTreeMap::new();
        nodes.insert(root.clone(), node);
        Self {
            root,
            nodes,
            edges: BTreeMap::new(),
        }
    }

    /// Assembles a spec from prebuilt node and edge maps, pruned to the
    /// nodes reachable from `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingNode`] if `root` or an edge endpoint is not
    /// present in `nodes`.
    pub fn from_parts(
        root: &str,
        nodes: &BTreeMap<String, SpecNode>,
        edges: &BTreeMap<String, BTreeMap<String, DepTypes>>,
    ) -> Result<Self, Error> {
        if !nodes.contains_key(root) {
            return Err(Error::MissingNode(root.to_string()));
        }
        let mut spec = Self {
            root: root.to_string(),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        };
        let mut queue = vec![root.to_string()];
        while let Some(name) = queue.pop() {
            if spec.nodes.contains_key(&name) {
                continue;
            }
            let node = nodes
                .get(&name)
                .ok_or_else(|| Error::MissingNode(name.clone()))?;
            spec.nodes.insert(name.clone(), node.clone());
            if let Some(deps) = edges.get(&name) {
                spec.edges.insert(name.clone(), deps.clone());
                queue.extend(deps.keys().cloned());
            }
        }
        Ok(spec)
    }

    /// Returns the root package name.
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// Returns the root node.
    pub fn root(&self) -> &SpecNode {
        &self.nodes[&self.root]
    }

    /// Returns a mutable reference to the root node.
    pub fn root_mut(&mut self) -> &mut SpecNode {
        self.nodes
            .get_mut(&self.root)
            .expect("the root node always exists")
    }

    /// Returns whether the spec has a package name.
    pub fn is_named(&self) -> bool {
        !self.root.is_empty()
    }

    /// Returns whether the spec is a single node without constraints.
    ///
    /// Trivial specs are used as the always-true activation condition of
    /// unconditional dependency clauses.
    pub fn is_trivial(&self) -> bool {
        self.nodes.len() == 1 && self.root().is_unconstrained()
    }

    /// Names an anonymous spec after `name`.
    ///
    /// Already named specs are returned unchanged.
    pub fn with_default_name(mut self, name: &str) -> Self {
        if self.is_named() {
            return self;
        }
        let mut node = self.nodes.remove("").expect("anonymous root node exists");
        node.name = name.to_string();
        self.nodes.insert(name.to_string(), node);
        if let Some(deps) = self.edges.remove("") {
            self.edges.insert(name.to_string(), deps);
        }
        self.root = name.to_string();
        self
    }

    /// Returns the node for `name`, if present.
    pub fn node(&self, name: &str) -> Option<&SpecNode> {
        self.nodes.get(name)
    }

    /// Returns a mutable reference to the node for `name`, if present.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut SpecNode> {
        self.nodes.get_mut(name)
    }

    /// Returns the node for `name`, creating an unconstrained one if
    /// needed.
    pub fn ensure_node(&mut self, name: &str) -> &mut SpecNode {
        self.nodes
            .entry(name.to_string())
            .or_insert_with(|| SpecNode::new(name))
    }

    /// Iterates over all nodes in name order, root included.
    pub fn traverse(&self) -> impl Iterator<Item = &SpecNode> {
        self.nodes.values()
    }

    /// Iterates over all node names in name order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Adds (or extends) a dependency edge from `parent` to `dep`.
    pub fn add_dependency(&mut self, parent: &str, dep: SpecNode, types: DepTypes) {
        let dep_name = dep.name.clone();
        match self.nodes.get_mut(&dep_name) {
            Some(existing) => {
                // Merging here keeps node identity unique per name.
                let _ = existing.constrain(&dep);
            }
            None => {
                self.nodes.insert(dep_name.clone(), dep);
            }
        }
        self.edges
            .entry(parent.to_string())
            .or_default()
            .entry(dep_name)
            .or_default()
            .extend(&types);
    }

    /// Returns the dependencies of `name` with their edge types.
    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = (&str, &DepTypes)> {
        self.edges
            .get(name)
            .into_iter()
            .flat_map(|deps| deps.iter().map(|(dep, types)| (dep.as_str(), types)))
    }

    /// Returns the names of all direct dependents of `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.contains_key(name))
            .map(|(parent, _)| parent.as_str())
            .collect()
    }

    /// Returns the ancestors of `name` in DAG post-order: roots first,
    /// `name` itself last.
    ///
    /// This is the order in which compiler flags accumulate, so that a
    /// node's own flags take the highest precedence on its compile line.
    pub fn ancestors_post_order(&self, name: &str) -> Vec<String> {
        fn visit(
            spec: &Spec,
            name: &str,
            visited: &mut std::collections::BTreeSet<String>,
            out: &mut Vec<String>,
        ) {
            if !visited.insert(name.to_string()) {
                return;
            }
            let mut parents = spec.dependents_of(name);
            parents.sort_unstable();
            for parent in parents {
                visit(spec, parent, visited, out);
            }
            out.push(name.to_string());
        }

        let mut visited = std::collections::BTreeSet::new();
        let mut order = Vec::new();
        visit(self, name, &mut visited, &mut order);
        order
    }

    /// Merges the constraints of `other` into this spec, node by node.
    ///
    /// # Errors
    ///
    /// Returns an error if any shared node carries incompatible
    /// constraints, or if either spec is anonymous.
    pub fn constrain(&mut self, other: &Spec) -> Result<(), Error> {
        if !self.is_named() || !other.is_named() {
            return Err(Error::AnonymousSpec);
        }
        for node in other.traverse() {
            self.ensure_node(&node.name).constrain(node)?;
        }
        for (parent, deps) in &other.edges {
            for (dep, types) in deps {
                self.edges
                    .entry(parent.clone())
                    .or_default()
                    .entry(dep.clone())
                    .or_default()
                    .extend(types);
            }
        }
        Ok(())
    }

    /// Seals every node of the spec as concrete.
    pub fn mark_concrete(&mut self) {
        for node in self.nodes.values_mut() {
            node.concrete = true;
        }
    }

    /// Returns whether every node of the spec is concrete.
    pub fn is_concrete(&self) -> bool {
        self.nodes.values().all(SpecNode::is_concrete)
    }

    /// Computes the content hash of the DAG rooted at this spec.
    ///
    /// The hash covers a canonical serialization: every reachable node in
    /// name order with its resolved fields, followed by every edge with
    /// its sorted dependency types.
    pub fn dag_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for node in self.traverse() {
            hasher.update(node.to_string().as_bytes());
            hasher.update(b"\n");
            if let Some(external) = &node.external {
                hasher.update(format!("external:{:?}", external).as_bytes());
                hasher.update(b"\n");
            }
        }
        for (parent, deps) in &self.edges {
            for (dep, types) in deps {
                hasher.update(format!("{parent}->{dep}[{types}]\n").as_bytes());
            }
        }
        let digest = hasher.finalize();
        digest.iter().fold(String::new(), |mut out, byte| {
            out.push_str(&format!("{byte:02x}"));
            out
        })
    }
}

impl FromStr for Spec {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parser::parse_spec(input)
    }
}

impl Display for Spec {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.root())?;
        for node in self.traverse().filter(|node| node.name != self.root) {
            write!(fmt, " ^{node}")?;
        }
        Ok(())
    }
}

/// A persistable record of a concrete spec: the DAG plus its content
/// hash.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SpecRecord {
    /// The concrete spec DAG.
    pub spec: Spec,
    /// The content hash of the DAG.
    pub hash: String,
}

impl SpecRecord {
    /// Creates a record for a (typically concrete) spec.
    pub fn new(spec: Spec) -> Self {
        let hash = spec.dag_hash();
        Self { spec, hash }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;
    use crate::DepType;

    fn diamond() -> Spec {
        let mut spec = Spec::new("root");
        spec.add_dependency("root", SpecNode::new("left"), DepTypes::build_link());
        spec.add_dependency("root", SpecNode::new("right"), DepTypes::build_link());
        spec.add_dependency("left", SpecNode::new("leaf"), DepTypes::build_link());
        spec.add_dependency("right", SpecNode::new("leaf"), DepTypes::from([DepType::Run]));
        spec
    }

    #[test]
    fn ancestors_order_parents_before_node() {
        let spec = diamond();
        let order = spec.ancestors_post_order("leaf");
        assert_eq!(order.last().map(String::as_str), Some("leaf"));
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(position("root") < position("left"));
        assert!(position("root") < position("right"));
        assert!(position("left") < position("leaf"));
        assert!(position("right") < position("leaf"));
    }

    #[test]
    fn shared_dependency_nodes_are_unique() {
        let spec = diamond();
        assert_eq!(spec.traverse().count(), 4);
        let types: Vec<_> = spec.dependencies_of("right").collect();
        assert_eq!(types, vec![("leaf", &DepTypes::from([DepType::Run]))]);
    }

    #[rstest]
    #[case("pkg@1.2:", "pkg@1.4", true)]
    #[case("pkg@1.2", "pkg@1.4", false)]
    #[case("pkg+debug", "pkg+debug", true)]
    #[case("pkg+debug", "pkg~debug", false)]
    fn node_constrain(#[case] a: &str, #[case] b: &str, #[case] compatible: bool) -> TestResult {
        let mut a = Spec::from_str(a)?;
        let b = Spec::from_str(b)?;
        assert_eq!(a.constrain(&b).is_ok(), compatible);
        Ok(())
    }

    #[test]
    fn hash_is_stable_and_sensitive() -> TestResult {
        let spec = diamond();
        assert_eq!(spec.dag_hash(), diamond().dag_hash());

        let mut changed = diamond();
        changed.node_mut("leaf").unwrap().versions = VersionRequest::from_str("2.0")?;
        assert_ne!(spec.dag_hash(), changed.dag_hash());
        Ok(())
    }
}
