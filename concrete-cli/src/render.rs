//! Rendering concrete specs for terminal output.

use std::collections::BTreeSet;

use concrete_repo::Repository;
use concrete_solve::Answer;
use concrete_types::{Spec, SpecNode};

use crate::cli::Cover;

/// Options controlling how spec trees render.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderOptions {
    /// How extensively the DAG is traversed.
    pub cover: Cover,
    /// Whether package names are namespace qualified.
    pub namespaces: bool,
    /// Whether dependency types are shown on edges.
    pub types: bool,
}

/// Formats one node on a single line.
pub fn format_node(node: &SpecNode, namespaces: bool) -> String {
    let mut line = String::new();
    if namespaces {
        if let Some(namespace) = &node.namespace {
            line.push_str(namespace);
            line.push('.');
        }
    }
    line.push_str(&node.name);
    if !node.versions.is_any() {
        line.push_str(&format!("@{}", node.versions));
    }
    if let Some(compiler) = &node.compiler {
        line.push_str(&format!("%{compiler}"));
    }
    for (name, value) in &node.variants {
        match value.as_single() {
            Some("true") => line.push_str(&format!("+{name}")),
            Some("false") => line.push_str(&format!("~{name}")),
            _ => line.push_str(&format!(" {name}={value}")),
        }
    }
    if !node.flags.is_empty() {
        line.push_str(&format!(" {}", node.flags));
    }
    if node.arch.is_concrete() {
        let arch = &node.arch;
        line.push_str(&format!(
            " arch={}-{}-{}",
            arch.platform.as_deref().unwrap_or(""),
            arch.os.as_deref().unwrap_or(""),
            arch.target
                .as_ref()
                .and_then(|target| target.as_exact())
                .unwrap_or("")
        ));
    } else if !node.arch.is_empty() {
        line.push_str(&format!(" {}", node.arch));
    }
    line
}

/// Renders a spec DAG as an indented tree.
pub fn tree(spec: &Spec, options: &RenderOptions) -> String {
    let mut out = String::new();
    let mut visited_nodes = BTreeSet::new();
    let mut visited_edges = BTreeSet::new();
    render_subtree(
        spec,
        spec.root_name(),
        0,
        options,
        &mut visited_nodes,
        &mut visited_edges,
        &mut out,
    );
    out
}

fn render_subtree(
    spec: &Spec,
    name: &str,
    depth: usize,
    options: &RenderOptions,
    visited_nodes: &mut BTreeSet<String>,
    visited_edges: &mut BTreeSet<(String, String)>,
    out: &mut String,
) {
    let Some(node) = spec.node(name) else {
        return;
    };

    let first_visit = visited_nodes.insert(name.to_string());
    if depth > 0 {
        out.push_str(&" ".repeat(4 * depth));
        out.push('^');
    }
    out.push_str(&format_node(node, options.namespaces));
    out.push('\n');

    if matches!(options.cover, Cover::Nodes) && !first_visit {
        return;
    }

    for (dependency, types) in spec.dependencies_of(name) {
        let edge = (name.to_string(), dependency.to_string());
        if matches!(options.cover, Cover::Edges) && !visited_edges.insert(edge) {
            continue;
        }
        if options.types && !types.is_empty() {
            out.push_str(&" ".repeat(4 * (depth + 1)));
            out.push_str(&format!("[{types}]\n"));
        }
        render_subtree(
            spec,
            dependency,
            depth + 1,
            options,
            visited_nodes,
            visited_edges,
            out,
        );
    }
}

/// Resolves the answer key for an input spec root.
///
/// Virtual roots resolve to the chosen provider: the first concretized
/// package whose descriptor provides the virtual.
pub fn answer_key(
    repo: &dyn Repository,
    answer: &Answer,
    root: &str,
) -> Option<String> {
    if !repo.is_virtual(root) {
        return Some(root.to_string());
    }
    answer
        .specs
        .keys()
        .find(|name| {
            repo.get(name)
                .is_ok_and(|descriptor| descriptor.provides_virtual(root))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use concrete_types::{DepTypes, SpecNode, VariantValue};
    use testresult::TestResult;

    use super::*;

    fn sample_spec() -> Result<Spec, concrete_types::Error> {
        let mut root = SpecNode::new("mpileaks");
        root.versions = concrete_types::VersionRequest::from_str("2.3")?;
        root.variants
            .insert("debug".to_string(), VariantValue::disabled());
        let mut spec = Spec::from_node(root);
        spec.add_dependency("mpileaks", SpecNode::new("callpath"), DepTypes::build_link());
        spec.add_dependency("callpath", SpecNode::new("zmpi"), DepTypes::build_link());
        spec.add_dependency("mpileaks", SpecNode::new("zmpi"), DepTypes::build_link());
        Ok(spec)
    }

    #[test]
    fn trees_indent_dependencies() -> TestResult {
        let spec = sample_spec()?;
        let rendered = tree(&spec, &RenderOptions::default());
        assert!(rendered.starts_with("mpileaks@2.3~debug\n"));
        assert!(rendered.contains("    ^callpath\n"));
        assert!(rendered.contains("        ^zmpi\n"));
        Ok(())
    }

    #[test]
    fn node_cover_prints_shared_dependencies_once() -> TestResult {
        let spec = sample_spec()?;
        let rendered = tree(&spec, &RenderOptions::default());
        assert_eq!(rendered.matches("^zmpi").count(), 2);
        // Under edge cover zmpi's own subtree would expand once per edge;
        // with node cover both mentions stay leaf lines.
        assert_eq!(rendered.lines().count(), 4);
        Ok(())
    }

    #[test]
    fn dependency_types_show_on_demand() -> TestResult {
        let spec = sample_spec()?;
        let options = RenderOptions {
            types: true,
            ..RenderOptions::default()
        };
        let rendered = tree(&spec, &options);
        assert!(rendered.contains("[build,link]"));
        Ok(())
    }
}
