//! Integration tests for spec reconstruction from model atoms.

mod common;

use std::str::FromStr;

use concrete_solve::{Error, SolveContext, SpecBuilder, asp::AspFunction};
use concrete_types::{DepType, FlagCategory, Spec, TargetRequest, VersionRequest};
use testresult::TestResult;

/// Parses a listing of model atoms, one per line.
fn atoms(listing: &str) -> Vec<AspFunction> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| AspFunction::parse(line).expect("valid model atom"))
        .collect()
}

/// A model assigning the full mpileaks diamond, with `zmpi` providing
/// `mpi` everywhere.
const MPILEAKS_MODEL: &str = r#"
    depends_on("mpileaks", "callpath", "build")
    depends_on("mpileaks", "callpath", "link")
    depends_on("mpileaks", "zmpi", "build")
    depends_on("mpileaks", "zmpi", "link")
    depends_on("callpath", "zmpi", "build")
    depends_on("callpath", "zmpi", "link")
    version("mpileaks", "2.3")
    version("callpath", "1.0")
    version("zmpi", "1.0")
    variant_value("mpileaks", "debug", "false")
    node_platform("mpileaks", "test")
    node_platform("callpath", "test")
    node_platform("zmpi", "test")
    node_os("mpileaks", "debian6")
    node_os("callpath", "debian6")
    node_os("zmpi", "debian6")
    node_target("mpileaks", "x86_64")
    node_target("callpath", "x86_64")
    node_target("zmpi", "x86_64")
    node_compiler("mpileaks", "gcc")
    node_compiler("callpath", "gcc")
    node_compiler("zmpi", "gcc")
    node_compiler_version("mpileaks", "gcc", "4.5.0")
    node_compiler_version("callpath", "gcc", "4.5.0")
    node_compiler_version("zmpi", "gcc", "4.5.0")
    node("mpileaks")
    node("callpath")
    node("zmpi")
"#;

struct Fixture {
    repo: concrete_repo::MemoryRepository,
    compilers: Vec<concrete_config::CompilerEntry>,
    packages: concrete_config::PackagesConfig,
    platform: concrete_config::Platform,
    targets: concrete_config::TargetDatabase,
}

impl Fixture {
    fn new() -> Self {
        Self {
            repo: common::mock_repo(),
            compilers: common::mock_compilers(),
            packages: common::mock_packages_config(),
            platform: common::mock_platform(),
            targets: common::mock_targets(),
        }
    }

    fn ctx(&self) -> SolveContext<'_> {
        SolveContext::new(
            &self.repo,
            &self.packages,
            &self.compilers,
            &self.platform,
            &self.targets,
        )
        .expect("valid fixture context")
    }
}

#[test]
fn models_rebuild_into_concrete_dags() -> TestResult {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();
    let inputs = vec![Spec::from_str("mpileaks ^mpi@10.0")?];
    let builder = SpecBuilder::new(&ctx, &inputs);

    let specs = builder.build_specs(&atoms(MPILEAKS_MODEL))?;
    let mpileaks = specs.get("mpileaks").expect("mpileaks was concretized");

    assert!(mpileaks.is_concrete());
    assert_eq!(
        mpileaks.root().versions,
        VersionRequest::Exact("2.3".parse()?)
    );
    assert_eq!(
        mpileaks.root().arch.target,
        Some(TargetRequest::Exact("x86_64".to_string()))
    );
    assert_eq!(mpileaks.root().namespace.as_deref(), Some("builtin.mock"));

    // The mpi virtual resolved to zmpi and appears nowhere by name.
    assert!(specs.get("mpi").is_none());
    assert!(mpileaks.node("zmpi").is_some());
    let callpath_deps: Vec<_> = mpileaks.dependencies_of("callpath").collect();
    assert_eq!(callpath_deps.len(), 1);
    assert_eq!(callpath_deps[0].0, "zmpi");

    // Exactly one node per package name, shared by both dependents.
    assert_eq!(mpileaks.traverse().count(), 3);
    Ok(())
}

#[test]
fn reconstruction_is_deterministic() -> TestResult {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();
    let inputs = vec![Spec::from_str("mpileaks")?];
    let builder = SpecBuilder::new(&ctx, &inputs);

    let first = builder.build_specs(&atoms(MPILEAKS_MODEL))?;
    let second = builder.build_specs(&atoms(MPILEAKS_MODEL))?;
    assert_eq!(first, second);
    assert_eq!(
        first["mpileaks"].dag_hash(),
        second["mpileaks"].dag_hash()
    );
    Ok(())
}

#[test]
fn dependency_edges_merge_their_types() -> TestResult {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();
    let inputs = vec![Spec::from_str("mpileaks")?];
    let builder = SpecBuilder::new(&ctx, &inputs);

    let specs = builder.build_specs(&atoms(MPILEAKS_MODEL))?;
    let (_, types) = specs["mpileaks"]
        .dependencies_of("mpileaks")
        .find(|(dep, _)| *dep == "zmpi")
        .expect("zmpi edge exists");
    assert!(types.contains(DepType::Build));
    assert!(types.contains(DepType::Link));
    assert!(!types.contains(DepType::Run));
    Ok(())
}

#[test]
fn ancestor_flags_order_before_the_nodes_own() -> TestResult {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();
    // mpileaks sets -g globally; callpath adds -O2 of its own.
    let inputs = vec![Spec::from_str(
        "mpileaks cflags=\"-g\" ^callpath cflags=\"-O2\"",
    )?];
    let builder = SpecBuilder::new(&ctx, &inputs);

    let model = format!(
        "{MPILEAKS_MODEL}
        node_flag(\"mpileaks\", \"cflags\", \"-g\")
        node_flag(\"callpath\", \"cflags\", \"-g\")
        node_flag(\"callpath\", \"cflags\", \"-O2\")
        node_flag(\"zmpi\", \"cflags\", \"-g\")
        node_flag(\"zmpi\", \"cflags\", \"-O2\")
        node_flag_source(\"mpileaks\", \"mpileaks\")
        node_flag_source(\"callpath\", \"mpileaks\")
        node_flag_source(\"callpath\", \"callpath\")
        node_flag_source(\"zmpi\", \"mpileaks\")
        node_flag_source(\"zmpi\", \"callpath\")
    "
    );

    let specs = builder.build_specs(&atoms(&model))?;
    let callpath = &specs["mpileaks"].node("callpath").expect("callpath node");
    // The ancestor's -g lands before callpath's own -O2.
    assert_eq!(
        callpath.flags.get(FlagCategory::Cflags),
        Some(["-g".to_string(), "-O2".to_string()].as_slice())
    );
    Ok(())
}

#[test]
fn externals_attach_their_configured_attributes() -> TestResult {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();
    let inputs = vec![Spec::from_str("externaltool")?];
    let builder = SpecBuilder::new(&ctx, &inputs);

    let specs = builder.build_specs(&atoms(
        r#"
        node("externaltool")
        version("externaltool", "1.0")
        node_platform("externaltool", "test")
        node_os("externaltool", "debian6")
        node_target("externaltool", "x86_64")
        node_compiler("externaltool", "gcc")
        node_compiler_version("externaltool", "gcc", "4.5.0")
        external_spec("externaltool", 0)
        "#,
    ))?;

    let external = specs["externaltool"]
        .root()
        .external
        .as_ref()
        .expect("external attributes attached");
    assert_eq!(external.prefix.as_deref(), Some("/path/to/external_tool"));
    Ok(())
}

#[test]
fn module_only_externals_synthesize_a_prefix() -> TestResult {
    let repo = common::mock_repo();
    let compilers = common::mock_compilers();
    let packages: concrete_config::PackagesConfig = toml::from_str(
        r#"
        [externaltool]

        [[externaltool.externals]]
        spec = "externaltool@1.0"
        modules = ["external-tool/1.0"]
        "#,
    )?;
    let platform = common::mock_platform();
    let targets = common::mock_targets();
    let ctx = SolveContext::new(&repo, &packages, &compilers, &platform, &targets)?;

    let inputs = vec![Spec::from_str("externaltool")?];
    let builder = SpecBuilder::new(&ctx, &inputs);
    let specs = builder.build_specs(&atoms(
        r#"
        node("externaltool")
        version("externaltool", "1.0")
        external_spec("externaltool", 0)
        "#,
    ))?;

    let external = specs["externaltool"]
        .root()
        .external
        .as_ref()
        .expect("external attributes attached");
    assert_eq!(
        external.prefix.as_deref(),
        Some("/opt/modules/external-tool/1.0")
    );
    Ok(())
}

#[test]
fn deprecated_versions_are_rejected_after_the_build() -> TestResult {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();
    let inputs = vec![Spec::from_str("externaltool")?];
    let builder = SpecBuilder::new(&ctx, &inputs);

    let result = builder.build_specs(&atoms(
        r#"
        node("externaltool")
        version("externaltool", "0.8")
        "#,
    ));
    assert!(matches!(result, Err(Error::Internal(_))));
    Ok(())
}

#[test]
fn dev_paths_reapply_from_the_input() -> TestResult {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();
    let inputs = vec![Spec::from_str("b dev_path=/work/b")?];
    let builder = SpecBuilder::new(&ctx, &inputs);

    let specs = builder.build_specs(&atoms(
        r#"
        node("b")
        version("b", "1.0")
        "#,
    ))?;
    assert_eq!(specs["b"].root().dev_path(), Some("/work/b"));
    Ok(())
}
