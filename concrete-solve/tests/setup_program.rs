//! Integration tests for the generated ASP program.
//!
//! These tests run the full setup over the mock world and assert on the
//! program text, which is what the solver actually consumes.

mod common;

use std::str::FromStr;

use concrete_repo::TestPolicy;
use concrete_solve::{Driver, Error, SolveContext};
use concrete_types::Spec;
use pretty_assertions::assert_eq;
use testresult::TestResult;

fn generate(specs: &[&str], tests: TestPolicy) -> Result<String, Error> {
    let repo = common::mock_repo();
    let compilers = common::mock_compilers();
    let packages = common::mock_packages_config();
    let platform = common::mock_platform();
    let targets = common::mock_targets();
    let ctx = SolveContext::new(&repo, &packages, &compilers, &platform, &targets)?
        .with_tests(tests);

    let specs: Vec<Spec> = specs
        .iter()
        .map(|literal| Spec::from_str(literal))
        .collect::<Result<_, _>>()?;

    let mut out = Vec::new();
    Driver::text_only().dump(&ctx, &specs, &mut out)?;
    Ok(String::from_utf8(out).expect("program dumps are UTF-8"))
}

#[test]
fn preferred_python_version_ranks_first() -> TestResult {
    let program = generate(&["python"], TestPolicy::None)?;
    // The preferred flag beats plain version recency.
    assert!(program.contains(r#"version_declared("python", "2.7.11", 0)"#));
    assert!(program.contains(r#"version_declared("python", "3.5.1", 1)"#));
    assert!(program.contains(r#"version_declared("python", "2.7.8", 2)"#));
    Ok(())
}

#[test]
fn exact_version_requests_collapse_to_the_declared_match() -> TestResult {
    let program = generate(&["mpileaks ^mpich2@1.1"], TestPolicy::None)?;
    assert!(program.contains(
        r#"at_least_1("mpich2", "1.1") :- 1 { version("mpich2", "1.1") }."#
    ));
    Ok(())
}

#[test]
fn high_virtual_version_requests_narrow_the_providers() -> TestResult {
    let program = generate(&["mpileaks ^mpi@10.0"], TestPolicy::None)?;
    // Only zmpi provides mpi@10.0:; mpich and mpich2 top out at 3.
    assert!(program.contains(
        r#"at_least_1("mpi", "10.0") :- 1 { possible_provider("mpi", "zmpi", 2) }."#
    ));
    Ok(())
}

#[test]
fn conflicts_become_integrity_constraints_without_hard_compiler_pins() -> TestResult {
    let program = generate(&["conflict %clang~foo"], TestPolicy::None)?;
    assert!(program.contains(
        r#":- node("conflict"), variant_value("conflict", "foo", "false"), node_compiler("conflict", "clang"), not external("conflict")."#
    ));
    assert!(!program.contains(r#"node_compiler_hard("conflict", "clang"), not external"#));
    Ok(())
}

#[test]
fn injected_spec_constraints_use_setter_functors() -> TestResult {
    let program = generate(&["conflict %clang~foo"], TestPolicy::None)?;
    assert!(program.contains(r#"node_compiler_hard("conflict", "clang")."#));
    assert!(program.contains(r#"variant_set("conflict", "foo", "false")."#));
    // Injected values are echoed as possible, for open-ended variants.
    assert!(program.contains(r#"variant_possible_value("conflict", "foo", "false")."#));
    Ok(())
}

#[test]
fn test_dependencies_follow_the_test_policy() -> TestResult {
    let without = generate(&["a foobar=bar"], TestPolicy::None)?;
    assert!(!without.contains(r#"declared_dependency("a", "b", "test")"#));

    let with = generate(
        &["a foobar=bar"],
        TestPolicy::Packages(["a".to_string()].into()),
    )?;
    assert!(with.contains(r#"declared_dependency("a", "b", "test")."#));
    Ok(())
}

#[test]
fn externals_declare_weighted_versions_and_an_equivalence() -> TestResult {
    let program = generate(&["externaltool"], TestPolicy::None)?;
    assert!(program.contains(r#"external_only("externaltool")."#));
    assert!(program.contains(r#"external_version_declared("externaltool", "1.0", -1, 0)"#));
    assert!(program.contains(r#"external_spec("externaltool", 0) :- node("externaltool"), version_satisfies("externaltool", "1.0")."#));
    assert!(program.contains(r#"external("externaltool") :- at_least_1("externaltool"), not more_than_1("externaltool")."#));
    Ok(())
}

#[test]
fn deep_os_settings_are_injected_on_the_root_only() -> TestResult {
    let program = generate(&["cmake-client %gcc@4.7.2 os=fe ^ cmake"], TestPolicy::None)?;
    assert!(program.contains(r#"node_os_set("cmake-client", "fe")."#));
    // cmake inherits its OS through the solve, not through injection.
    assert!(!program.contains(r#"node_os_set("cmake", "fe")"#));
    assert!(program.contains(r#"os("fe")."#));
    assert!(program.contains(r#"compiler_supports_os("gcc", "4.7.2", "fe")."#));
    Ok(())
}

#[test]
fn unknown_packages_fail_before_solving() {
    let result = generate(&["nosuchpackage"], TestPolicy::None);
    assert!(matches!(
        result,
        Err(Error::Repo(concrete_repo::Error::UnknownPackage(name))) if name == "nosuchpackage"
    ));
}

#[test]
fn invalid_variant_values_fail_before_solving() {
    let result = generate(&["a foobar=nope"], TestPolicy::None);
    assert!(matches!(
        result,
        Err(Error::InvalidVariantValue { package, .. }) if package == "a"
    ));
}

#[test]
fn strict_compiler_checking_rejects_unknown_compilers() -> TestResult {
    let repo = common::mock_repo();
    let compilers = common::mock_compilers();
    let packages = common::mock_packages_config();
    let platform = common::mock_platform();
    let targets = common::mock_targets();
    let ctx = SolveContext::new(&repo, &packages, &compilers, &platform, &targets)?
        .with_strict_compilers(true);

    let specs = vec![Spec::from_str("mpileaks %gcc@9.9")?];
    let result = Driver::text_only().dump(&ctx, &specs, &mut Vec::new());
    assert!(matches!(
        result,
        Err(Error::UnavailableCompiler(compiler)) if compiler == "gcc@9.9"
    ));
    Ok(())
}

#[test]
fn lenient_compiler_checking_allows_unknown_compilers() -> TestResult {
    let program = generate(&["mpileaks %gcc@9.9"], TestPolicy::None)?;
    assert!(program.contains(r#"allow_compiler("gcc", "9.9")."#));
    Ok(())
}

#[test]
fn generation_is_deterministic() -> TestResult {
    let first = generate(&["mpileaks ^mpi@10.0", "python"], TestPolicy::None)?;
    let second = generate(&["mpileaks ^mpi@10.0", "python"], TestPolicy::None)?;
    assert_eq!(first, second);
    Ok(())
}
