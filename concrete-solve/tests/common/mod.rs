//! Shared fixtures for the concrete-solve integration tests.

use std::str::FromStr;

use concrete_config::{CompilerEntry, PackagesConfig, Platform, TargetDatabase};
use concrete_repo::{MemoryRepository, PackageBuilder};
use concrete_types::Version;

/// Builds the mock repository used across the integration tests.
///
/// The package set mirrors a small HPC-style world: a preferred old
/// `python`, an `mpi` virtual with three providers, a diamond around
/// `mpileaks`, a build-time `cmake` chain, a package with a compiler
/// conflict, a test-only dependency and an external tool.
pub fn mock_repo() -> MemoryRepository {
    let mut repo = MemoryRepository::new("builtin.mock");
    repo.add_all([
        PackageBuilder::new("python")
            .version("2.7.8")
            .preferred_version("2.7.11")
            .version("3.5.1")
            .build()
            .expect("valid python descriptor"),
        PackageBuilder::new("mpich")
            .version("3.0.3")
            .version("3.0.4")
            .provides("mpi@:3")
            .build()
            .expect("valid mpich descriptor"),
        PackageBuilder::new("mpich2")
            .version("1.1")
            .version("1.2")
            .provides("mpi@:2")
            .build()
            .expect("valid mpich2 descriptor"),
        PackageBuilder::new("zmpi")
            .version("1.0")
            .provides("mpi@10.0:")
            .build()
            .expect("valid zmpi descriptor"),
        PackageBuilder::new("mpileaks")
            .version("1.0")
            .version("2.3")
            .bool_variant("debug", false)
            .depends_on("callpath")
            .depends_on("mpi")
            .build()
            .expect("valid mpileaks descriptor"),
        PackageBuilder::new("callpath")
            .version("0.9")
            .version("1.0")
            .depends_on("mpi")
            .build()
            .expect("valid callpath descriptor"),
        PackageBuilder::new("cmake")
            .version("3.4.3")
            .build()
            .expect("valid cmake descriptor"),
        PackageBuilder::new("cmake-client")
            .version("1.0")
            .depends_on_types("cmake", "build")
            .build()
            .expect("valid cmake-client descriptor"),
        PackageBuilder::new("conflict")
            .version("1.0")
            .bool_variant("foo", true)
            .conflicts("%clang", Some("~foo"))
            .build()
            .expect("valid conflict descriptor"),
        PackageBuilder::new("a")
            .version("1.0")
            .single_variant("foobar", "bar", &["bar", "baz"])
            .depends_on_when("b", "test", None)
            .build()
            .expect("valid a descriptor"),
        PackageBuilder::new("b")
            .version("1.0")
            .build()
            .expect("valid b descriptor"),
        PackageBuilder::new("externaltool")
            .version("0.9")
            .version("1.0")
            .deprecated_version("0.8")
            .build()
            .expect("valid externaltool descriptor"),
    ])
    .expect("no duplicate packages");
    repo
}

/// Returns the configured compilers of the fixture.
pub fn mock_compilers() -> Vec<CompilerEntry> {
    let version = |v: &str| Version::from_str(v).expect("valid compiler version");
    vec![
        CompilerEntry::new("gcc", version("4.5.0"), "debian6"),
        CompilerEntry::new("gcc", version("4.7.2"), "fe"),
        CompilerEntry::new("clang", version("3.3"), "debian6"),
    ]
}

/// Returns the packages configuration of the fixture: one external
/// installation of `externaltool`.
pub fn mock_packages_config() -> PackagesConfig {
    toml::from_str(
        r#"
        [externaltool]
        buildable = false

        [[externaltool.externals]]
        spec = "externaltool@1.0"
        prefix = "/path/to/external_tool"
        "#,
    )
    .expect("valid packages configuration")
}

/// Returns the fixture platform.
pub fn mock_platform() -> Platform {
    Platform::mock()
}

/// Returns the fixture target database.
pub fn mock_targets() -> TargetDatabase {
    TargetDatabase::mock_x86_64()
}
