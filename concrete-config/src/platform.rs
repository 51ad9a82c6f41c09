//! The platform description.

use serde::{Deserialize, Serialize};

/// The platform a solve targets.
///
/// Cluster-style platforms distinguish a front-end and a back-end
/// operating system; single-machine platforms use the same value for all
/// three OS fields.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Platform {
    /// The platform name, e.g. `linux`.
    pub name: String,
    /// The operating system used by default.
    pub default_os: String,
    /// The front-end (login node) operating system.
    pub front_os: String,
    /// The back-end (compute node) operating system.
    pub back_os: String,
    /// The default target microarchitecture.
    pub default_target: String,
}

impl Platform {
    /// Creates a platform where all three OS fields coincide.
    pub fn uniform(name: &str, os: &str, default_target: &str) -> Self {
        Self {
            name: name.to_string(),
            default_os: os.to_string(),
            front_os: os.to_string(),
            back_os: os.to_string(),
            default_target: default_target.to_string(),
        }
    }

    /// Creates the mock platform used in fixtures and demos.
    ///
    /// It mimics a cluster: the front-end OS `fe` differs from the
    /// default back-end OS `debian6`.
    pub fn mock() -> Self {
        Self {
            name: "test".to_string(),
            default_os: "debian6".to_string(),
            front_os: "fe".to_string(),
            back_os: "debian6".to_string(),
            default_target: "x86_64".to_string(),
        }
    }
}
