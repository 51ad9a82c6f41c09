//! Solver backends.
//!
//! The driver is isolated from the concrete solver through
//! [`AspBackend`]: a backend receives the fully generated program text
//! plus the assumption atoms, runs the grounder and solver, and returns
//! stable models, costs and (when supported) unsatisfiable cores with
//! all symbols converted back into the term model.

#[cfg(feature = "clingo")]
mod api;
mod process;

use std::fmt::Debug;

#[cfg(feature = "clingo")]
pub use api::ClingoApiBackend;
pub use process::ClingoProcessBackend;

use crate::{Error, asp::AspFunction};

/// Options forwarded to the solver.
///
/// The defaults are the values the rule program has been tuned with; an
/// integration may override them but rarely should.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SolveOptions {
    /// How many models to search; `0` searches all of them.
    pub models: u32,
    /// The extended-rule translation mode.
    pub trans_ext: String,
    /// The equality-preprocessing level.
    pub eq: i32,
    /// The search configuration preset.
    pub configuration: String,
    /// The number of solver threads.
    pub parallel_mode: u32,
    /// The optimization strategy.
    pub opt_strategy: String,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            models: 0,
            trans_ext: "all".to_string(),
            eq: 5,
            configuration: "tweety".to_string(),
            parallel_mode: 2,
            opt_strategy: "usc,one".to_string(),
        }
    }
}

impl SolveOptions {
    /// Renders the options as solver command line arguments.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            format!("--models={}", self.models),
            format!("--trans-ext={}", self.trans_ext),
            format!("--eq={}", self.eq),
            format!("--configuration={}", self.configuration),
            format!("--parallel-mode={}", self.parallel_mode),
            format!("--opt-strategy={}", self.opt_strategy),
        ]
    }
}

/// One stable model returned by a backend.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawModel {
    /// The model number reported by the solver.
    pub index: usize,
    /// The lexicographic cost vector; lower is better.
    pub cost: Vec<i64>,
    /// The shown atoms of the model.
    pub atoms: Vec<AspFunction>,
}

/// The raw outcome of one solver run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawOutcome {
    /// Whether a stable model exists.
    pub satisfiable: bool,
    /// All models the solver reported, in report order.
    pub models: Vec<RawModel>,
    /// Unsatisfiable cores over the assumption atoms, if any.
    pub cores: Vec<Vec<AspFunction>>,
    /// Diagnostics the solver printed.
    pub warnings: String,
    /// The solver's raw textual output, when it produces one.
    pub raw_output: String,
}

/// A grounding-and-search engine.
pub trait AspBackend: Debug {
    /// A short name identifying the backend.
    fn name(&self) -> &'static str;

    /// Returns whether the backend can assume over choice atoms.
    ///
    /// Core-reporting relies on assumptions; a driver configured for
    /// cores rejects backends without this capability at startup.
    fn supports_assumptions(&self) -> bool;

    /// Grounds and solves `program` under `assumptions`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] on grounder or solver failures, and
    /// when assumptions are passed to a backend that does not support
    /// them.
    fn solve(
        &mut self,
        program: &str,
        assumptions: &[AspFunction],
        options: &SolveOptions,
    ) -> Result<RawOutcome, Error>;
}
