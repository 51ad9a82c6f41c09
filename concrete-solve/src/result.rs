//! The result of a solve.

use std::collections::BTreeMap;

use concrete_types::Spec;

/// One cost-optimal answer: a set of reconstructed concrete specs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Answer {
    /// The lexicographic cost vector of the chosen model.
    pub cost: Vec<i64>,
    /// The solver's model number.
    pub model_index: usize,
    /// The concrete spec DAG rooted at each concretized package.
    pub specs: BTreeMap<String, Spec>,
}

impl Answer {
    /// Returns the concrete spec rooted at `package`, if present.
    pub fn spec(&self, package: &str) -> Option<&Spec> {
        self.specs.get(package)
    }
}

/// The outcome of a solve.
///
/// Unsatisfiability is part of the result rather than an error, so that
/// callers can inspect which constraints conflicted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SolveResult {
    /// Whether a stable model exists.
    pub satisfiable: bool,
    /// Answers ordered by cost, best first.
    pub answers: Vec<Answer>,
    /// Unsatisfiable cores, each rendered as the rule strings and
    /// surviving atoms that conflict.
    pub cores: Vec<Vec<String>>,
    /// Non-fatal diagnostics from the solver.
    pub warnings: Option<String>,
    /// The solver's raw output, for debugging.
    pub raw_output: Option<String>,
}

impl SolveResult {
    /// Returns the best (lowest-cost) answer, if the solve succeeded.
    pub fn best(&self) -> Option<&Answer> {
        self.answers.first()
    }

    /// Renders the cores as sorted human-readable lines.
    pub fn core_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .cores
            .iter()
            .flat_map(|core| core.iter().cloned())
            .collect();
        lines.sort();
        lines.dedup();
        lines
    }
}
