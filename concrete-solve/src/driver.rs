//! The solver driver: program assembly, solving, and result assembly.

use std::io::Write;

use concrete_types::Spec;
use log::{debug, warn};

use crate::{
    Error,
    SolveContext,
    SolveResult,
    asp::{AspAnd, AspFunction, AspOneOf},
    backend::{AspBackend, RawOutcome, SolveOptions},
    builder::SpecBuilder,
    fun,
    result::Answer,
    setup::SolverSetup,
    timer::Timer,
};

/// The hand-written concretization rules, shipped beside the driver.
const CONCRETIZE_LP: &str = include_str!("concretize.lp");

/// The display directives selecting the atoms a model exposes.
const DISPLAY_LP: &str = include_str!("display.lp");

/// Driver configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DriverOptions {
    /// Whether to tag rules with choice atoms for unsatisfiable cores.
    pub cores: bool,
    /// The options forwarded to the solver.
    pub solve: SolveOptions,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            cores: true,
            solve: SolveOptions::default(),
        }
    }
}

/// Owns one solver session: collects the generated program, runs the
/// backend and reconstructs specs from the optimal model.
///
/// A driver is single-use; [`Driver::solve`] and [`Driver::dump`] consume
/// it.
#[derive(Debug)]
pub struct Driver {
    backend: Box<dyn AspBackend>,
    options: DriverOptions,
    program: String,
    assumptions: Vec<AspFunction>,
}

impl Driver {
    /// Creates a driver over a backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when core-reporting is requested on a
    /// backend that cannot assume over choice atoms; such a backend is
    /// rejected at startup rather than failing mid-solve.
    pub fn new(backend: Box<dyn AspBackend>, options: DriverOptions) -> Result<Self, Error> {
        if options.cores && !backend.supports_assumptions() {
            return Err(Error::Internal(format!(
                "backend {} cannot assume over choice atoms; disable core reporting",
                backend.name()
            )));
        }
        Ok(Self {
            backend,
            options,
            program: String::new(),
            assumptions: Vec::new(),
        })
    }

    /// Creates a driver over the best available backend.
    ///
    /// With the `clingo` feature the in-process bindings are used and
    /// cores are enabled; otherwise the `clingo` executable is driven as
    /// a subprocess and core reporting is off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when no solver is available.
    pub fn with_default_backend() -> Result<Self, Error> {
        #[cfg(feature = "clingo")]
        {
            Self::new(
                Box::new(crate::backend::ClingoApiBackend::new()),
                DriverOptions::default(),
            )
        }
        #[cfg(not(feature = "clingo"))]
        {
            Self::new(
                Box::new(crate::backend::ClingoProcessBackend::new()?),
                DriverOptions {
                    cores: false,
                    solve: SolveOptions::default(),
                },
            )
        }
    }

    /// Creates a driver over the best available backend with explicit
    /// solver options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when no solver is available.
    pub fn with_solve_options(solve: SolveOptions) -> Result<Self, Error> {
        let mut driver = Self::with_default_backend()?;
        driver.options.solve = solve;
        Ok(driver)
    }

    /// Creates a driver that can only generate program text.
    ///
    /// Used for the text-only mode: [`Driver::dump`] works, while
    /// [`Driver::solve`] fails with an internal error.
    pub fn text_only() -> Self {
        Self {
            backend: Box::new(NullBackend),
            options: DriverOptions {
                cores: false,
                solve: SolveOptions::default(),
            },
            program: String::new(),
            assumptions: Vec::new(),
        }
    }

    /// Returns the program text generated so far.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn title(&mut self, name: &str, ch: char) {
        let line: String = std::iter::repeat(ch).take(76).collect();
        self.program.push('\n');
        self.program.push_str(&format!("%{line}\n%% {name}\n%{line}\n"));
    }

    /// Writes a top-level section banner.
    pub fn h1(&mut self, name: &str) {
        self.title(name, '=');
    }

    /// Writes a subsection banner.
    pub fn h2(&mut self, name: &str) {
        self.title(name, '-');
    }

    /// Writes an empty line.
    pub fn newline(&mut self) {
        self.program.push('\n');
    }

    /// Registers a rule's choice atom so the rule can appear in cores.
    ///
    /// Returns the extra positive body literal to append to the rule, if
    /// core-reporting is on.
    fn register_rule_for_cores(&mut self, rule_str: &str) -> Option<AspFunction> {
        if !self.options.cores {
            return None;
        }
        let rule_atom = fun!(rule(rule_str));
        self.program.push_str(&format!("{{ {rule_atom} }}.\n"));
        self.assumptions.push(rule_atom.clone());
        Some(rule_atom)
    }

    /// Asserts a fact (a rule without a body).
    pub fn fact(&mut self, head: AspFunction) {
        if self.options.cores {
            // Facts become assumed choices so they can show up in cores.
            self.program.push_str(&format!("{{ {head} }}.\n"));
            self.assumptions.push(head);
        } else {
            self.program.push_str(&format!("{head}.\n"));
        }
    }

    /// Asserts a classically negated fact.
    pub fn fact_negated(&mut self, head: AspFunction) {
        self.program.push_str(&format!("-{head}.\n"));
    }

    /// Asserts a rule (an implication).
    pub fn rule(&mut self, head: AspFunction, body: AspAnd) {
        let rule_str = format!("{head} :- {body}.");
        match self.register_rule_for_cores(&rule_str) {
            Some(rule_atom) => {
                self.program
                    .push_str(&format!("{head} :- {body}, {rule_atom}.\n"));
            }
            None => {
                self.program.push_str(&rule_str);
                self.program.push('\n');
            }
        }
    }

    /// Asserts an integrity constraint over `clauses`, with optional
    /// default-negated clauses.
    pub fn integrity_constraint(&mut self, clauses: AspAnd, default_negated: Option<AspAnd>) {
        let mut body = clauses.to_string();
        if let Some(negated) = &default_negated {
            for clause in &negated.0 {
                body.push_str(&format!(", not {clause}"));
            }
        }
        let rule_str = format!(":- {body}.");
        match self.register_rule_for_cores(&rule_str) {
            Some(rule_atom) => {
                self.program.push_str(&format!(":- {body}, {rule_atom}.\n"));
            }
            None => {
                self.program.push_str(&rule_str);
                self.program.push('\n');
            }
        }
    }

    /// Asserts that two expressions imply each other.
    pub fn iff(&mut self, lhs: AspFunction, rhs: AspFunction) {
        self.rule(lhs.clone(), AspAnd::new(vec![rhs.clone()]));
        self.rule(rhs, AspAnd::new(vec![lhs]));
    }

    /// Asserts that `head` holds iff exactly one of `alternatives` does.
    ///
    /// Expands to a pair of rules over the derived cardinality atoms
    /// `at_least_1(…)` and `more_than_1(…)`, whose weight constraints
    /// together encode the equivalence.
    pub fn one_of_iff(&mut self, head: AspFunction, alternatives: Vec<AspFunction>) {
        if alternatives.is_empty() {
            return;
        }

        let at_least_1 = AspFunction::new("at_least_1", head.args().to_vec());
        let more_than_1 = AspFunction::new("more_than_1", head.args().to_vec());
        let alternatives_body = alternatives
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");

        self.program.push_str(&format!(
            "% {head} <=> {}\n",
            AspOneOf::new(alternatives.clone())
        ));
        self.program
            .push_str(&format!("{at_least_1} :- 1 {{ {alternatives_body} }}.\n"));
        self.program
            .push_str(&format!("{more_than_1} :- 2 {{ {alternatives_body} }}.\n"));
        self.program
            .push_str(&format!("{head} :- {at_least_1}, not {more_than_1}.\n"));
        self.program.push_str(&format!(":- {head}, {more_than_1}.\n"));
        self.program
            .push_str(&format!(":- {head}, not {at_least_1}.\n"));
    }

    /// Generates the full program for `specs` into this driver.
    pub(crate) fn generate(&mut self, ctx: &SolveContext, specs: &[Spec]) -> Result<(), Error> {
        self.program.push_str(CONCRETIZE_LP);
        let mut setup = SolverSetup::new(ctx);
        setup.setup(self, specs)?;
        self.program.push('\n');
        self.program.push_str(DISPLAY_LP);
        Ok(())
    }

    /// Serializes the generated program to `out` without solving.
    ///
    /// # Errors
    ///
    /// Fails on setup errors or when the sink cannot be written.
    pub fn dump(
        mut self,
        ctx: &SolveContext,
        specs: &[Spec],
        out: &mut dyn Write,
    ) -> Result<(), Error> {
        self.generate(ctx, specs)?;
        out.write_all(self.program.as_bytes())
            .map_err(|e| Error::Internal(format!("cannot write program dump: {e}")))
    }

    /// Grounds and solves the problem for `specs`.
    ///
    /// # Errors
    ///
    /// Setup errors are returned before the solver runs; backend failures
    /// are internal errors. An unsatisfiable problem is not an error.
    pub fn solve(
        mut self,
        ctx: &SolveContext,
        specs: &[Spec],
        timer: &mut Timer,
    ) -> Result<SolveResult, Error> {
        self.generate(ctx, specs)?;
        timer.phase("setup");

        let outcome = self
            .backend
            .solve(&self.program, &self.assumptions, &self.options.solve)?;
        timer.phase("solve");

        let result = self.assemble_result(ctx, specs, outcome)?;
        timer.phase("build");
        Ok(result)
    }

    fn assemble_result(
        &self,
        ctx: &SolveContext,
        specs: &[Spec],
        outcome: RawOutcome,
    ) -> Result<SolveResult, Error> {
        let mut result = SolveResult {
            satisfiable: outcome.satisfiable,
            ..SolveResult::default()
        };
        if !outcome.warnings.trim().is_empty() {
            warn!("The solver reported warnings:\n{}", outcome.warnings.trim());
            result.warnings = Some(outcome.warnings);
        }
        if !outcome.raw_output.is_empty() {
            result.raw_output = Some(outcome.raw_output);
        }

        if outcome.satisfiable {
            let best = outcome
                .models
                .iter()
                .min_by(|a, b| a.cost.cmp(&b.cost).then(a.index.cmp(&b.index)))
                .ok_or_else(|| {
                    Error::Internal("satisfiable solve produced no models".to_string())
                })?;
            debug!(
                "Best of {} models: #{} with cost {:?}.",
                outcome.models.len(),
                best.index,
                best.cost
            );
            let builder = SpecBuilder::new(ctx, specs);
            let specs_by_name = builder.build_specs(&best.atoms)?;
            result.answers.push(Answer {
                cost: best.cost.clone(),
                model_index: best.index,
                specs: specs_by_name,
            });
        } else {
            result.cores = outcome
                .cores
                .iter()
                .map(|core| core.iter().map(render_core_atom).collect())
                .collect();
        }
        Ok(result)
    }
}

/// Renders one core atom: rule atoms collapse to their rule text, other
/// surviving atoms render as terms.
fn render_core_atom(atom: &AspFunction) -> String {
    if atom.name() == "rule" {
        if let Some(text) = atom.args().first().and_then(|arg| arg.as_str()) {
            return text.to_string();
        }
    }
    atom.to_string()
}

/// A backend for text-only drivers; it refuses to solve.
#[derive(Debug)]
struct NullBackend;

impl AspBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn supports_assumptions(&self) -> bool {
        false
    }

    fn solve(
        &mut self,
        _program: &str,
        _assumptions: &[AspFunction],
        _options: &SolveOptions,
    ) -> Result<RawOutcome, Error> {
        Err(Error::Internal(
            "a text-only driver cannot solve; use a real backend".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_are_tagged_for_cores() {
        let mut driver = Driver::new(
            Box::new(TaggingBackend),
            DriverOptions {
                cores: true,
                solve: SolveOptions::default(),
            },
        )
        .expect("tagging backend supports assumptions");

        driver.rule(
            fun!(declared_dependency("a", "b", "build")),
            AspAnd::new(vec![fun!(node("a"))]),
        );

        let expected_rule =
            r#"declared_dependency("a", "b", "build") :- node("a")."#;
        assert!(driver.program().contains(&format!(
            "{{ rule(\"{}\") }}.",
            expected_rule.replace('"', "\\\"")
        )));
        assert_eq!(driver.assumptions.len(), 1);
        assert_eq!(driver.assumptions[0].name(), "rule");
    }

    #[test]
    fn one_of_iff_expands_to_cardinality_rules() {
        let mut driver = Driver::text_only();
        driver.one_of_iff(
            fun!(version_satisfies("a", "1:2")),
            vec![fun!(version("a", "1.0")), fun!(version("a", "2.0"))],
        );

        let program = driver.program();
        assert!(program.contains(r#"at_least_1("a", "1:2") :- 1 { version("a", "1.0"); version("a", "2.0") }."#));
        assert!(program.contains(r#"more_than_1("a", "1:2") :- 2 { version("a", "1.0"); version("a", "2.0") }."#));
        assert!(
            program.contains(r#"version_satisfies("a", "1:2") :- at_least_1("a", "1:2"), not more_than_1("a", "1:2")."#)
        );
        assert!(program.contains(r#":- version_satisfies("a", "1:2"), more_than_1("a", "1:2")."#));
    }

    #[test]
    fn empty_one_of_iff_emits_nothing() {
        let mut driver = Driver::text_only();
        driver.one_of_iff(fun!(external("a")), Vec::new());
        assert!(driver.program().is_empty());
    }

    #[test]
    fn core_reporting_needs_assumption_support() {
        let result = Driver::new(
            Box::new(NullBackend),
            DriverOptions {
                cores: true,
                solve: SolveOptions::default(),
            },
        );
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    /// A backend that accepts assumptions but never solves.
    #[derive(Debug)]
    struct TaggingBackend;

    impl AspBackend for TaggingBackend {
        fn name(&self) -> &'static str {
            "tagging"
        }

        fn supports_assumptions(&self) -> bool {
            true
        }

        fn solve(
            &mut self,
            _program: &str,
            _assumptions: &[AspFunction],
            _options: &SolveOptions,
        ) -> Result<RawOutcome, Error> {
            Ok(RawOutcome::default())
        }
    }
}
