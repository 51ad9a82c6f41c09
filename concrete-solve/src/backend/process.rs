//! A backend driving the `clingo` executable.

use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
};

use log::debug;

use crate::{
    Error,
    asp::AspFunction,
    backend::{AspBackend, RawModel, RawOutcome, SolveOptions},
};

/// A backend that runs the `clingo` executable as a subprocess.
///
/// The generated program is fed on stdin and the competition output
/// format is parsed back. This backend cannot pass assumptions to the
/// solver, so it cannot produce unsatisfiable cores; a driver that
/// wants cores must use the in-process bindings instead.
#[derive(Clone, Debug)]
pub struct ClingoProcessBackend {
    executable: PathBuf,
}

impl ClingoProcessBackend {
    /// Locates `clingo` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the executable is missing; a
    /// missing solver is fatal at initialization time.
    pub fn new() -> Result<Self, Error> {
        let executable = which::which("clingo").map_err(|_| {
            Error::Internal("the clingo executable was not found on PATH".to_string())
        })?;
        Ok(Self { executable })
    }

    /// Uses an explicit executable path.
    pub fn with_executable(executable: PathBuf) -> Self {
        Self { executable }
    }
}

impl AspBackend for ClingoProcessBackend {
    fn name(&self) -> &'static str {
        "clingo-process"
    }

    fn supports_assumptions(&self) -> bool {
        false
    }

    fn solve(
        &mut self,
        program: &str,
        assumptions: &[AspFunction],
        options: &SolveOptions,
    ) -> Result<RawOutcome, Error> {
        if !assumptions.is_empty() {
            return Err(Error::Internal(
                "the clingo subprocess backend cannot assume over choice atoms".to_string(),
            ));
        }

        let mut args = options.to_args();
        // Competition output: one block per improving answer.
        args.push("--outf=1".to_string());
        debug!("Running {} {}.", self.executable.display(), args.join(" "));

        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Internal(format!("cannot run clingo: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(program.as_bytes())
                .map_err(|e| Error::Internal(format!("cannot write program to clingo: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Internal(format!("clingo did not finish: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let warnings = String::from_utf8_lossy(&output.stderr).to_string();
        if stdout.trim().is_empty() {
            return Err(Error::Internal(format!(
                "clingo produced no output; stderr: {}",
                warnings.trim()
            )));
        }

        let (satisfiable, models) = parse_competition_output(&stdout)?;
        Ok(RawOutcome {
            satisfiable,
            models,
            cores: Vec::new(),
            warnings,
            raw_output: stdout,
        })
    }
}

/// Parses clingo's competition output format.
pub(crate) fn parse_competition_output(output: &str) -> Result<(bool, Vec<RawModel>), Error> {
    let mut satisfiable = None;
    let mut models = Vec::new();
    let mut model_number = 0;

    let mut lines = output.lines();
    while let Some(line) = lines.next() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("% Answer: ") {
            model_number = rest.trim().parse().unwrap_or(model_number);
        } else if line.starts_with("INCONSISTENT") {
            satisfiable = Some(false);
        } else if line.starts_with("ANSWER") {
            satisfiable = Some(true);
            let atom_line = lines
                .next()
                .ok_or_else(|| Error::Internal("truncated answer block".to_string()))?;
            let mut atoms = Vec::new();
            for token in atom_line.split_whitespace() {
                atoms.push(AspFunction::parse(token.trim_end_matches('.'))?);
            }

            let cost_line = lines
                .next()
                .ok_or_else(|| Error::Internal("missing cost line".to_string()))?;
            let cost = cost_line
                .split_whitespace()
                .skip(1)
                .map(|token| {
                    token.parse::<i64>().map_err(|_| {
                        Error::Internal(format!("malformed cost line: {cost_line}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            models.push(RawModel {
                index: model_number,
                cost,
                atoms,
            });
        }
    }

    let satisfiable = satisfiable
        .ok_or_else(|| Error::Internal("clingo reported neither an answer nor inconsistency".to_string()))?;
    Ok((satisfiable, models))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
% some preamble
% Answer: 1
ANSWER
node(\"a\"). version(\"a\",\"1.0\").
COST 3 0
% Answer: 2
ANSWER
node(\"a\"). version(\"a\",\"2.0\").
COST 1 0
OPTIMUM FOUND
";

    #[test]
    fn competition_output_parses_models_and_costs() {
        let (satisfiable, models) =
            parse_competition_output(SAMPLE).expect("sample output parses");
        assert!(satisfiable);
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].cost, vec![3, 0]);
        assert_eq!(models[1].index, 2);
        assert_eq!(models[1].cost, vec![1, 0]);
        assert_eq!(models[1].atoms.len(), 2);
        assert_eq!(models[1].atoms[0].name(), "node");
    }

    #[test]
    fn inconsistent_output_is_unsatisfiable() {
        let (satisfiable, models) =
            parse_competition_output("INCONSISTENT\n").expect("inconsistent output parses");
        assert!(!satisfiable);
        assert!(models.is_empty());
    }

    #[test]
    fn unrecognized_output_is_an_internal_error() {
        assert!(matches!(
            parse_competition_output("% chatter only\n"),
            Err(Error::Internal(_))
        ));
    }
}
