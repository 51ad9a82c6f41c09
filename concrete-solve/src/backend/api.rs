//! A backend using the in-process clingo bindings.

use std::collections::HashMap;

use clingo::{ClingoError, Part, ShowType, SolveMode, Symbol, SymbolType};
use log::debug;

use crate::{
    Error,
    asp::{AspFunction, AspValue},
    backend::{AspBackend, RawModel, RawOutcome, SolveOptions},
};

/// A backend using the clingo library bindings in process.
///
/// Unlike the subprocess backend this one can assume over choice atoms,
/// which makes unsatisfiable cores available for error reporting.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClingoApiBackend;

impl ClingoApiBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

fn internal(error: ClingoError) -> Error {
    Error::Internal(error.to_string())
}

fn to_symbol(fun: &AspFunction) -> Result<Symbol, Error> {
    let args = fun
        .args()
        .iter()
        .map(value_to_symbol)
        .collect::<Result<Vec<_>, _>>()?;
    Symbol::create_function(fun.name(), &args, true).map_err(internal)
}

fn value_to_symbol(value: &AspValue) -> Result<Symbol, Error> {
    match value {
        AspValue::Str(s) => Symbol::create_string(s).map_err(internal),
        AspValue::Int(i) => Ok(Symbol::create_number(*i as i32)),
        AspValue::Bool(b) => Symbol::create_string(&b.to_string()).map_err(internal),
        AspValue::Fun(f) => to_symbol(f),
    }
}

fn from_symbol(symbol: &Symbol) -> Result<AspFunction, Error> {
    match symbol.symbol_type().map_err(internal)? {
        SymbolType::Function => {
            let args = symbol
                .arguments()
                .map_err(internal)?
                .iter()
                .map(symbol_to_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AspFunction::new(symbol.name().map_err(internal)?, args))
        }
        _ => Err(Error::Internal(format!(
            "expected a function symbol, got {symbol}"
        ))),
    }
}

fn symbol_to_value(symbol: &Symbol) -> Result<AspValue, Error> {
    Ok(match symbol.symbol_type().map_err(internal)? {
        SymbolType::Number => AspValue::Int(i64::from(symbol.number().map_err(internal)?)),
        SymbolType::String => AspValue::Str(symbol.string().map_err(internal)?.to_string()),
        SymbolType::Function => {
            let args = symbol.arguments().map_err(internal)?;
            if args.is_empty() {
                // Stringify arity-zero constants, mirroring how model
                // atoms read back from text.
                AspValue::Str(symbol.name().map_err(internal)?.to_string())
            } else {
                AspValue::Fun(from_symbol(symbol)?)
            }
        }
        _ => AspValue::Str(symbol.to_string()),
    })
}

impl AspBackend for ClingoApiBackend {
    fn name(&self) -> &'static str {
        "clingo-api"
    }

    fn supports_assumptions(&self) -> bool {
        true
    }

    fn solve(
        &mut self,
        program: &str,
        assumptions: &[AspFunction],
        options: &SolveOptions,
    ) -> Result<RawOutcome, Error> {
        let mut ctl = clingo::control(options.to_args()).map_err(internal)?;
        ctl.add("base", &[], program).map_err(internal)?;
        let part = Part::new("base", vec![]).map_err(internal)?;
        ctl.ground(&[part]).map_err(internal)?;
        debug!("Grounded the program with {} assumptions.", assumptions.len());

        // Resolve assumption atoms to solver literals.
        let mut literals = Vec::new();
        let mut literal_atoms = HashMap::new();
        {
            let wanted = assumptions
                .iter()
                .map(|fun| Ok((to_symbol(fun)?, fun.clone())))
                .collect::<Result<HashMap<Symbol, AspFunction>, Error>>()?;
            let symbolic_atoms = ctl.symbolic_atoms().map_err(internal)?;
            for atom in symbolic_atoms.iter().map_err(internal)? {
                let symbol = atom.symbol().map_err(internal)?;
                if let Some(fun) = wanted.get(&symbol) {
                    let literal = atom.literal().map_err(internal)?;
                    literal_atoms.insert(literal.get_integer(), fun.clone());
                    literals.push(literal);
                }
            }
        }

        let mut handle = ctl
            .solve(SolveMode::YIELD, &literals)
            .map_err(internal)?;

        let mut models = Vec::new();
        loop {
            handle.resume().map_err(internal)?;
            let Some(model) = handle.model().map_err(internal)? else {
                break;
            };
            let index = model.number().map_err(internal)? as usize;
            let cost = model.cost().map_err(internal)?;
            let atoms = model
                .symbols(ShowType::SHOWN)
                .map_err(internal)?
                .iter()
                .map(from_symbol)
                .collect::<Result<Vec<_>, _>>()?;
            models.push(RawModel { index, cost, atoms });
        }

        let satisfiable = !models.is_empty();
        let mut cores = Vec::new();
        if !satisfiable {
            let core = handle.core().map_err(internal)?;
            let core_atoms: Vec<AspFunction> = core
                .iter()
                .filter_map(|literal| literal_atoms.get(&literal.get_integer().abs()).cloned())
                .collect();
            if !core_atoms.is_empty() {
                cores.push(core_atoms);
            }
        }
        handle.close().map_err(internal)?;

        Ok(RawOutcome {
            satisfiable,
            models,
            cores,
            warnings: String::new(),
            raw_output: String::new(),
        })
    }
}
