//! Implementations of the CLI subcommands.

use std::{io::Write, str::FromStr};

use concrete_cli::{
    Error,
    cli::{ShowOption, SolveArgs, parse_show},
    load,
    render::{self, RenderOptions},
};
use concrete_repo::TestPolicy;
use concrete_solve::{Driver, SolveContext, Timer, backend::SolveOptions};
use concrete_types::{Spec, SpecRecord};
use log::info;

/// Runs the solve subcommand.
pub fn solve(args: SolveArgs, out: &mut dyn Write) -> Result<(), Error> {
    let show = parse_show(&args.show)?;

    let repo = load::load_repo(&args.repo)?;
    let platform = load::load_platform(args.platform.as_ref())?;
    let compilers = load::load_compilers(args.compilers.as_ref(), &platform)?;
    let packages = load::load_packages(args.packages.as_ref())?;
    let targets = load::load_targets(args.targets.as_ref())?;

    let mut ctx = SolveContext::new(&repo, &packages, &compilers, &platform, &targets)?;
    let test_packages = load::test_packages(&args.with_tests);
    if !test_packages.is_empty() {
        ctx = ctx.with_tests(TestPolicy::Packages(test_packages));
    }

    let specs: Vec<Spec> = args
        .specs
        .iter()
        .map(|literal| Spec::from_str(literal))
        .collect::<Result<_, _>>()?;

    if show.contains(&ShowOption::Asp) {
        Driver::text_only().dump(&ctx, &specs, out)?;
        if show.len() == 1 {
            return Ok(());
        }
    }

    let mut timer = Timer::new();
    let driver = Driver::with_solve_options(SolveOptions {
        models: args.models,
        ..SolveOptions::default()
    })?;
    let result = driver.solve(&ctx, &specs, &mut timer)?;

    if show.contains(&ShowOption::Output) {
        match &result.raw_output {
            Some(raw) => writeln!(out, "{raw}")?,
            None => info!("The backend produced no raw output."),
        }
    }

    if !show.contains(&ShowOption::Solutions) {
        return Ok(());
    }

    if !result.satisfiable {
        writeln!(out, "The following constraints are unsatisfiable:")?;
        for line in result.core_lines() {
            writeln!(out, "    {line}")?;
        }
        return Err(Error::Unsatisfiable);
    }

    let best = result
        .best()
        .ok_or_else(|| Error::Serialize("a satisfiable solve must have an answer".to_string()))?;

    if !args.yaml && !args.json {
        writeln!(out, "Best of {} considered answers.", result.answers.len())?;
        writeln!(out, "Optimization: {:?}", best.cost)?;
    }

    let options = RenderOptions {
        cover: args.cover,
        namespaces: args.namespaces,
        types: args.types,
    };

    for input in &specs {
        let Some(key) = render::answer_key(&repo, best, input.root_name()) else {
            continue;
        };
        let Some(spec) = best.spec(&key) else {
            continue;
        };

        if args.yaml {
            let record = SpecRecord::new(spec.clone());
            let rendered = serde_norway::to_string(&record)
                .map_err(|e| Error::Serialize(e.to_string()))?;
            write!(out, "{rendered}")?;
        } else if args.json {
            let record = SpecRecord::new(spec.clone());
            let rendered = serde_json::to_string_pretty(&record)
                .map_err(|e| Error::Serialize(e.to_string()))?;
            writeln!(out, "{rendered}")?;
        } else {
            write!(out, "{}", render::tree(spec, &options))?;
        }
    }

    if args.timers {
        timer.write(out)?;
    }
    if args.stats {
        writeln!(out, "Statistics:")?;
        writeln!(out, "    models: {}", result.answers.len())?;
        writeln!(out, "    cost:   {:?}", best.cost)?;
    }
    Ok(())
}
