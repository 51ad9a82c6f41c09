#![doc = include_str!("../README.md")]

pub mod asp;
pub mod backend;
mod builder;
mod context;
mod driver;
mod error;
mod result;
mod setup;
mod timer;

use concrete_types::Spec;

pub use builder::SpecBuilder;
pub use context::SolveContext;
pub use driver::{Driver, DriverOptions};
pub use error::Error;
pub use result::{Answer, SolveResult};
pub use setup::SolverSetup;
pub use timer::Timer;

/// Solves for stable models of `specs` with the best available backend.
///
/// # Errors
///
/// Fails on setup errors (unknown packages, invalid variant values,
/// unavailable compilers under strict checking, malformed configuration)
/// and on backend failures. An unsatisfiable input is not an error; it is
/// reported through [`SolveResult::satisfiable`].
pub fn solve(ctx: &SolveContext, specs: &[Spec]) -> Result<SolveResult, Error> {
    let mut timer = Timer::new();
    Driver::with_default_backend()?.solve(ctx, specs, &mut timer)
}
