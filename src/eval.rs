//! Evaluation of programs on inputs.
//!
//! [`call`] runs a program to an exact output distribution through a fresh
//! [`VirtualMachinePool`]. [`call_one`] runs it as a single deterministic path.
//! [`call_many`] fans [`call`] out over a batch of inputs with rayon, sharing the
//! grammar and loader between workers.

use rayon::prelude::*;
use tracing::debug;

use crate::config::VmConfig;
use crate::distribution::DiscreteDistribution;
use crate::grammar::Grammar;
use crate::vm::{
    ExecContext, ProgramLoader, Value, VirtualMachinePool, VirtualMachineState, VmResult, VmStatus,
};

/// Output distribution of loader program 0 on `input`.
///
/// Paths that abort contribute no mass, so the distribution may sum to less
/// than one. Budgets come from `config`.
pub fn call(
    grammar: &Grammar,
    loader: &dyn ProgramLoader,
    input: Value,
    config: &VmConfig,
) -> VmResult<DiscreteDistribution<Value>> {
    let mut state = VirtualMachineState::with_config(input, grammar.output_type(), config);
    state.load(loader, 0)?;

    let mut pool = VirtualMachinePool::new(config);
    pool.push(state);

    let ctx = ExecContext::new(grammar.primitives(), loader);
    pool.run(&ctx)
}

/// Output of loader program 0 on `input`, run without a pool.
///
/// Returns `Ok(None)` if the path aborted. A random choice is an error.
pub fn call_one(
    grammar: &Grammar,
    loader: &dyn ProgramLoader,
    input: Value,
    config: &VmConfig,
) -> VmResult<Option<Value>> {
    let mut state = VirtualMachineState::with_config(input, grammar.output_type(), config);
    state.load(loader, 0)?;

    let ctx = ExecContext::new(grammar.primitives(), loader);
    match state.run(&ctx, None)? {
        VmStatus::Complete => Ok(state.take_output()),
        status => {
            debug!(target: "lotvm::vm", ?status, "call_one produced no output");
            Ok(None)
        }
    }
}

/// [`call`] on each input in parallel. Results are in input order; the first
/// contract violation is returned.
pub fn call_many(
    grammar: &Grammar,
    loader: &(dyn ProgramLoader + Sync),
    inputs: &[Value],
    config: &VmConfig,
) -> VmResult<Vec<DiscreteDistribution<Value>>> {
    inputs
        .par_iter()
        .map(|x| call(grammar, loader, x.clone(), config))
        .collect()
}
