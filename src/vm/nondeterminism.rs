//! Nondeterminism operations for the VM.
//!
//! A random choice forks: one copy of the state per outcome is pushed onto the
//! pool with its log-probability added, and the current state suspends.
//! Outcomes with zero probability are not enqueued.

use std::ops::ControlFlow;
use tracing::trace;

use super::pool::VirtualMachinePool;
use super::primitive::PrimitiveError;
use super::types::{AbortKind, VmError, VmResult, VmStatus};
use super::value::Value;
use super::VirtualMachineState;

impl VirtualMachineState {
    // === Nondeterminism Operations ===

    pub(super) fn op_flip(
        &mut self,
        pool: Option<&mut VirtualMachinePool>,
    ) -> VmResult<ControlFlow<()>> {
        self.fork_bool(0.5, pool)
    }

    pub(super) fn op_flip_p(
        &mut self,
        pool: Option<&mut VirtualMachinePool>,
    ) -> VmResult<ControlFlow<()>> {
        let mut p = self.pop_float()?;
        if p.is_nan() {
            p = 0.0;
        }
        if !(0.0..=1.0).contains(&p) {
            self.abort(AbortKind::Runtime(PrimitiveError::Runtime(format!(
                "flip weight {} outside [0, 1]",
                p
            ))));
            return Ok(ControlFlow::Break(()));
        }
        self.fork_bool(p, pool)
    }

    fn fork_bool(
        &mut self,
        p: f64,
        pool: Option<&mut VirtualMachinePool>,
    ) -> VmResult<ControlFlow<()>> {
        let pool = pool.ok_or(VmError::RandomChoiceWithoutPool)?;
        trace!(target: "lotvm::vm::nondet", lp = self.lp, p, "fork");

        if p > 0.0 {
            pool.copy_increment_push(self, Value::Bool(true), p.ln());
        }
        if p < 1.0 {
            pool.copy_increment_push(self, Value::Bool(false), (1.0 - p).ln());
        }

        self.status = VmStatus::SuspendedFork;
        Ok(ControlFlow::Break(()))
    }
}
