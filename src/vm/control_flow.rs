//! Control flow operations for the VM.
//!
//! Branches are laid out by the compiler so that skipping means discarding the
//! next `arg` instructions from the program stack. An `if` is
//! `[cond] IF(n) [then] JMP(m) [else]` in execution order.

use std::ops::ControlFlow;
use tracing::trace;

use super::types::{VmError, VmResult};
use super::value::Value;
use super::VirtualMachineState;

impl VirtualMachineState {
    // === Skips ===

    fn skip(&mut self, op: &'static str, arg: i32) -> VmResult<()> {
        let n = usize::try_from(arg).map_err(|_| VmError::InvalidArgument { op, arg })?;
        if self.program.skip(n) != n {
            return Err(VmError::InvalidArgument { op, arg });
        }
        Ok(())
    }

    pub(super) fn op_jmp(&mut self, arg: i32) -> VmResult<ControlFlow<()>> {
        self.skip("JMP", arg)?;
        Ok(ControlFlow::Continue(()))
    }

    pub(super) fn op_if(&mut self, arg: i32) -> VmResult<ControlFlow<()>> {
        let cond = self.pop_bool()?;
        trace!(target: "lotvm::vm::control", cond, skip = arg, "if");
        if !cond {
            self.skip("IF", arg)?;
        }
        Ok(ControlFlow::Continue(()))
    }

    // === Boolean Operations ===

    /// Short-circuit and: the left operand has been evaluated, the right has not.
    pub(super) fn op_and(&mut self, arg: i32) -> VmResult<ControlFlow<()>> {
        if !self.pop_bool()? {
            self.push(Value::Bool(false));
            self.skip("AND", arg)?;
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Short-circuit or: the left operand has been evaluated, the right has not.
    pub(super) fn op_or(&mut self, arg: i32) -> VmResult<ControlFlow<()>> {
        if self.pop_bool()? {
            self.push(Value::Bool(true));
            self.skip("OR", arg)?;
        }
        Ok(ControlFlow::Continue(()))
    }

    pub(super) fn op_not(&mut self) -> VmResult<ControlFlow<()>> {
        let b = self.pop_bool()?;
        self.push(Value::Bool(!b));
        Ok(ControlFlow::Continue(()))
    }

    // === Constants ===

    pub(super) fn op_const(&mut self, value: Value) -> VmResult<ControlFlow<()>> {
        self.push(value);
        Ok(ControlFlow::Continue(()))
    }
}
