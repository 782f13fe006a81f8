//! Recursive calls and memoization.
//!
//! A call moves its argument onto the input stack, schedules a POPX to run after
//! the callee, and splices the callee's program on top. The memoized variants
//! also schedule a MEM that stores the callee's output under (index, input).

use std::ops::ControlFlow;
use tracing::trace;

use super::loader::ProgramLoader;
use super::opcodes::{BuiltinOp, Instruction};
use super::types::{AbortKind, VmError, VmResult};
use super::VirtualMachineState;

impl VirtualMachineState {
    // === Input Stack ===

    pub(super) fn op_x(&mut self) -> VmResult<ControlFlow<()>> {
        let x = self.peek_x()?.clone();
        self.push(x);
        Ok(ControlFlow::Continue(()))
    }

    pub(super) fn op_pop_x(&mut self) -> VmResult<ControlFlow<()>> {
        self.pop_x()?;
        Ok(ControlFlow::Continue(()))
    }

    // === Memoization ===

    /// Record the output on top of the output stack under the pending key.
    ///
    /// Exactly one key is consumed per MEM. A key that is already present keeps
    /// its first value.
    pub(super) fn op_mem(&mut self) -> VmResult<ControlFlow<()>> {
        let out = self.peek(self.output_type)?.clone();
        let key = self.memstack.pop().ok_or(VmError::MemoStackUnderflow)?;
        self.mem.entry(key).or_insert(out);
        Ok(ControlFlow::Continue(()))
    }

    pub fn memo_len(&self) -> usize {
        self.mem.len()
    }

    // === Recursion ===

    pub(super) fn op_recurse(
        &mut self,
        index: i32,
        memoized: bool,
        safe: bool,
        loader: &dyn ProgramLoader,
    ) -> VmResult<ControlFlow<()>> {
        let input_type = self.peek_x()?.value_type();
        let x = self.pop(input_type)?;

        if safe && x.is_empty() {
            self.push(self.output_type.default_value());
            return Ok(ControlFlow::Continue(()));
        }

        self.recursion_depth += 1;
        if self.recursion_depth > self.limits.max_recursion {
            self.abort(AbortKind::RecursionDepth);
            return Ok(ControlFlow::Break(()));
        }

        trace!(target: "lotvm::vm::recurse", index, depth = self.recursion_depth, memoized, "recurse");

        if memoized {
            let key = (index, x);
            if let Some(hit) = self.mem.get(&key) {
                let hit = hit.clone();
                self.push(hit);
                return Ok(ControlFlow::Continue(()));
            }
            self.push_x(key.1.clone());
            self.memstack.push(key);
            self.program.push(Instruction::builtin(BuiltinOp::Mem, 0));
        } else {
            self.push_x(x);
        }

        self.program.push(Instruction::builtin(BuiltinOp::PopX, 0));
        loader.push_program(&mut self.program, index)?;
        Ok(ControlFlow::Continue(()))
    }
}
