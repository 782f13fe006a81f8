//! Probabilistic Virtual Machine
//!
//! A [`VirtualMachineState`] interprets a compiled [`Program`] with one value stack
//! per [`ValueType`]. Random choices do not draw random numbers: the state clones
//! itself once per outcome into a [`VirtualMachinePool`], each clone carrying the
//! outcome's log-probability, and suspends. Draining the pool best-first yields an
//! exact output distribution, up to the configured budgets.
//!
//! This module is organized into submodules by functionality:
//! - `types`: Core type definitions (VmError, VmStatus, AbortKind, ExecLimits)
//! - `value`: Runtime values and value types
//! - `opcodes`: Builtin ops, instructions, and programs
//! - `primitive`: User primitive table
//! - `stack`: Typed stack operations
//! - `control_flow`: Branches, booleans, and constants
//! - `recursion`: Input stack, recursion, and memoization
//! - `nondeterminism`: Forking on random choices
//! - `loader`: Sources of programs for recursive calls
//! - `pool`: Best-first scheduler over execution states

use std::collections::HashMap;
use std::ops::ControlFlow;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::config::VmConfig;

// === Submodules ===

mod control_flow;
mod loader;
mod nondeterminism;
mod opcodes;
mod pool;
mod primitive;
mod recursion;
mod stack;
mod types;
mod value;


// === Re-exports ===

pub use loader::ProgramLoader;
pub use opcodes::{BuiltinOp, Instruction, Op, PrimitiveId, Program};
pub use pool::VirtualMachinePool;
pub use primitive::{
    ArgTypes, InPlaceFn, Primitive, PrimitiveError, PrimitiveFn, PrimitiveResult, PrimitiveTable,
    PureFn,
};
pub use types::{AbortKind, ExecLimits, VmError, VmResult, VmStatus};
pub use value::{Value, ValueType};

/// Memo key: (loader index, input).
pub type MemoKey = (i32, Value);

/// What a running state needs from its surroundings.
#[derive(Clone, Copy)]
pub struct ExecContext<'a> {
    /// Primitive implementations referenced by the program
    pub primitives: &'a PrimitiveTable,
    /// Source of programs for recursive calls
    pub loader: &'a dyn ProgramLoader,
}

impl<'a> ExecContext<'a> {
    pub fn new(primitives: &'a PrimitiveTable, loader: &'a dyn ProgramLoader) -> Self {
        Self { primitives, loader }
    }
}

/// One execution context.
#[derive(Debug, Clone)]
pub struct VirtualMachineState {
    /// Remaining instructions; the next to run is on top
    program: Program,
    /// One stack per value type
    stacks: [Vec<Value>; ValueType::COUNT],
    /// Inputs of the enclosing recursive calls
    xstack: Vec<Value>,
    /// Memo keys awaiting their MEM instruction
    memstack: Vec<MemoKey>,
    /// Memoized outputs of recursive calls
    mem: HashMap<MemoKey, Value>,
    /// Log-probability of the path taken so far
    pub lp: f64,
    /// Recursive calls made along this path
    recursion_depth: usize,
    /// Instructions executed along this path
    instructions_run: usize,
    status: VmStatus,
    output_type: ValueType,
    output: Option<Value>,
    limits: ExecLimits,
}

impl VirtualMachineState {
    /// Create a state that will compute `output_type` from `input`.
    ///
    /// The program is empty; load one with [`VirtualMachineState::load`].
    pub fn new(input: Value, output_type: ValueType, limits: ExecLimits) -> Self {
        Self {
            program: Program::new(),
            stacks: Default::default(),
            xstack: vec![input],
            memstack: Vec::new(),
            mem: HashMap::new(),
            lp: 0.0,
            recursion_depth: 0,
            instructions_run: 0,
            status: VmStatus::Running,
            output_type,
            output: None,
            limits,
        }
    }

    /// Create a state with budgets taken from `config`.
    pub fn with_config(input: Value, output_type: ValueType, config: &VmConfig) -> Self {
        Self::new(input, output_type, ExecLimits::from(config))
    }

    /// Push the loader's program `index` onto this state's program.
    pub fn load(&mut self, loader: &dyn ProgramLoader, index: i32) -> VmResult<()> {
        loader.push_program(&mut self.program, index)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    pub fn status(&self) -> &VmStatus {
        &self.status
    }

    pub fn output_type(&self) -> ValueType {
        self.output_type
    }

    /// Output of a completed state.
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<Value> {
        self.output.take()
    }

    pub fn recursion_depth(&self) -> usize {
        self.recursion_depth
    }

    pub fn instructions_run(&self) -> usize {
        self.instructions_run
    }

    pub fn increment_lp(&mut self, delta: f64) {
        self.lp += delta;
    }

    /// Abandon this path. It will contribute no mass.
    pub(crate) fn abort(&mut self, kind: AbortKind) {
        debug!(target: "lotvm::vm", kind = %kind, lp = self.lp, "path aborted");
        self.status = VmStatus::Aborted(kind);
    }

    // === Execution ===

    /// Run until the state completes, aborts, or forks.
    ///
    /// Random choices need a pool to fork into; without one they are an error.
    /// Path-level failures are reported through the returned status, while
    /// `Err` is reserved for contract violations.
    pub fn run(
        &mut self,
        ctx: &ExecContext<'_>,
        mut pool: Option<&mut VirtualMachinePool>,
    ) -> VmResult<VmStatus> {
        while self.status.is_running() {
            match self.step(ctx, pool.as_deref_mut())? {
                ControlFlow::Continue(()) => continue,
                ControlFlow::Break(()) => break,
            }
        }
        Ok(self.status.clone())
    }

    /// Execute a single instruction
    pub fn step(
        &mut self,
        ctx: &ExecContext<'_>,
        pool: Option<&mut VirtualMachinePool>,
    ) -> VmResult<ControlFlow<()>> {
        let Some(instr) = self.program.pop() else {
            return self.finish();
        };

        self.instructions_run += 1;
        if self.instructions_run > self.limits.max_run_program {
            self.abort(AbortKind::InstructionLimit);
            return Ok(ControlFlow::Break(()));
        }

        trace!(target: "lotvm::vm::step", instr = %instr, lp = self.lp, remaining = self.program.len());

        match instr.op {
            Op::Primitive(id) => self.op_primitive(id, ctx.primitives),
            Op::Builtin(op) => match op {
                BuiltinOp::Nop => Ok(ControlFlow::Continue(())),

                // Input stack, recursion, memoization
                BuiltinOp::X => self.op_x(),
                BuiltinOp::PopX => self.op_pop_x(),
                BuiltinOp::Mem => self.op_mem(),
                BuiltinOp::Recurse => self.op_recurse(instr.arg, false, false, ctx.loader),
                BuiltinOp::SafeRecurse => self.op_recurse(instr.arg, false, true, ctx.loader),
                BuiltinOp::MemRecurse => self.op_recurse(instr.arg, true, false, ctx.loader),
                BuiltinOp::SafeMemRecurse => self.op_recurse(instr.arg, true, true, ctx.loader),

                // Random choices
                BuiltinOp::Flip => self.op_flip(pool),
                BuiltinOp::FlipP => self.op_flip_p(pool),

                // Control flow and constants
                BuiltinOp::If => self.op_if(instr.arg),
                BuiltinOp::Jmp => self.op_jmp(instr.arg),
                BuiltinOp::True => self.op_const(Value::Bool(true)),
                BuiltinOp::False => self.op_const(Value::Bool(false)),
                BuiltinOp::And => self.op_and(instr.arg),
                BuiltinOp::Or => self.op_or(instr.arg),
                BuiltinOp::Not => self.op_not(),
                BuiltinOp::Int => self.op_const(Value::Int(i64::from(instr.arg))),
            },
        }
    }

    /// Program exhausted: the output is the top of the output stack.
    fn finish(&mut self) -> VmResult<ControlFlow<()>> {
        let out = self.pop(self.output_type)?;
        trace!(target: "lotvm::vm", output = %out, lp = self.lp, "complete");
        self.output = Some(out);
        self.status = VmStatus::Complete;
        Ok(ControlFlow::Break(()))
    }

    // === Primitive Dispatch ===

    fn op_primitive(
        &mut self,
        id: PrimitiveId,
        primitives: &PrimitiveTable,
    ) -> VmResult<ControlFlow<()>> {
        let prim = primitives.get(id).ok_or(VmError::UnknownPrimitive(id.0))?;

        // Arguments are popped rightmost first; an in-place primitive leaves its
        // first argument on the stack.
        let first = if prim.is_in_place() { 1 } else { 0 };
        let mut args: SmallVec<[Value; 4]> = SmallVec::with_capacity(prim.arity());
        for &t in prim.args[first..].iter().rev() {
            args.push(self.pop(t)?);
        }
        args.reverse();

        let result = match &prim.func {
            PrimitiveFn::Pure(f) => f(&args).map(Some),
            PrimitiveFn::InPlace(f) => {
                let target = self.peek_mut(prim.output)?;
                f(target, &args).map(|()| None)
            }
        };

        match result {
            Ok(Some(value)) => {
                if value.value_type() != prim.output {
                    return Err(VmError::TypeError {
                        expected: prim.output,
                        got: value.value_type(),
                    });
                }
                self.push(value);
            }
            Ok(None) => {
                let got = self.peek(prim.output)?.value_type();
                if got != prim.output {
                    return Err(VmError::TypeError {
                        expected: prim.output,
                        got,
                    });
                }
            }
            Err(e) => {
                self.abort(AbortKind::Runtime(e));
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}
