//! Instructions for the probabilistic stack machine.
//!
//! An [`Instruction`] is either a builtin control operation implemented by the
//! machine itself or a reference to a primitive registered with the grammar.
//! Every instruction carries an integer argument, reused as a jump distance, a
//! recursion target, or a bounded index.

use std::fmt;

use super::value::ValueType;

/// Builtin operations.
///
/// Each variant documents its stack effect. `x` is the input stack used by
/// recursive calls; "skip n" removes the next `n` instructions from the program.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuiltinOp {
    // === Plumbing ===
    /// No operation
    Nop = 0x00,
    /// Push a copy of the current input (top of the input stack)
    X = 0x01,
    /// Pop the input stack (end of a recursive call)
    PopX = 0x02,
    /// Store the output on top of its stack under the pending memo key
    Mem = 0x03,

    // === Recursion (arg = loader index) ===
    /// Pop an input and call program `arg` on it
    Recurse = 0x10,
    /// As `Recurse`, memoized on (arg, input)
    MemRecurse = 0x11,
    /// As `Recurse`, but an empty input returns the output type's default
    SafeRecurse = 0x12,
    /// As `MemRecurse`, but an empty input returns the output type's default
    SafeMemRecurse = 0x13,

    // === Randomness ===
    /// Fork on a fair coin
    Flip = 0x20,
    /// Pop a float `p` and fork on a coin with bias `p` (NaN counts as 0)
    FlipP = 0x21,

    // === Control flow ===
    /// Pop a bool; on false skip `arg` (the then-branch and its jump)
    If = 0x30,
    /// Skip `arg`
    Jmp = 0x31,

    // === Booleans ===
    /// Push true
    True = 0x40,
    /// Push false
    False = 0x41,
    /// Pop a bool; on false push false and skip `arg`, else evaluate the rest
    And = 0x42,
    /// Pop a bool; on true push true and skip `arg`, else evaluate the rest
    Or = 0x43,
    /// Negate the bool on top of the stack
    Not = 0x44,

    // === Constants ===
    /// Push `arg` as an int
    Int = 0x50,
}

impl BuiltinOp {
    /// Mnemonic used in traces and program listings.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::X => "X",
            Self::PopX => "POPX",
            Self::Mem => "MEM",
            Self::Recurse => "RECURSE",
            Self::MemRecurse => "MEM_RECURSE",
            Self::SafeRecurse => "SAFE_RECURSE",
            Self::SafeMemRecurse => "SAFE_MEM_RECURSE",
            Self::Flip => "FLIP",
            Self::FlipP => "FLIPP",
            Self::If => "IF",
            Self::Jmp => "JMP",
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Int => "INT",
        }
    }

    /// Whether this builtin may fork the executing state.
    pub fn is_random(self) -> bool {
        matches!(self, Self::Flip | Self::FlipP)
    }

    pub fn is_recursive(self) -> bool {
        matches!(
            self,
            Self::Recurse | Self::MemRecurse | Self::SafeRecurse | Self::SafeMemRecurse
        )
    }

    /// Child types when used as a grammar rule producing `out`.
    ///
    /// `out` is the nonterminal the rule is registered under; `input` and
    /// `output` are the grammar's program signature. `None` means the builtin is
    /// only ever emitted by the compiler or has no valid typing for `out`.
    pub fn signature(
        self,
        out: ValueType,
        input: ValueType,
        output: ValueType,
    ) -> Option<Vec<ValueType>> {
        use ValueType::*;
        match self {
            Self::Nop | Self::PopX | Self::Mem | Self::Jmp => None,
            Self::X => (out == input).then(Vec::new),
            Self::Recurse | Self::MemRecurse | Self::SafeRecurse | Self::SafeMemRecurse => {
                (out == output).then(|| vec![input])
            }
            Self::Flip | Self::True | Self::False => (out == Bool).then(Vec::new),
            Self::FlipP => (out == Bool).then(|| vec![Float]),
            Self::If => Some(vec![Bool, out, out]),
            Self::And | Self::Or => (out == Bool).then(|| vec![Bool, Bool]),
            Self::Not => (out == Bool).then(|| vec![Bool]),
            Self::Int => (out == Int).then(Vec::new),
        }
    }
}

impl fmt::Display for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Index of a primitive in a [`PrimitiveTable`](super::primitive::PrimitiveTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimitiveId(pub u16);

/// What an instruction does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    Builtin(BuiltinOp),
    Primitive(PrimitiveId),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Builtin(b) => write!(f, "{}", b),
            Op::Primitive(PrimitiveId(id)) => write!(f, "PRIM#{}", id),
        }
    }
}

/// One instruction: an op and its integer argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instruction {
    pub op: Op,
    pub arg: i32,
}

impl Instruction {
    pub fn builtin(op: BuiltinOp, arg: i32) -> Self {
        Self { op: Op::Builtin(op), arg }
    }

    pub fn primitive(id: PrimitiveId, arg: i32) -> Self {
        Self { op: Op::Primitive(id), arg }
    }

    /// Whether this is the given builtin (ignoring the argument).
    pub fn is_builtin(&self, op: BuiltinOp) -> bool {
        self.op == Op::Builtin(op)
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Self::builtin(BuiltinOp::Nop, 0)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.op, self.arg)
    }
}

/// A compiled program, stored as a stack: the next instruction to execute is
/// the last element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<Instruction>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Instruction> {
        self.code.pop()
    }

    /// Discard the next `n` instructions; returns how many were actually removed.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.code.len());
        self.code.truncate(self.code.len() - n);
        n
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn clear(&mut self) {
        self.code.clear();
    }

    /// Instructions in execution order.
    pub fn iter_execution_order(&self) -> impl Iterator<Item = &Instruction> {
        self.code.iter().rev()
    }

    /// Instructions in storage order (last executes first).
    pub fn as_slice(&self) -> &[Instruction] {
        &self.code
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instr) in self.iter_execution_order().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", instr)?;
        }
        Ok(())
    }
}
