//! Compilation of program trees.
//!
//! A node emits its own instruction first and then its children from last to
//! first. Since the program is executed from the top, child 0 runs first and the
//! last child's value ends up on top of its stack, so a primitive popping its
//! arguments rightmost-first receives them in declared order.
//!
//! Short-circuit forms are laid out so that skipped branches never run. In
//! execution order:
//!
//! ```text
//! if(c, x, y):   [c] IF(|x|+1) [x] JMP(|y|) [y]
//! and(a, b):     [a] AND(|b|) [b]
//! or(a, b):      [a] OR(|b|) [b]
//! ```

use super::error::{CompileError, CompileResult};
use super::Node;
use crate::vm::{BuiltinOp, Instruction, Program};

fn jump_arg(n: usize) -> CompileResult<i32> {
    i32::try_from(n).map_err(|_| CompileError::JumpTooLarge(n))
}

impl Node {
    /// Number of instructions `linearize` will emit.
    pub fn program_size(&self) -> usize {
        let own = if self.rule().is_builtin(BuiltinOp::If) { 2 } else { 1 };
        own + self.children().iter().map(Node::program_size).sum::<usize>()
    }

    /// Push this tree's instructions onto `program`, returning how many were
    /// pushed. The tree must be complete.
    pub fn linearize(&self, program: &mut Program) -> CompileResult<usize> {
        if self.is_null() {
            return Err(CompileError::IncompleteTree);
        }

        let rule = self.rule();
        let children = self.children();

        if rule.is_builtin(BuiltinOp::If) && children.len() == 3 {
            let ysize = children[2].linearize(program)?;
            program.push(Instruction::builtin(BuiltinOp::Jmp, jump_arg(ysize)?));
            // +1 to skip the JMP as well
            let xsize = children[1].linearize(program)? + 1;
            program.push(Instruction::builtin(BuiltinOp::If, jump_arg(xsize)?));
            let bsize = children[0].linearize(program)?;
            return Ok(ysize + xsize + bsize + 1);
        }

        if (rule.is_builtin(BuiltinOp::And) || rule.is_builtin(BuiltinOp::Or))
            && children.len() == 2
        {
            let ysize = children[1].linearize(program)?;
            let op = if rule.is_builtin(BuiltinOp::And) {
                BuiltinOp::And
            } else {
                BuiltinOp::Or
            };
            program.push(Instruction::builtin(op, jump_arg(ysize)?));
            return Ok(children[0].linearize(program)? + ysize + 1);
        }

        program.push(rule.instruction());
        let mut size = 1;
        for c in children.iter().rev() {
            size += c.linearize(program)?;
        }
        Ok(size)
    }

    /// Compile into a fresh program.
    pub fn compile(&self) -> CompileResult<Program> {
        let mut program = Program::with_capacity(self.program_size());
        self.linearize(&mut program)?;
        Ok(program)
    }
}
