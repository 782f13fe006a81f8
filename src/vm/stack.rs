//! Typed stack operations for the VM.
//!
//! Each value type has its own stack; popping a type from its stack never sees a
//! value of another type unless a primitive pushed the wrong result, which is
//! reported as a [`VmError::TypeError`].

use super::types::{VmError, VmResult};
use super::value::{Value, ValueType};
use super::VirtualMachineState;

impl VirtualMachineState {
    // === Stack Operations ===

    /// Push a value onto the stack of its own type.
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.stacks[value.value_type().index()].push(value);
    }

    /// Pop the top value of type `t`.
    #[inline]
    pub fn pop(&mut self, t: ValueType) -> VmResult<Value> {
        self.stacks[t.index()]
            .pop()
            .ok_or(VmError::StackUnderflow(t))
    }

    /// Peek at the top value of type `t`.
    #[inline]
    pub fn peek(&self, t: ValueType) -> VmResult<&Value> {
        self.stacks[t.index()]
            .last()
            .ok_or(VmError::StackUnderflow(t))
    }

    #[inline]
    pub(super) fn peek_mut(&mut self, t: ValueType) -> VmResult<&mut Value> {
        self.stacks[t.index()]
            .last_mut()
            .ok_or(VmError::StackUnderflow(t))
    }

    pub(super) fn pop_bool(&mut self) -> VmResult<bool> {
        let v = self.pop(ValueType::Bool)?;
        v.as_bool().ok_or(VmError::TypeError {
            expected: ValueType::Bool,
            got: v.value_type(),
        })
    }

    pub(super) fn pop_float(&mut self) -> VmResult<f64> {
        let v = self.pop(ValueType::Float)?;
        v.as_float().ok_or(VmError::TypeError {
            expected: ValueType::Float,
            got: v.value_type(),
        })
    }

    /// Number of values on the stack for type `t`.
    pub fn stack_len(&self, t: ValueType) -> usize {
        self.stacks[t.index()].len()
    }

    /// Whether every typed stack is empty.
    pub fn stacks_empty(&self) -> bool {
        self.stacks.iter().all(Vec::is_empty)
    }

    // === Input Stack ===

    pub(super) fn push_x(&mut self, x: Value) {
        self.xstack.push(x);
    }

    pub(super) fn pop_x(&mut self) -> VmResult<Value> {
        self.xstack.pop().ok_or(VmError::InputStackUnderflow)
    }

    pub(super) fn peek_x(&self) -> VmResult<&Value> {
        self.xstack.last().ok_or(VmError::InputStackUnderflow)
    }
}
