//! Program loaders.
//!
//! Recursive instructions name their callee by an integer argument; a loader
//! turns that index into instructions. A single tree answers only to index 0,
//! a lexicon (a vector of trees) to the index of each word.

use super::opcodes::Program;
use super::types::{VmError, VmResult};
use crate::node::Node;

/// Source of programs for recursive calls.
pub trait ProgramLoader {
    /// Push program `index` onto `program`.
    fn push_program(&self, program: &mut Program, index: i32) -> VmResult<()>;
}

impl ProgramLoader for Node {
    fn push_program(&self, program: &mut Program, index: i32) -> VmResult<()> {
        if index != 0 {
            return Err(VmError::InvalidLoaderIndex { index, len: 1 });
        }
        self.linearize(program)?;
        Ok(())
    }
}

impl ProgramLoader for Vec<Node> {
    fn push_program(&self, program: &mut Program, index: i32) -> VmResult<()> {
        let node = usize::try_from(index)
            .ok()
            .and_then(|i| self.get(i))
            .ok_or(VmError::InvalidLoaderIndex {
                index,
                len: self.len(),
            })?;
        node.linearize(program)?;
        Ok(())
    }
}
