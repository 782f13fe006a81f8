//! Node and compiler error types.

use crate::grammar::Nonterminal;

/// Structural edit errors
#[derive(Debug, Clone, PartialEq)]
pub enum NodeError {
    /// Child index beyond the rule's arity
    ChildIndex { index: usize, arity: usize },
    /// Child's nonterminal differs from the rule's declared child type
    TypeMismatch {
        index: usize,
        expected: Nonterminal,
        got: Nonterminal,
    },
    /// Path does not address a node in this tree
    InvalidPath(Vec<usize>),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChildIndex { index, arity } => {
                write!(f, "Child index {} out of range for arity {}", index, arity)
            }
            Self::TypeMismatch {
                index,
                expected,
                got,
            } => write!(
                f,
                "Child {} has type {} but the rule expects {}",
                index, got, expected
            ),
            Self::InvalidPath(path) => write!(f, "Invalid node path: {:?}", path),
        }
    }
}

impl std::error::Error for NodeError {}

/// Compiler error types
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A gap was reached; only complete trees can be linearized
    IncompleteTree,
    /// Branch too long to encode as a skip argument
    JumpTooLarge(usize),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncompleteTree => write!(f, "Cannot linearize an incomplete tree"),
            Self::JumpTooLarge(n) => write!(f, "Jump of {} instructions is too large", n),
        }
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
