//! Type definitions for the probabilistic VM.
//!
//! This module contains the core types used throughout the VM:
//! - VmError: contract violations that end an evaluation
//! - VmStatus: lifecycle of one execution state
//! - AbortKind: why a single path was abandoned
//! - ExecLimits: per-path budgets

use std::fmt;

use super::primitive::PrimitiveError;
use super::value::ValueType;
use crate::config::VmConfig;
use crate::node::CompileError;

/// Result of VM execution
pub type VmResult<T> = Result<T, VmError>;

/// Errors that end an evaluation.
///
/// These indicate a model-definition bug (ill-typed program, bad loader index)
/// rather than a data condition; data conditions abort only their path.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// Pop from an empty typed stack
    StackUnderflow(ValueType),
    /// Value of the wrong type on a typed stack
    TypeError { expected: ValueType, got: ValueType },
    /// Instruction references a primitive the table does not contain
    UnknownPrimitive(u16),
    /// POPX with an empty input stack
    InputStackUnderflow,
    /// MEM with no pending memo key
    MemoStackUnderflow,
    /// Loader has no program at this index
    InvalidLoaderIndex { index: i32, len: usize },
    /// Negative or oversized instruction argument
    InvalidArgument { op: &'static str, arg: i32 },
    /// A random choice was reached without a pool to fork into
    RandomChoiceWithoutPool,
    /// Program could not be compiled
    Compile(CompileError),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow(t) => write!(f, "Stack underflow on {} stack", t),
            Self::TypeError { expected, got } => {
                write!(f, "Type error: expected {}, got {}", expected, got)
            }
            Self::UnknownPrimitive(id) => write!(f, "Unknown primitive: {}", id),
            Self::InputStackUnderflow => write!(f, "Input stack underflow"),
            Self::MemoStackUnderflow => write!(f, "Memo stack underflow"),
            Self::InvalidLoaderIndex { index, len } => {
                write!(f, "Invalid loader index: {} (loader holds {})", index, len)
            }
            Self::InvalidArgument { op, arg } => {
                write!(f, "Invalid argument {} for {}", arg, op)
            }
            Self::RandomChoiceWithoutPool => {
                write!(f, "Random choice requires a VirtualMachinePool")
            }
            Self::Compile(e) => write!(f, "Compile error: {}", e),
        }
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Compile(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CompileError> for VmError {
    fn from(e: CompileError) -> Self {
        Self::Compile(e)
    }
}

/// Why a path was abandoned. An aborted path contributes no mass.
#[derive(Debug, Clone, PartialEq)]
pub enum AbortKind {
    /// Too many recursive calls along this path
    RecursionDepth,
    /// Instruction budget for this path exhausted
    InstructionLimit,
    /// A primitive failed
    Runtime(PrimitiveError),
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecursionDepth => write!(f, "recursion depth exceeded"),
            Self::InstructionLimit => write!(f, "instruction limit exceeded"),
            Self::Runtime(e) => write!(f, "{}", e),
        }
    }
}

/// Lifecycle of one execution state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum VmStatus {
    #[default]
    Running,
    Complete,
    Aborted(AbortKind),
    /// The state forked into the pool and must not be resumed
    SuspendedFork,
}

impl VmStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// Budgets carried by every execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    pub max_recursion: usize,
    pub max_run_program: usize,
}

impl From<&VmConfig> for ExecLimits {
    fn from(config: &VmConfig) -> Self {
        Self {
            max_recursion: config.max_recursion,
            max_run_program: config.max_run_program,
        }
    }
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self::from(&VmConfig::default())
    }
}
