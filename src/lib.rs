//! lotvm - Language-of-Thought Virtual Machine
//!
//! This library provides typed, weighted grammars over program trees and an
//! exact probabilistic stack machine that evaluates those trees.
//!
//! # Architecture
//!
//! 1. **Grammars** (`grammar` module)
//!    - One nonterminal per value type, each with weighted rules
//!    - Sampling, generation with bounded retries, prior log-probability
//!    - Enumeration of trees by natural numbers (`integerized_stack`)
//!    - Neighbors and completion of partial trees for search
//!
//! 2. **Program trees** (`node` module)
//!    - Rule applications with gaps, addressed by child-index paths
//!    - Linearization into a stack-ordered `Program`
//!
//! 3. **Evaluation** (`vm` and `eval` modules)
//!    - One value stack per type; user primitives dispatched by id
//!    - Random choices fork the state into a best-first pool instead of
//!      sampling, so a run yields the exact output distribution up to budgets
//!
//! # Example
//!
//! ```ignore
//! use lotvm::prelude::*;
//!
//! let mut g = Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str, ValueType::Bool])?;
//! g.add_builtin(BuiltinOp::X, ValueType::Str, "x", 1.0, 0)?;
//! g.add_terminal("'a'", "a", 1.0)?;
//! g.add_builtin(BuiltinOp::If, ValueType::Str, "if(%s,%s,%s)", 1.0, 0)?;
//! g.add_builtin(BuiltinOp::Flip, ValueType::Bool, "flip()", 1.0, 0)?;
//!
//! let program = g.simple_parse("if(flip(),x,'a')")?;
//! let dist = call(&g, &program, Value::from("b"), &VmConfig::default())?;
//! // {'b':-0.693147, 'a':-0.693147} [Z=0, N=2]
//! println!("{}", dist);
//! ```
//!
//! # Errors
//!
//! Construction errors (`GrammarError`) surface at setup. Path-level failures
//! during evaluation (recursion depth, instruction budget, primitive errors)
//! abandon only the offending path. `VmError` is reserved for ill-formed
//! programs and misuse.

pub mod config;
pub mod distribution;
pub mod eval;
pub mod grammar;
pub mod integerized_stack;
pub mod node;
pub mod numerics;
pub mod vm;

pub use config::{ConfigError, EngineConfig, GrammarConfig, VmConfig};
pub use distribution::DiscreteDistribution;
pub use eval::{call, call_many, call_one};
pub use grammar::{Grammar, GrammarError, GrammarResult, Nonterminal, Rule};
pub use integerized_stack::{EnumerationCode, IntegerizedStack, StackError};
pub use node::{CompileError, Node, NodeError};
pub use vm::{
    AbortKind, BuiltinOp, ExecContext, Instruction, PrimitiveError, PrimitiveResult, Program,
    ProgramLoader, Value, ValueType, VirtualMachinePool, VirtualMachineState, VmError, VmResult,
    VmStatus,
};

/// Everything needed to build a grammar and evaluate its programs.
pub mod prelude {
    pub use crate::config::{GrammarConfig, VmConfig};
    pub use crate::distribution::DiscreteDistribution;
    pub use crate::eval::{call, call_many, call_one};
    pub use crate::grammar::{Grammar, GrammarError, Nonterminal};
    pub use crate::node::Node;
    pub use crate::vm::{BuiltinOp, PrimitiveError, Value, ValueType, VmError};
}
