//! Grammar error types.

use super::rule::Nonterminal;
use crate::integerized_stack::StackError;
use crate::node::NodeError;
use crate::vm::{BuiltinOp, ValueType};

/// Grammar error types
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarError {
    /// Format placeholder count differs from the declared arity
    FormatArity {
        format: String,
        placeholders: usize,
        arity: usize,
    },
    /// Rule weight is not positive and finite
    InvalidWeight { format: String, p: f64 },
    /// Value type is not one of the grammar's nonterminals
    UnknownType(ValueType),
    /// Nonterminal index out of range
    UnknownNonterminal(Nonterminal),
    /// A value type was listed twice
    DuplicateType(ValueType),
    /// A rule with this format is already registered for the nonterminal
    DuplicateRule { nt: Nonterminal, format: String },
    /// Builtin cannot be used as a rule producing this type
    InvalidBuiltin { op: BuiltinOp, out: ValueType },
    /// In-place primitive whose first argument type differs from its result type
    InPlaceSignature { format: String },
    /// Too many primitives for the instruction encoding
    TooManyPrimitives,
    /// Nonterminal has no rules to sample
    NoRules(Nonterminal),
    /// No rule matches a lookup
    RuleNotFound {
        nt: Option<Nonterminal>,
        name: String,
    },
    /// More than one rule matches a lookup
    AmbiguousRule {
        nt: Option<Nonterminal>,
        name: String,
        matches: Vec<String>,
    },
    /// Rule index out of range for a nonterminal
    RuleIndexOutOfRange {
        nt: Nonterminal,
        index: usize,
        count: usize,
    },
    /// Generation went deeper than the configured maximum
    DepthExceeded { nt: Nonterminal, depth: usize },
    /// Every generation attempt exceeded the maximum depth
    GenerationFailed { nt: Nonterminal, attempts: usize },
    /// Parseable text is malformed
    Parse(String),
    /// Parsed child has the wrong nonterminal
    ParseTypeMismatch {
        format: String,
        index: usize,
        expected: Nonterminal,
        got: Nonterminal,
    },
    /// Tree contains a gap where a complete tree is required
    IncompleteTree,
    /// Tree has no gap to expand
    NoGap,
    /// Neighbor index beyond the choices at the first gap
    NeighborOutOfRange { which: usize, count: usize },
    /// Enumeration code has no tree, or a tree's code does not fit
    Enumeration(StackError),
    /// Structural edit failed
    Node(NodeError),
}

impl std::fmt::Display for GrammarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FormatArity {
                format,
                placeholders,
                arity,
            } => write!(
                f,
                "Format {:?} has {} placeholders but {} children",
                format, placeholders, arity
            ),
            Self::InvalidWeight { format, p } => {
                write!(f, "Invalid weight {} for rule {:?}", p, format)
            }
            Self::UnknownType(t) => write!(f, "Type {} is not in the grammar", t),
            Self::UnknownNonterminal(nt) => write!(f, "Unknown nonterminal: {}", nt),
            Self::DuplicateType(t) => write!(f, "Type {} listed twice", t),
            Self::DuplicateRule { nt, format } => {
                write!(f, "Rule {:?} already exists in type {}", format, nt)
            }
            Self::InvalidBuiltin { op, out } => {
                write!(f, "Builtin {} cannot produce {}", op, out)
            }
            Self::InPlaceSignature { format } => write!(
                f,
                "In-place primitive {:?} must take its result type as first argument",
                format
            ),
            Self::TooManyPrimitives => write!(f, "Too many primitives (max 65535)"),
            Self::NoRules(nt) => write!(f, "Nonterminal {} has no rules", nt),
            Self::RuleNotFound { nt, name } => match nt {
                Some(nt) => write!(f, "No rule of type {} matches {:?}", nt, name),
                None => write!(f, "No rule matches {:?}", name),
            },
            Self::AmbiguousRule { nt, name, matches } => {
                write!(f, "Multiple rules match {:?}", name)?;
                if let Some(nt) = nt {
                    write!(f, " in type {}", nt)?;
                }
                write!(f, ": {}", matches.join(", "))
            }
            Self::RuleIndexOutOfRange { nt, index, count } => write!(
                f,
                "Rule index {} out of range for type {} ({} rules)",
                index, nt, count
            ),
            Self::DepthExceeded { nt, depth } => {
                write!(f, "Generation exceeded depth {} at type {}", depth, nt)
            }
            Self::GenerationFailed { nt, attempts } => write!(
                f,
                "Generation from type {} exceeded the maximum depth on all {} attempts",
                nt, attempts
            ),
            Self::Parse(msg) => write!(f, "Parse error: {}", msg),
            Self::ParseTypeMismatch {
                format,
                index,
                expected,
                got,
            } => write!(
                f,
                "Expected type {} but got {} at {:?} argument {}",
                expected, got, format, index
            ),
            Self::IncompleteTree => write!(f, "Tree is incomplete"),
            Self::NoGap => write!(f, "Tree has no gap to expand"),
            Self::NeighborOutOfRange { which, count } => {
                write!(f, "Neighbor {} out of range ({} choices)", which, count)
            }
            Self::Enumeration(e) => write!(f, "Enumeration error: {}", e),
            Self::Node(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GrammarError {}

impl From<StackError> for GrammarError {
    fn from(e: StackError) -> Self {
        Self::Enumeration(e)
    }
}

impl From<NodeError> for GrammarError {
    fn from(e: NodeError) -> Self {
        Self::Node(e)
    }
}

/// Result type for grammar operations
pub type GrammarResult<T> = Result<T, GrammarError>;
