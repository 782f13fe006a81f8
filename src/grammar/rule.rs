//! A single grammar production.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use smallvec::SmallVec;

use super::error::{GrammarError, GrammarResult};
use crate::vm::{BuiltinOp, Instruction, Op};

/// Index of a nonterminal (value type) within a grammar.
pub type Nonterminal = usize;

/// Placeholder substituted by child strings in a rule's format.
pub const CHILD_STR: &str = "%s";

/// Format of the null rule used for unfilled slots.
pub const NULL_FORMAT: &str = "■";

/// One production: `nt -> format(child_types...)` with weight `p`.
///
/// The weight is unnormalized; 0 is reserved for the null rule.
#[derive(Debug, Clone)]
pub struct Rule {
    nt: Nonterminal,
    format: String,
    child_types: SmallVec<[Nonterminal; 4]>,
    p: f64,
    instr: Instruction,
    hash: u64,
}

impl Rule {
    /// Build a rule, checking that the format has one placeholder per child and
    /// that the weight is positive and finite.
    pub fn new(
        nt: Nonterminal,
        format: &str,
        child_types: &[Nonterminal],
        p: f64,
        op: Op,
        arg: i32,
    ) -> GrammarResult<Self> {
        let placeholders = format.matches(CHILD_STR).count();
        if placeholders != child_types.len() {
            return Err(GrammarError::FormatArity {
                format: format.to_string(),
                placeholders,
                arity: child_types.len(),
            });
        }
        if !(p > 0.0 && p.is_finite()) {
            return Err(GrammarError::InvalidWeight {
                format: format.to_string(),
                p,
            });
        }
        Ok(Self::build(nt, format, child_types, p, Instruction { op, arg }))
    }

    fn build(
        nt: Nonterminal,
        format: &str,
        child_types: &[Nonterminal],
        p: f64,
        instr: Instruction,
    ) -> Self {
        let mut h = DefaultHasher::new();
        format.hash(&mut h);
        nt.hash(&mut h);
        child_types.hash(&mut h);
        instr.hash(&mut h);
        Self {
            nt,
            format: format.to_string(),
            child_types: child_types.iter().copied().collect(),
            p,
            instr,
            hash: h.finish(),
        }
    }

    /// The shared rule for gaps in partial trees.
    pub fn null() -> &'static Arc<Rule> {
        static NULL: OnceLock<Arc<Rule>> = OnceLock::new();
        NULL.get_or_init(|| {
            Arc::new(Self::build(
                0,
                NULL_FORMAT,
                &[],
                0.0,
                Instruction::builtin(BuiltinOp::Nop, 0),
            ))
        })
    }

    /// Same production with a different weight.
    pub(crate) fn with_p(&self, p: f64) -> Self {
        Self { p, ..self.clone() }
    }

    pub fn nt(&self) -> Nonterminal {
        self.nt
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn arity(&self) -> usize {
        self.child_types.len()
    }

    pub fn child_type(&self, i: usize) -> Option<Nonterminal> {
        self.child_types.get(i).copied()
    }

    pub fn child_types(&self) -> &[Nonterminal] {
        &self.child_types
    }

    pub fn instruction(&self) -> Instruction {
        self.instr
    }

    pub fn op(&self) -> Op {
        self.instr.op
    }

    pub fn arg(&self) -> i32 {
        self.instr.arg
    }

    /// Structural hash, cached at construction. Excludes the weight.
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    pub fn is_terminal(&self) -> bool {
        self.child_types.is_empty()
    }

    pub fn is_null(&self) -> bool {
        self.p == 0.0 && self.format == NULL_FORMAT
    }

    pub fn is_builtin(&self, op: BuiltinOp) -> bool {
        self.instr.is_builtin(op)
    }

    /// Same production, ignoring the weight.
    pub fn same_production(&self, other: &Rule) -> bool {
        self.hash == other.hash
            && self.nt == other.nt
            && self.format == other.format
            && self.child_types == other.child_types
            && self.instr == other.instr
    }

    /// Total order on productions, ignoring the weight.
    pub fn cmp_production(&self, other: &Rule) -> Ordering {
        self.nt
            .cmp(&other.nt)
            .then_with(|| self.format.cmp(&other.format))
            .then_with(|| self.child_types.cmp(&other.child_types))
            .then_with(|| self.instr.cmp(&other.instr))
    }

    /// Whether `name` selects this rule: `name` equals the format, or is a
    /// nonempty prefix of it.
    pub(crate) fn matches_prefix(&self, name: &str) -> bool {
        if name.is_empty() {
            self.format.is_empty()
        } else {
            self.format.starts_with(name)
        }
    }
}

/// Grammar list order: terminals first, then larger weights, then the
/// production. Independent of the hasher.
impl Ord for Rule {
    fn cmp(&self, other: &Self) -> Ordering {
        self.is_terminal()
            .cmp(&other.is_terminal())
            .reverse()
            .then_with(|| other.p.total_cmp(&self.p))
            .then_with(|| self.cmp_production(other))
    }
}

impl PartialOrd for Rule {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.same_production(other) && self.p.to_bits() == other.p.to_bits()
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
        self.p.to_bits().hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} -> {} : {}\t w/ p \u{221D} {}>",
            self.nt,
            self.format,
            self.child_types.iter().join(" "),
            self.p
        )
    }
}
