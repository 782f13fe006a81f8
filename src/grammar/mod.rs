//! Typed Weighted Grammars
//!
//! A [`Grammar`] ranges over a fixed set of value types; each type is a
//! nonterminal, identified by its index in that set. Every nonterminal owns a
//! sorted list of [`Rule`]s (terminals first, then by decreasing weight) and a
//! cached normalizer `Z[nt]`, the sum of its rules' weights.
//!
//! # Building a grammar
//!
//! ```ignore
//! let mut g = Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str, ValueType::Bool])?;
//! g.add_builtin(BuiltinOp::X, ValueType::Str, "x", 1.0, 0)?;
//! g.add_terminal("''", "", 1.0)?;
//! g.add_primitive(ValueType::Str, "tail(%s)", &[ValueType::Str], 1.0, |args| {
//!     let s = args[0].as_str().unwrap_or_default();
//!     Ok(Value::from(s.chars().skip(1).collect::<String>()))
//! })?;
//! g.add_builtin(BuiltinOp::If, ValueType::Str, "if(%s,%s,%s)", 1.0, 0)?;
//! g.add_builtin(BuiltinOp::Flip, ValueType::Bool, "flip()", 1.0, 0)?;
//! ```
//!
//! Registration checks every rule once: placeholder count against arity, weight,
//! and the types of builtins. Once built, a grammar is read-only and may be
//! shared between threads.
//!
//! Submodules:
//! - `rule`: Rule, Nonterminal
//! - `error`: GrammarError
//! - `enumeration`: bijection between naturals and trees
//! - `search`: gaps, neighbors, completion
//! - `parse`: parseable and call-notation text forms

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, trace, warn};

use crate::config::GrammarConfig;
use crate::node::Node;
use crate::vm::{BuiltinOp, Op, PrimitiveId, PrimitiveResult, PrimitiveTable, Value, ValueType};

mod enumeration;
mod error;
mod parse;
mod rule;
mod search;

#[cfg(test)]
mod tests;

pub use error::{GrammarError, GrammarResult};
pub use rule::{Nonterminal, Rule, CHILD_STR, NULL_FORMAT};

/// A typed, weighted context-free grammar over program trees.
#[derive(Debug, Clone)]
pub struct Grammar {
    types: Vec<ValueType>,
    rules: Vec<Vec<Arc<Rule>>>,
    z: Vec<f64>,
    primitives: PrimitiveTable,
    input: ValueType,
    output: ValueType,
    config: GrammarConfig,
}

impl Grammar {
    /// Create an empty grammar over `types` for programs mapping `input` to
    /// `output`. Both must be among `types`.
    pub fn new(input: ValueType, output: ValueType, types: &[ValueType]) -> GrammarResult<Self> {
        let mut seen = Vec::with_capacity(types.len());
        for &t in types {
            if seen.contains(&t) {
                return Err(GrammarError::DuplicateType(t));
            }
            seen.push(t);
        }
        for t in [input, output] {
            if !seen.contains(&t) {
                return Err(GrammarError::UnknownType(t));
            }
        }
        Ok(Self {
            rules: vec![Vec::new(); types.len()],
            z: vec![0.0; types.len()],
            types: seen,
            primitives: PrimitiveTable::new(),
            input,
            output,
            config: GrammarConfig::default(),
        })
    }

    pub fn with_config(mut self, config: GrammarConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    pub fn input_type(&self) -> ValueType {
        self.input
    }

    pub fn output_type(&self) -> ValueType {
        self.output
    }

    /// Nonterminal programs start from.
    pub fn start(&self) -> Nonterminal {
        self.types
            .iter()
            .position(|&t| t == self.output)
            .unwrap_or_default()
    }

    /// Nonterminal for a value type.
    pub fn nt(&self, t: ValueType) -> GrammarResult<Nonterminal> {
        self.types
            .iter()
            .position(|&x| x == t)
            .ok_or(GrammarError::UnknownType(t))
    }

    /// Value type of a nonterminal.
    pub fn value_type(&self, nt: Nonterminal) -> Option<ValueType> {
        self.types.get(nt).copied()
    }

    pub fn count_types(&self) -> usize {
        self.types.len()
    }

    /// Primitive implementations referenced by this grammar's rules.
    pub fn primitives(&self) -> &PrimitiveTable {
        &self.primitives
    }

    fn check_nt(&self, nt: Nonterminal) -> GrammarResult<()> {
        if nt < self.types.len() {
            Ok(())
        } else {
            Err(GrammarError::UnknownNonterminal(nt))
        }
    }

    fn nts(&self, types: &[ValueType]) -> GrammarResult<Vec<Nonterminal>> {
        types.iter().map(|&t| self.nt(t)).collect()
    }

    // === Registration ===

    /// A rule may be registered if its types exist and no rule of its
    /// nonterminal already has its format.
    fn check_new(&self, rule: &Rule) -> GrammarResult<()> {
        self.check_nt(rule.nt())?;
        for &c in rule.child_types() {
            self.check_nt(c)?;
        }
        if self.rules[rule.nt()].iter().any(|r| r.format() == rule.format()) {
            return Err(GrammarError::DuplicateRule {
                nt: rule.nt(),
                format: rule.format().to_string(),
            });
        }
        Ok(())
    }

    /// Insert a rule into its nonterminal's sorted list.
    pub fn add(&mut self, rule: Rule) -> GrammarResult<Arc<Rule>> {
        self.check_new(&rule)?;
        let nt = rule.nt();
        let rule = Arc::new(rule);
        let pos = self.rules[nt].partition_point(|r| r.as_ref() < rule.as_ref());
        self.rules[nt].insert(pos, Arc::clone(&rule));
        self.z[nt] += rule.p();
        trace!(target: "lotvm::grammar", rule = %rule, "add");
        Ok(rule)
    }

    fn next_primitive_id(&self) -> GrammarResult<PrimitiveId> {
        u16::try_from(self.primitives.len())
            .ok()
            .filter(|&n| n < u16::MAX)
            .map(PrimitiveId)
            .ok_or(GrammarError::TooManyPrimitives)
    }

    /// Register a pure primitive producing `out` from `args`.
    pub fn add_primitive<F>(
        &mut self,
        out: ValueType,
        format: &str,
        args: &[ValueType],
        p: f64,
        f: F,
    ) -> GrammarResult<Arc<Rule>>
    where
        F: Fn(&[Value]) -> PrimitiveResult<Value> + Send + Sync + 'static,
    {
        let id = self.next_primitive_id()?;
        let rule = Rule::new(self.nt(out)?, format, &self.nts(args)?, p, Op::Primitive(id), 0)?;
        self.check_new(&rule)?;
        let registered = self.primitives.register_pure(format, out, args, f);
        debug_assert_eq!(registered, id);
        self.add(rule)
    }

    /// Register a primitive that mutates its first argument in place.
    /// `args[0]` must be `out`.
    pub fn add_in_place<F>(
        &mut self,
        out: ValueType,
        format: &str,
        args: &[ValueType],
        p: f64,
        f: F,
    ) -> GrammarResult<Arc<Rule>>
    where
        F: Fn(&mut Value, &[Value]) -> PrimitiveResult<()> + Send + Sync + 'static,
    {
        if args.first() != Some(&out) {
            return Err(GrammarError::InPlaceSignature {
                format: format.to_string(),
            });
        }
        let id = self.next_primitive_id()?;
        let rule = Rule::new(self.nt(out)?, format, &self.nts(args)?, p, Op::Primitive(id), 0)?;
        self.check_new(&rule)?;
        let registered = self.primitives.register_in_place(format, out, args, f);
        debug_assert_eq!(registered, id);
        self.add(rule)
    }

    /// Register a constant.
    pub fn add_terminal(
        &mut self,
        format: &str,
        value: impl Into<Value>,
        p: f64,
    ) -> GrammarResult<Arc<Rule>> {
        let value = value.into();
        let out = value.value_type();
        let id = self.next_primitive_id()?;
        let rule = Rule::new(self.nt(out)?, format, &[], p, Op::Primitive(id), 0)?;
        self.check_new(&rule)?;
        let registered = self.primitives.register_constant(format, value);
        debug_assert_eq!(registered, id);
        self.add(rule)
    }

    /// Register a builtin producing `out`. Child types follow from the builtin.
    pub fn add_builtin(
        &mut self,
        op: BuiltinOp,
        out: ValueType,
        format: &str,
        p: f64,
        arg: i32,
    ) -> GrammarResult<Arc<Rule>> {
        let children = op
            .signature(out, self.input, self.output)
            .ok_or(GrammarError::InvalidBuiltin { op, out })?;
        let rule = Rule::new(self.nt(out)?, format, &self.nts(&children)?, p, Op::Builtin(op), arg)?;
        self.add(rule)
    }

    /// Remove every rule of `nt`.
    pub fn remove_all(&mut self, nt: Nonterminal) -> GrammarResult<()> {
        self.check_nt(nt)?;
        self.rules[nt].clear();
        self.z[nt] = 0.0;
        Ok(())
    }

    /// Change the weight of the rule selected by `name` (see [`Grammar::get_rule_any`]).
    ///
    /// The rule keeps its position, so enumeration codes are unchanged; the
    /// normalizer is recomputed from the live weights.
    pub fn change_probability(&mut self, name: &str, p: f64) -> GrammarResult<()> {
        let old = Arc::clone(self.get_rule_any(name)?);
        if !(p > 0.0 && p.is_finite()) {
            return Err(GrammarError::InvalidWeight {
                format: old.format().to_string(),
                p,
            });
        }
        let nt = old.nt();
        let k = self
            .get_index_of(&old)
            .ok_or_else(|| GrammarError::RuleNotFound {
                nt: Some(nt),
                name: name.to_string(),
            })?;
        self.rules[nt][k] = Arc::new(old.with_p(p));
        self.z[nt] = self.rules[nt].iter().map(|r| r.p()).sum();
        debug!(target: "lotvm::grammar", format = old.format(), from = old.p(), to = p, "change_probability");
        Ok(())
    }

    // === Counting ===

    pub fn count_rules(&self, nt: Nonterminal) -> usize {
        self.rules.get(nt).map_or(0, Vec::len)
    }

    pub fn count_all_rules(&self) -> usize {
        self.rules.iter().map(Vec::len).sum()
    }

    pub fn count_terminals(&self, nt: Nonterminal) -> usize {
        self.rules
            .get(nt)
            .map_or(0, |rs| rs.iter().filter(|r| r.is_terminal()).count())
    }

    /// Number of rules of `nt` that have children.
    pub fn count_nonterminals(&self, nt: Nonterminal) -> usize {
        self.count_rules(nt) - self.count_terminals(nt)
    }

    /// Sum of the weights of `nt`'s rules.
    pub fn rule_normalizer(&self, nt: Nonterminal) -> f64 {
        self.z.get(nt).copied().unwrap_or(0.0)
    }

    // === Lookup ===

    pub fn rules(&self, nt: Nonterminal) -> &[Arc<Rule>] {
        self.rules.get(nt).map_or(&[], Vec::as_slice)
    }

    /// Every rule, nonterminal by nonterminal.
    pub fn iter_rules(&self) -> impl Iterator<Item = &Arc<Rule>> + Clone {
        self.rules.iter().flatten()
    }

    /// Position of `rule` in its nonterminal's list, ignoring weight.
    pub fn get_index_of(&self, rule: &Rule) -> Option<usize> {
        self.rules
            .get(rule.nt())?
            .iter()
            .position(|r| std::ptr::eq(r.as_ref(), rule) || r.same_production(rule))
    }

    /// Index of `rule` among all rules, counting nonterminals in order.
    pub fn get_packed_index(&self, rule: &Rule) -> Option<usize> {
        let before: usize = self.rules.iter().take(rule.nt()).map(Vec::len).sum();
        self.get_index_of(rule).map(|k| before + k)
    }

    /// The `k`th rule of `nt`.
    pub fn get_rule_at(&self, nt: Nonterminal, k: usize) -> GrammarResult<&Arc<Rule>> {
        self.check_nt(nt)?;
        self.rules[nt].get(k).ok_or(GrammarError::RuleIndexOutOfRange {
            nt,
            index: k,
            count: self.rules[nt].len(),
        })
    }

    /// The rule of `nt` that is a builtin `op` with argument `arg`.
    pub fn get_rule_by_op(&self, nt: Nonterminal, op: BuiltinOp, arg: i32) -> GrammarResult<&Arc<Rule>> {
        self.check_nt(nt)?;
        self.rules[nt]
            .iter()
            .find(|r| r.is_builtin(op) && r.arg() == arg)
            .ok_or_else(|| GrammarError::RuleNotFound {
                nt: Some(nt),
                name: op.mnemonic().to_string(),
            })
    }

    fn select<'a>(
        candidates: impl Iterator<Item = &'a Arc<Rule>> + Clone,
        nt: Option<Nonterminal>,
        name: &str,
    ) -> GrammarResult<&'a Arc<Rule>> {
        let exact: Vec<_> = candidates.clone().filter(|r| r.format() == name).collect();
        let found = if exact.is_empty() {
            candidates.filter(|r| r.matches_prefix(name)).collect()
        } else {
            exact
        };
        match found.as_slice() {
            [r] => Ok(*r),
            [] => Err(GrammarError::RuleNotFound {
                nt,
                name: name.to_string(),
            }),
            many => Err(GrammarError::AmbiguousRule {
                nt,
                name: name.to_string(),
                matches: many.iter().map(|r| r.format().to_string()).collect(),
            }),
        }
    }

    /// The rule of `nt` selected by `name`: the rule whose format equals
    /// `name`, or else the one rule whose format starts with it. The empty
    /// name only selects an empty format.
    pub fn get_rule(&self, nt: Nonterminal, name: &str) -> GrammarResult<&Arc<Rule>> {
        self.check_nt(nt)?;
        Self::select(self.rules[nt].iter(), Some(nt), name)
    }

    /// As [`Grammar::get_rule`], searching every nonterminal.
    pub fn get_rule_any(&self, name: &str) -> GrammarResult<&Arc<Rule>> {
        Self::select(self.iter_rules(), None, name)
    }

    // === Sampling and Generation ===

    /// A node for `rule` with unfilled children, carrying the rule's
    /// log-probability under this grammar.
    pub fn make_node(&self, rule: &Arc<Rule>) -> Node {
        let lp = if rule.is_null() {
            0.0
        } else {
            rule.p().ln() - self.rule_normalizer(rule.nt()).ln()
        };
        Node::new(Arc::clone(rule), lp)
    }

    /// Draw a rule of `nt` with probability proportional to its weight.
    pub fn sample_rule<R: Rng + ?Sized>(&self, nt: Nonterminal, rng: &mut R) -> GrammarResult<&Arc<Rule>> {
        self.check_nt(nt)?;
        let rules = &self.rules[nt];
        let last = rules.last().ok_or(GrammarError::NoRules(nt))?;
        let mut u = rng.gen::<f64>() * self.z[nt];
        for r in rules {
            if u < r.p() {
                return Ok(r);
            }
            u -= r.p();
        }
        Ok(last)
    }

    fn generate_at<R: Rng + ?Sized>(
        &self,
        nt: Nonterminal,
        depth: usize,
        rng: &mut R,
    ) -> GrammarResult<Node> {
        if depth >= self.config.max_depth {
            return Err(GrammarError::DepthExceeded { nt, depth });
        }
        let rule = self.sample_rule(nt, rng)?;
        let mut node = self.make_node(rule);
        for (i, &c) in rule.child_types().iter().enumerate() {
            let child = self.generate_at(c, depth + 1, rng)?;
            node.set_child(i, child)?;
        }
        Ok(node)
    }

    /// Sample a complete tree rooted at `nt`.
    ///
    /// A draw that exceeds the maximum depth is retried up to
    /// `generate_retries` times before failing with
    /// [`GrammarError::GenerationFailed`].
    pub fn generate<R: Rng + ?Sized>(&self, nt: Nonterminal, rng: &mut R) -> GrammarResult<Node> {
        let attempts = self.config.generate_retries;
        for attempt in 0..attempts {
            match self.generate_at(nt, 0, rng) {
                Err(GrammarError::DepthExceeded { depth, .. }) => {
                    debug!(target: "lotvm::grammar", nt, depth, attempt, "depth exceeded, retrying");
                }
                result => return result,
            }
        }
        warn!(target: "lotvm::grammar", nt, attempts, "generation failed on every attempt");
        Err(GrammarError::GenerationFailed { nt, attempts })
    }

    /// Copy `node`, regenerating every subtree whose root satisfies `pred`.
    pub fn copy_resample<F, R>(&self, node: &Node, pred: &F, rng: &mut R) -> GrammarResult<Node>
    where
        F: Fn(&Node) -> bool,
        R: Rng + ?Sized,
    {
        if pred(node) {
            return self.generate(node.nt(), rng);
        }
        let children = node
            .children()
            .iter()
            .map(|c| self.copy_resample(c, pred, rng))
            .collect::<GrammarResult<Vec<_>>>()?;
        Ok(node.with_children(children)?)
    }

    // === Probabilities ===

    fn live_weight(&self, rule: &Rule) -> f64 {
        self.get_index_of(rule)
            .map_or(rule.p(), |k| self.rules[rule.nt()][k].p())
    }

    /// Log prior of a tree: `Σ log p − log Z` over its non-null nodes, using the
    /// grammar's current weights.
    pub fn log_probability(&self, node: &Node) -> f64 {
        node.iter()
            .filter(|n| !n.is_null())
            .map(|n| self.live_weight(n.rule()).ln() - self.rule_normalizer(n.nt()).ln())
            .sum()
    }

    /// How often each rule is used in `node`, indexed by packed rule index.
    pub fn get_counts(&self, node: &Node) -> GrammarResult<Vec<usize>> {
        let mut out = vec![0; self.count_all_rules()];
        self.accumulate_counts(node, &mut out)?;
        Ok(out)
    }

    /// As [`Grammar::get_counts`], summed over several trees.
    pub fn get_counts_all<'a>(&self, nodes: impl IntoIterator<Item = &'a Node>) -> GrammarResult<Vec<usize>> {
        let mut out = vec![0; self.count_all_rules()];
        for node in nodes {
            self.accumulate_counts(node, &mut out)?;
        }
        Ok(out)
    }

    fn accumulate_counts(&self, node: &Node, out: &mut [usize]) -> GrammarResult<()> {
        for n in node.iter().filter(|n| !n.is_null()) {
            let k = self
                .get_packed_index(n.rule())
                .ok_or_else(|| GrammarError::RuleNotFound {
                    nt: Some(n.nt()),
                    name: n.rule().format().to_string(),
                })?;
            out[k] += 1;
        }
        Ok(())
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (nt, rules) in self.rules.iter().enumerate() {
            writeln!(
                f,
                "# {} ({}): Z = {}",
                nt,
                self.types[nt],
                self.z[nt]
            )?;
            for r in rules {
                writeln!(f, "{}", r)?;
            }
        }
        Ok(())
    }
}
