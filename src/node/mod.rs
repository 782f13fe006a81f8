//! Program Trees
//!
//! A [`Node`] is one rule application owning its children. A partially built tree
//! holds null nodes (the shared null rule) in unfilled slots.
//!
//! Nodes have no parent pointers. A position inside a tree is addressed by its
//! *path*, the sequence of child indices from the root, so copying or moving a
//! subtree never leaves a stale back-reference behind.
//!
//! - `error`: NodeError and CompileError
//! - `linearize`: compilation into a [`Program`](crate::vm::Program)

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use itertools::Itertools;

use crate::grammar::{Nonterminal, Rule, CHILD_STR};

mod error;
mod linearize;


pub use error::{CompileError, CompileResult, NodeError};

/// Separates a node's nonterminal from its format in parseable text.
pub const NT_DELIMITER: char = ':';
/// Separates nodes in parseable text.
pub const RULE_DELIMITER: char = ';';
/// Prefix shown before nodes that must not be resampled.
pub const FROZEN_MARK: &str = "\u{2022}";

/// A node in a program tree.
#[derive(Debug, Clone)]
pub struct Node {
    rule: Arc<Rule>,
    children: Vec<Node>,
    /// Log-probability of this node's rule choice
    pub lp: f64,
    /// Whether search may regenerate this subtree
    pub can_resample: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self::null()
    }
}

impl Node {
    /// A node for `rule` with every child slot unfilled.
    pub fn new(rule: Arc<Rule>, lp: f64) -> Self {
        let children = vec![Node::null(); rule.arity()];
        Self {
            rule,
            children,
            lp,
            can_resample: true,
        }
    }

    /// A gap.
    pub fn null() -> Self {
        Self {
            rule: Arc::clone(Rule::null()),
            children: Vec::new(),
            lp: 0.0,
            can_resample: true,
        }
    }

    /// Same rule, lp and flag as `self` over new children.
    pub(crate) fn with_children(&self, children: Vec<Node>) -> Result<Node, NodeError> {
        let mut out = Self {
            rule: Arc::clone(&self.rule),
            children: vec![Node::null(); self.rule.arity()],
            lp: self.lp,
            can_resample: self.can_resample,
        };
        for (i, c) in children.into_iter().enumerate() {
            out.set_child(i, c)?;
        }
        Ok(out)
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    /// Nonterminal this node produces.
    pub fn nt(&self) -> Nonterminal {
        self.rule.nt()
    }

    pub fn arity(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, i: usize) -> Option<&Node> {
        self.children.get(i)
    }

    pub fn child_mut(&mut self, i: usize) -> Option<&mut Node> {
        self.children.get_mut(i)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_null(&self) -> bool {
        Arc::ptr_eq(&self.rule, Rule::null()) || self.rule.is_null()
    }

    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// No gaps anywhere at or below this node.
    pub fn is_complete(&self) -> bool {
        !self.is_null() && self.children.iter().all(Node::is_complete)
    }

    /// Put `child` in slot `i`. Gaps are accepted in any slot; anything else
    /// must produce the rule's declared child type.
    pub fn set_child(&mut self, i: usize, child: Node) -> Result<(), NodeError> {
        let expected = self.rule.child_type(i).ok_or(NodeError::ChildIndex {
            index: i,
            arity: self.rule.arity(),
        })?;
        if !child.is_null() && child.nt() != expected {
            return Err(NodeError::TypeMismatch {
                index: i,
                expected,
                got: child.nt(),
            });
        }
        self.children[i] = child;
        Ok(())
    }

    // === Traversal ===

    /// Preorder iterator over this node and everything below it.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Number of nodes, gaps included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }

    /// Number of gaps.
    pub fn count_nulls(&self) -> usize {
        self.iter().filter(|n| n.is_null()).count()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Node::depth).max().unwrap_or(0)
    }

    /// Sum of `f` over this node and everything below.
    pub fn sum<T, F>(&self, f: &F) -> T
    where
        T: std::iter::Sum<T>,
        F: Fn(&Node) -> T,
    {
        self.iter().map(f).sum()
    }

    /// Apply `f` to this node and everything below, parents first.
    pub fn map<F: FnMut(&mut Node)>(&mut self, f: &mut F) {
        f(self);
        for c in &mut self.children {
            c.map(f);
        }
    }

    /// Paths of every node in preorder.
    pub fn paths(&self) -> Vec<Vec<usize>> {
        fn walk(n: &Node, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
            out.push(prefix.clone());
            for (i, c) in n.children.iter().enumerate() {
                prefix.push(i);
                walk(c, prefix, out);
                prefix.pop();
            }
        }
        let mut out = Vec::new();
        walk(self, &mut Vec::new(), &mut out);
        out
    }

    pub fn get(&self, path: &[usize]) -> Option<&Node> {
        path.iter().try_fold(self, |n, &i| n.children.get(i))
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        path.iter().try_fold(self, |n, &i| n.children.get_mut(i))
    }

    /// Replace the subtree at `path`, returning the old one.
    pub fn replace(&mut self, path: &[usize], node: Node) -> Result<Node, NodeError> {
        let Some((&last, parent_path)) = path.split_last() else {
            return Ok(std::mem::replace(self, node));
        };
        let parent = self
            .get_mut(parent_path)
            .ok_or_else(|| NodeError::InvalidPath(path.to_vec()))?;
        let old = parent
            .child(last)
            .cloned()
            .ok_or_else(|| NodeError::InvalidPath(path.to_vec()))?;
        parent.set_child(last, node)?;
        Ok(old)
    }

    /// Path of the first gap in preorder, and the nonterminal that slot expects.
    ///
    /// A gap at the root has no declared type, so it reports `None`.
    pub fn first_gap(&self) -> Option<(Vec<usize>, Option<Nonterminal>)> {
        if self.is_null() {
            return Some((Vec::new(), None));
        }
        for (i, c) in self.children.iter().enumerate() {
            if c.is_null() {
                return Some((vec![i], self.rule.child_type(i)));
            }
            if let Some((mut path, nt)) = c.first_gap() {
                path.insert(0, i);
                return Some((path, nt));
            }
        }
        None
    }

    /// Paths of nodes that search may regenerate, in preorder.
    pub fn resamplable_paths(&self) -> Vec<Vec<usize>> {
        self.paths()
            .into_iter()
            .filter(|p| self.get(p).is_some_and(|n| n.can_resample && !n.is_null()))
            .collect()
    }

    /// Mark every node in this tree as frozen.
    pub fn freeze(&mut self) {
        self.map(&mut |n| n.can_resample = false);
    }

    // === Text Forms ===

    /// Preorder `nt:format` tokens joined by `;`, readable by
    /// [`Grammar::from_parseable`](crate::grammar::Grammar::from_parseable).
    pub fn parseable(&self) -> String {
        self.iter()
            .map(|n| format!("{}{}{}", n.nt(), NT_DELIMITER, n.rule.format()))
            .join(&RULE_DELIMITER.to_string())
    }

    fn write_display(&self, out: &mut String) {
        if !self.can_resample {
            out.push_str(FROZEN_MARK);
        }
        let mut pieces = self.rule.format().split(CHILD_STR);
        if let Some(head) = pieces.next() {
            out.push_str(head);
        }
        for (c, piece) in self.children.iter().zip(pieces) {
            c.write_display(out);
            out.push_str(piece);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        self.write_display(&mut s);
        f.write_str(&s)
    }
}

/// Structural: productions first, then children left to right. Rule weights
/// and node log-probabilities are ignored.
impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rule
            .cmp_production(&other.rule)
            .then_with(|| self.children.len().cmp(&other.children.len()))
            .then_with(|| self.children.cmp(&other.children))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.rule, &other.rule) || self.rule.same_production(&other.rule))
            && self.children == other.children
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rule.hash_value().hash(state);
        self.children.len().hash(state);
        for c in &self.children {
            c.hash(state);
        }
    }
}

/// Preorder traversal.
pub struct Preorder<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let n = self.stack.pop()?;
        self.stack.extend(n.children.iter().rev());
        Some(n)
    }
}

impl<'a> IntoIterator for &'a Node {
    type Item = &'a Node;
    type IntoIter = Preorder<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
