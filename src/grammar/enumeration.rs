//! Enumeration of trees by natural numbers.
//!
//! Codes below the number of terminals of a nonterminal select a terminal
//! directly. Larger codes, after subtracting that count, are modulus-paired
//! with the index of a nonterminal rule; the remainder is split among the
//! rule's children, `n - 1` Rosenberg–Strong pops followed by whatever is left
//! for the last child. Every complete tree of a nonterminal with at least one
//! terminal and one nonterminal rule has exactly one code.

use tracing::trace;

use super::{Grammar, GrammarError, GrammarResult, Nonterminal};
use crate::integerized_stack::{EnumerationCode, IntegerizedStack, StackError};
use crate::node::Node;

impl Grammar {
    /// The tree of `nt` with code `z`.
    pub fn expand_from_integer(&self, nt: Nonterminal, z: EnumerationCode) -> GrammarResult<Node> {
        self.check_nt(nt)?;
        self.expand_at(nt, z, 0)
    }

    fn expand_at(&self, nt: Nonterminal, z: EnumerationCode, depth: usize) -> GrammarResult<Node> {
        if depth >= self.config.max_depth {
            return Err(GrammarError::DepthExceeded { nt, depth });
        }

        let numterm = self.count_terminals(nt) as u64;
        if z < numterm {
            return Ok(self.make_node(&self.rules[nt][z as usize]));
        }

        let numnonterm = self.count_nonterminals(nt) as u64;
        if numnonterm == 0 {
            return Err(StackError::OutOfRange { x: z, k: numterm }.into());
        }

        let mut is = IntegerizedStack::new(z - numterm);
        let ri = is.mod_pop(numnonterm)?;
        let rule = &self.rules[nt][(ri + numterm) as usize];
        let codes = is.split(rule.arity());

        let mut node = self.make_node(rule);
        for (i, (&c, code)) in rule.child_types().iter().zip(codes).enumerate() {
            node.set_child(i, self.expand_at(c, code, depth + 1)?)?;
        }
        trace!(target: "lotvm::grammar", nt, z, tree = %node, "expand_from_integer");
        Ok(node)
    }

    /// The code of a complete tree; inverse of [`Grammar::expand_from_integer`].
    pub fn compute_enumeration_order(&self, node: &Node) -> GrammarResult<EnumerationCode> {
        if node.is_null() {
            return Err(GrammarError::IncompleteTree);
        }
        let nt = node.nt();
        let index = self
            .get_index_of(node.rule())
            .ok_or_else(|| GrammarError::RuleNotFound {
                nt: Some(nt),
                name: node.rule().format().to_string(),
            })? as u64;

        let Some((last, rest)) = node.children().split_last() else {
            return Ok(index);
        };

        let numterm = self.count_terminals(nt) as u64;
        let mut is = IntegerizedStack::new(self.compute_enumeration_order(last)?);
        for c in rest.iter().rev() {
            is.push(self.compute_enumeration_order(c)?)?;
        }
        is.mod_push(index - numterm, self.count_nonterminals(nt) as u64)?;
        is.add(numterm)?;
        Ok(is.get_value())
    }

    /// Trees of `nt` for codes `0, 1, 2, ...` in order.
    pub fn enumerate(&self, nt: Nonterminal) -> impl Iterator<Item = GrammarResult<Node>> + '_ {
        (0..).map(move |z| self.expand_from_integer(nt, z))
    }
}
