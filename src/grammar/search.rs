//! Partial trees as search states.
//!
//! A partial tree's neighbors are the ways of filling its first gap (preorder):
//! one per rule of the gap's nonterminal, in the grammar's rule order. A gap at
//! the root takes its nonterminal from the caller.

use rand::Rng;

use super::{Grammar, GrammarError, GrammarResult, Nonterminal};
use crate::node::Node;

impl Grammar {
    /// Nonterminal and path of the first gap of `node`, whose root produces `nt`.
    fn gap_of(&self, nt: Nonterminal, node: &Node) -> Option<(Vec<usize>, Nonterminal)> {
        node.first_gap()
            .map(|(path, gap_nt)| (path, gap_nt.unwrap_or(nt)))
    }

    /// Number of ways to fill the first gap, or 0 for a complete tree.
    pub fn neighbors(&self, nt: Nonterminal, node: &Node) -> usize {
        self.gap_of(nt, node)
            .map_or(0, |(_, gap_nt)| self.count_rules(gap_nt))
    }

    /// Fill the first gap of `node` with an unfilled node of its `which`th rule.
    pub fn expand_to_neighbor(&self, nt: Nonterminal, node: &mut Node, which: usize) -> GrammarResult<()> {
        let (path, gap_nt) = self.gap_of(nt, node).ok_or(GrammarError::NoGap)?;
        let count = self.count_rules(gap_nt);
        let rule = self
            .rules(gap_nt)
            .get(which)
            .ok_or(GrammarError::NeighborOutOfRange { which, count })?;
        node.replace(&path, self.make_node(rule))?;
        Ok(())
    }

    /// Copy of `node` with its first gap filled by rule `k`.
    pub fn make_neighbor(&self, nt: Nonterminal, node: &Node, k: usize) -> GrammarResult<Node> {
        let mut out = node.clone();
        self.expand_to_neighbor(nt, &mut out, k)?;
        Ok(out)
    }

    /// Log-probability of the rule [`Grammar::expand_to_neighbor`] would insert.
    pub fn neighbor_prior(&self, nt: Nonterminal, node: &Node, which: usize) -> GrammarResult<f64> {
        let (_, gap_nt) = self.gap_of(nt, node).ok_or(GrammarError::NoGap)?;
        let count = self.count_rules(gap_nt);
        let rule = self
            .rules(gap_nt)
            .get(which)
            .ok_or(GrammarError::NeighborOutOfRange { which, count })?;
        Ok(rule.p().ln() - self.rule_normalizer(gap_nt).ln())
    }

    /// Fill every gap of `node` with a generated subtree.
    pub fn complete<R: Rng + ?Sized>(&self, nt: Nonterminal, node: &mut Node, rng: &mut R) -> GrammarResult<()> {
        if node.is_null() {
            *node = self.generate(nt, rng)?;
            return Ok(());
        }
        let types: Vec<Nonterminal> = node.rule().child_types().to_vec();
        for (i, c) in types.into_iter().enumerate() {
            let is_gap = node.child(i).is_some_and(Node::is_null);
            if is_gap {
                node.set_child(i, self.generate(c, rng)?)?;
            } else if let Some(child) = node.child_mut(i) {
                self.complete(c, child, rng)?;
            }
        }
        Ok(())
    }

    /// Copy of `node` with its existing nodes frozen and its gaps generated.
    pub fn copy_and_complete<R: Rng + ?Sized>(
        &self,
        nt: Nonterminal,
        node: &Node,
        rng: &mut R,
    ) -> GrammarResult<Node> {
        let mut out = node.clone();
        out.freeze();
        self.complete(nt, &mut out, rng)?;
        Ok(out)
    }
}
