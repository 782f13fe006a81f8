//! Reading trees back from text.
//!
//! Two forms are accepted:
//! - parseable text, as written by [`Node::parseable`]: preorder `nt:format`
//!   tokens joined by `;`, with `■` standing for a gap
//! - call notation, as displayed for rules whose formats look like
//!   `f(%s,%s)`: `f(g(x),'a')`, optionally prefixed by `λx.`
//!
//! Formats are matched with [`Grammar::get_rule`], so a token may abbreviate a
//! format by any unique prefix. Formats containing `;` cannot be read back from
//! parseable text.

use std::collections::VecDeque;

use super::rule::NULL_FORMAT;
use super::{Grammar, GrammarError, GrammarResult, Nonterminal};
use crate::node::{Node, NT_DELIMITER, RULE_DELIMITER};

const LAMBDA_PREFIX: &str = "\u{03BB}x.";

impl Grammar {
    /// Rebuild a tree from its parseable text.
    pub fn from_parseable(&self, s: &str) -> GrammarResult<Node> {
        let mut tokens: VecDeque<&str> = s.split(RULE_DELIMITER).collect();
        let node = self.parse_tokens(&mut tokens)?;
        if !tokens.is_empty() {
            return Err(GrammarError::Parse(format!(
                "{} unused tokens after a complete tree",
                tokens.len()
            )));
        }
        Ok(node)
    }

    fn parse_tokens(&self, tokens: &mut VecDeque<&str>) -> GrammarResult<Node> {
        let token = tokens
            .pop_front()
            .ok_or_else(|| GrammarError::Parse("ran out of tokens".to_string()))?;
        let (nt, format) = token
            .split_once(NT_DELIMITER)
            .ok_or_else(|| GrammarError::Parse(format!("missing '{}' in {:?}", NT_DELIMITER, token)))?;

        if format == NULL_FORMAT {
            return Ok(Node::null());
        }

        let nt: Nonterminal = nt
            .trim()
            .parse()
            .map_err(|_| GrammarError::Parse(format!("bad nonterminal in {:?}", token)))?;
        let rule = self.get_rule(nt, format)?;
        let mut node = self.make_node(rule);
        for (i, &expected) in rule.child_types().iter().enumerate() {
            let child = self.parse_tokens(tokens)?;
            check_child(rule.format(), i, expected, &child)?;
            node.set_child(i, child)?;
        }
        Ok(node)
    }

    /// Read a tree written in call notation, e.g. `and(not(x),flip())`.
    pub fn simple_parse(&self, s: &str) -> GrammarResult<Node> {
        let s = s.strip_prefix(LAMBDA_PREFIX).unwrap_or(s).trim_matches([' ', '\t']);
        if s.is_empty() {
            return Err(GrammarError::Parse("empty expression".to_string()));
        }

        let Some(Chunks { open, commas, close }) = find_chunks(s)? else {
            return Ok(self.make_node(self.get_rule_any(s)?));
        };
        if close == open + 1 {
            // f()
            return Ok(self.make_node(self.get_rule_any(s)?));
        }

        let mut format = format!("{}(%s", &s[..open]);
        for _ in &commas {
            format.push_str(",%s");
        }
        format.push(')');

        let rule = self.get_rule_any(&format)?;
        let mut node = self.make_node(rule);
        let bounds = std::iter::once(open)
            .chain(commas.iter().copied())
            .zip(commas.iter().copied().chain(std::iter::once(close)));
        for (i, (start, end)) in bounds.enumerate() {
            let child = self.simple_parse(&s[start + 1..end])?;
            let expected = rule
                .child_type(i)
                .ok_or_else(|| GrammarError::Parse(format!("too many arguments to {:?}", format)))?;
            check_child(rule.format(), i, expected, &child)?;
            node.set_child(i, child)?;
        }
        Ok(node)
    }
}

fn check_child(format: &str, index: usize, expected: Nonterminal, child: &Node) -> GrammarResult<()> {
    if !child.is_null() && child.nt() != expected {
        return Err(GrammarError::ParseTypeMismatch {
            format: format.to_string(),
            index,
            expected,
            got: child.nt(),
        });
    }
    Ok(())
}

/// Positions of the first `(`, the commas directly inside it, and its `)`.
struct Chunks {
    open: usize,
    commas: Vec<usize>,
    close: usize,
}

fn find_chunks(s: &str) -> GrammarResult<Option<Chunks>> {
    let mut open = None;
    let mut commas = Vec::new();
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => {
                if depth == 0 && open.is_none() {
                    open = Some(i);
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(GrammarError::Parse(format!("unbalanced ')' in {:?}", s)));
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(open) = open {
                        let rest = s[i + 1..].trim_matches([' ', '\t']);
                        if !rest.is_empty() {
                            return Err(GrammarError::Parse(format!(
                                "unexpected {:?} after {:?}",
                                rest,
                                &s[..=i]
                            )));
                        }
                        return Ok(Some(Chunks { open, commas, close: i }));
                    }
                }
            }
            ',' if depth == 1 => commas.push(i),
            _ => {}
        }
    }
    match open {
        Some(_) => Err(GrammarError::Parse(format!("unclosed '(' in {:?}", s))),
        None => Ok(None),
    }
}
