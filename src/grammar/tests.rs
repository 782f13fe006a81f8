use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::config::GrammarConfig;
use crate::node::Node;
use crate::vm::{BuiltinOp, Value, ValueType};

fn concat(args: &[Value]) -> crate::vm::PrimitiveResult<Value> {
    let a = args[0].as_str().unwrap_or_default();
    let b = args[1].as_str().unwrap_or_default();
    Ok(Value::from(format!("{}{}", a, b)))
}

/// S -> a | (S S)
fn pairs() -> Grammar {
    let mut g = Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str]).unwrap();
    g.add_terminal("a", "a", 1.0).unwrap();
    g.add_primitive(ValueType::Str, "(%s%s)", &[ValueType::Str, ValueType::Str], 1.0, |args| {
        let s = concat(args)?;
        Ok(Value::from(format!("({})", s.as_str().unwrap_or_default())))
    })
    .unwrap();
    g
}

/// Str and Bool with a handful of builtins.
fn mixed() -> Grammar {
    let mut g =
        Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str, ValueType::Bool]).unwrap();
    g.add_builtin(BuiltinOp::X, ValueType::Str, "x", 2.0, 0).unwrap();
    g.add_terminal("'a'", "a", 1.0).unwrap();
    g.add_primitive(ValueType::Str, "cat(%s,%s)", &[ValueType::Str, ValueType::Str], 1.0, concat)
        .unwrap();
    g.add_builtin(BuiltinOp::If, ValueType::Str, "if(%s,%s,%s)", 0.5, 0).unwrap();
    g.add_builtin(BuiltinOp::Flip, ValueType::Bool, "flip()", 1.0, 0).unwrap();
    g.add_builtin(BuiltinOp::Not, ValueType::Bool, "not(%s)", 1.0, 0).unwrap();
    g
}

// === Construction ===

#[test]
fn test_new_checks_types() {
    assert_eq!(
        Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str, ValueType::Str]).unwrap_err(),
        GrammarError::DuplicateType(ValueType::Str)
    );
    assert_eq!(
        Grammar::new(ValueType::Str, ValueType::Bool, &[ValueType::Str]).unwrap_err(),
        GrammarError::UnknownType(ValueType::Bool)
    );
}

#[test]
fn test_rules_sorted_terminals_first() {
    let g = mixed();
    let s = g.nt(ValueType::Str).unwrap();
    let formats: Vec<_> = g.rules(s).iter().map(|r| r.format().to_string()).collect();
    assert_eq!(formats, vec!["x", "'a'", "cat(%s,%s)", "if(%s,%s,%s)"]);
    assert_eq!(g.count_rules(s), 4);
    assert_eq!(g.count_terminals(s), 2);
    assert_eq!(g.count_nonterminals(s), 2);
    assert_eq!(g.count_all_rules(), 6);
    assert!((g.rule_normalizer(s) - 4.5).abs() < 1e-12);
}

#[test]
fn test_builtin_signature_checked() {
    let mut g = mixed();
    let err = g.add_builtin(BuiltinOp::Flip, ValueType::Str, "flip2()", 1.0, 0).unwrap_err();
    assert_eq!(
        err,
        GrammarError::InvalidBuiltin {
            op: BuiltinOp::Flip,
            out: ValueType::Str
        }
    );
}

#[test]
fn test_if_child_types() {
    let g = mixed();
    let r = g.get_rule_any("if").unwrap();
    let b = g.nt(ValueType::Bool).unwrap();
    let s = g.nt(ValueType::Str).unwrap();
    assert_eq!(r.child_types(), &[b, s, s]);
}

#[test]
fn test_in_place_signature_checked() {
    let mut g = mixed();
    let err = g
        .add_in_place(ValueType::Str, "push(%s,%s)", &[ValueType::Bool, ValueType::Str], 1.0, |_, _| Ok(()))
        .unwrap_err();
    assert!(matches!(err, GrammarError::InPlaceSignature { .. }));
    assert!(g
        .add_in_place(ValueType::Str, "push(%s,%s)", &[ValueType::Str, ValueType::Str], 1.0, |_, _| Ok(()))
        .is_ok());
}

#[test]
fn test_failed_registration_leaves_no_primitive() {
    let mut g = mixed();
    let before = g.primitives().len();
    assert!(g.add_primitive(ValueType::Str, "bad(%s)", &[], 1.0, |_| Ok(Value::from(""))).is_err());
    assert_eq!(g.primitives().len(), before);
}

// === Lookup ===

#[test]
fn test_get_rule_exact_and_prefix() {
    let g = mixed();
    let s = g.nt(ValueType::Str).unwrap();
    assert_eq!(g.get_rule(s, "x").unwrap().format(), "x");
    assert_eq!(g.get_rule(s, "ca").unwrap().format(), "cat(%s,%s)");
    assert!(matches!(g.get_rule(s, "zz"), Err(GrammarError::RuleNotFound { .. })));
    assert!(matches!(g.get_rule(s, ""), Err(GrammarError::RuleNotFound { .. })));
}

#[test]
fn test_get_rule_ambiguous() {
    let mut g = mixed();
    g.add_primitive(ValueType::Str, "cap(%s)", &[ValueType::Str], 1.0, |a| Ok(a[0].clone()))
        .unwrap();
    match g.get_rule_any("ca") {
        Err(GrammarError::AmbiguousRule { matches, .. }) => assert_eq!(matches.len(), 2),
        other => panic!("expected ambiguity, got {:?}", other),
    }
}

#[test]
fn test_packed_index() {
    let g = mixed();
    let not = g.get_rule_any("not").unwrap();
    // 4 Str rules come first
    assert_eq!(g.get_packed_index(not), Some(5));
    assert_eq!(g.get_index_of(not), Some(1));
}

#[test]
fn test_change_probability_keeps_position() {
    let mut g = mixed();
    let s = g.nt(ValueType::Str).unwrap();
    g.change_probability("cat", 10.0).unwrap();
    assert_eq!(g.rules(s)[2].format(), "cat(%s,%s)");
    assert_eq!(g.rules(s)[2].p(), 10.0);
    assert!((g.rule_normalizer(s) - 13.5).abs() < 1e-12);
    assert!(matches!(
        g.change_probability("cat", -1.0),
        Err(GrammarError::InvalidWeight { .. })
    ));
}

#[test]
fn test_trees_survive_weight_change() {
    let mut g = pairs();
    let t = g.expand_from_integer(0, 3).unwrap();
    let text = t.parseable();
    g.change_probability("a", 3.0).unwrap();

    let z = g.compute_enumeration_order(&t).unwrap();
    assert_eq!(z, 3);
    let back = g.expand_from_integer(0, z).unwrap();
    assert_eq!(back, t);
    assert_eq!(g.from_parseable(&text).unwrap(), t);

    let mut seen = std::collections::HashSet::new();
    seen.insert(t.clone());
    assert!(!seen.insert(back));
    assert_eq!(t.cmp(&g.from_parseable(&text).unwrap()), std::cmp::Ordering::Equal);
}

#[test]
fn test_duplicate_rule_rejected() {
    let mut g = pairs();
    let before = g.primitives().len();
    let err = g
        .add_primitive(ValueType::Str, "(%s%s)", &[ValueType::Str, ValueType::Str], 2.0, |a| {
            Ok(a[0].clone())
        })
        .unwrap_err();
    assert_eq!(
        err,
        GrammarError::DuplicateRule {
            nt: 0,
            format: "(%s%s)".to_string()
        }
    );
    assert_eq!(g.primitives().len(), before);
    assert_eq!(g.count_rules(0), 2);

    let again = Rule::clone(g.get_rule_any("a").unwrap());
    assert!(matches!(g.add(again), Err(GrammarError::DuplicateRule { .. })));
    assert_eq!(g.compute_enumeration_order(&g.expand_from_integer(0, 2).unwrap()).unwrap(), 2);
}

// === Sampling ===

#[test]
fn test_make_node_lp() {
    let g = mixed();
    let x = Arc::clone(g.get_rule_any("x").unwrap());
    let n = g.make_node(&x);
    assert!((n.lp - (2.0f64 / 4.5).ln()).abs() < 1e-12);
}

#[test]
fn test_sample_rule_frequencies() {
    let g = pairs();
    let mut rng = StdRng::seed_from_u64(7);
    let n = 20_000;
    let terminals = (0..n)
        .filter(|_| g.sample_rule(0, &mut rng).unwrap().is_terminal())
        .count();
    let freq = terminals as f64 / n as f64;
    assert!((freq - 0.5).abs() < 0.02, "terminal frequency {}", freq);
}

#[test]
fn test_generate_complete_and_scored() {
    let g = mixed();
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..50 {
        let t = g.generate(g.start(), &mut rng).unwrap();
        assert!(t.is_complete());
        let lp: f64 = t.iter().map(|n| n.lp).sum();
        assert!((g.log_probability(&t) - lp).abs() < 1e-9);
    }
}

#[test]
fn test_generate_gives_up() {
    let mut g = Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str])
        .unwrap()
        .with_config(GrammarConfig {
            max_depth: 8,
            generate_retries: 3,
        });
    g.add_primitive(ValueType::Str, "f(%s)", &[ValueType::Str], 1.0, |a| Ok(a[0].clone()))
        .unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(
        g.generate(0, &mut rng).unwrap_err(),
        GrammarError::GenerationFailed { nt: 0, attempts: 3 }
    );
}

#[test]
fn test_sample_without_rules() {
    let g = Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str]).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(g.sample_rule(0, &mut rng).unwrap_err(), GrammarError::NoRules(0));
}

#[test]
fn test_copy_resample() {
    let g = mixed();
    let mut rng = StdRng::seed_from_u64(11);
    let t = g.simple_parse("cat(x,'a')").unwrap();
    let same = g.copy_resample(&t, &|_: &Node| false, &mut rng).unwrap();
    assert_eq!(same, t);

    // Only the second argument may change.
    for _ in 0..20 {
        let r = g
            .copy_resample(&t, &|n: &Node| n.rule().format() == "'a'", &mut rng)
            .unwrap();
        assert_eq!(r.rule().format(), "cat(%s,%s)");
        assert_eq!(r.child(0).unwrap().rule().format(), "x");
        assert!(r.is_complete());
    }
}

#[test]
fn test_log_probability_uses_current_weights() {
    let mut g = pairs();
    let t = g.simple_parse("a").unwrap();
    assert!((g.log_probability(&t) - 0.5f64.ln()).abs() < 1e-12);
    g.change_probability("a", 3.0).unwrap();
    assert!((g.log_probability(&t) - 0.75f64.ln()).abs() < 1e-12);
}

#[test]
fn test_get_counts() {
    let g = mixed();
    let t = g.simple_parse("if(not(flip()),x,cat(x,'a'))").unwrap();
    let counts = g.get_counts(&t).unwrap();
    // x, 'a', cat, if, flip, not
    assert_eq!(counts, vec![2, 1, 1, 1, 1, 1]);
    let both = g.get_counts_all([&t, &t]).unwrap();
    assert_eq!(both[0], 4);
}

// === Enumeration ===

#[test]
fn test_enumeration_first_trees() {
    let g = pairs();
    let shown: Vec<String> = (0..3)
        .map(|z| g.expand_from_integer(0, z).unwrap().to_string())
        .collect();
    assert_eq!(shown, vec!["a", "(aa)", "(a(aa))"]);
}

#[test]
fn test_enumeration_inverse() {
    let g = mixed();
    for z in 0..300 {
        let t = g.expand_from_integer(g.start(), z).unwrap();
        assert!(t.is_complete());
        assert_eq!(g.compute_enumeration_order(&t).unwrap(), z, "tree {}", t);
    }
}

#[test]
fn test_enumeration_distinct() {
    let g = pairs();
    let mut seen = std::collections::HashSet::new();
    for t in g.enumerate(0).take(200) {
        assert!(seen.insert(t.unwrap().to_string()));
    }
}

#[test]
fn test_enumeration_without_nonterminal_rules() {
    let mut g = Grammar::new(ValueType::Str, ValueType::Str, &[ValueType::Str]).unwrap();
    g.add_terminal("a", "a", 1.0).unwrap();
    assert!(g.expand_from_integer(0, 0).is_ok());
    assert!(matches!(
        g.expand_from_integer(0, 1),
        Err(GrammarError::Enumeration(_))
    ));
}

#[test]
fn test_enumeration_rejects_gaps() {
    let g = pairs();
    assert_eq!(
        g.compute_enumeration_order(&Node::null()).unwrap_err(),
        GrammarError::IncompleteTree
    );
}

// === Search ===

#[test]
fn test_neighbors_of_partial_tree() {
    let g = mixed();
    let s = g.start();
    let root = Node::null();
    assert_eq!(g.neighbors(s, &root), 4);

    let cat = g.make_neighbor(s, &root, 2).unwrap();
    assert_eq!(cat.rule().format(), "cat(%s,%s)");
    assert_eq!(g.neighbors(s, &cat), 4);

    let iff = g.make_neighbor(s, &root, 3).unwrap();
    // first gap is the Bool condition
    assert_eq!(g.neighbors(s, &iff), 2);
    let p = g.neighbor_prior(s, &iff, 1).unwrap();
    assert!((p - 0.5f64.ln()).abs() < 1e-12);
}

#[test]
fn test_expand_to_neighbor_fills_first_gap() {
    let g = mixed();
    let s = g.start();
    let mut t = g.make_neighbor(s, &Node::null(), 2).unwrap();
    g.expand_to_neighbor(s, &mut t, 0).unwrap();
    g.expand_to_neighbor(s, &mut t, 1).unwrap();
    assert!(t.is_complete());
    assert_eq!(t.to_string(), "cat(x,'a')");
    assert_eq!(g.neighbors(s, &t), 0);
    assert_eq!(g.expand_to_neighbor(s, &mut t, 0).unwrap_err(), GrammarError::NoGap);
}

#[test]
fn test_expand_to_neighbor_out_of_range() {
    let g = mixed();
    let mut t = Node::null();
    assert_eq!(
        g.expand_to_neighbor(g.start(), &mut t, 9).unwrap_err(),
        GrammarError::NeighborOutOfRange { which: 9, count: 4 }
    );
}

#[test]
fn test_copy_and_complete_freezes() {
    let g = mixed();
    let s = g.start();
    let mut rng = StdRng::seed_from_u64(5);
    let partial = g.make_neighbor(s, &Node::null(), 2).unwrap();
    let done = g.copy_and_complete(s, &partial, &mut rng).unwrap();
    assert!(done.is_complete());
    assert!(!done.can_resample);
    assert!(done.child(0).unwrap().can_resample);
    assert!(done.to_string().starts_with(crate::node::FROZEN_MARK));
    assert!(!partial.is_complete());
}

// === Parsing ===

#[test]
fn test_parseable_round_trip() {
    let g = mixed();
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..30 {
        let t = g.generate(g.start(), &mut rng).unwrap();
        assert_eq!(g.from_parseable(&t.parseable()).unwrap(), t);
    }
}

#[test]
fn test_parseable_with_gap() {
    let g = mixed();
    let t = g.make_neighbor(g.start(), &Node::null(), 2).unwrap();
    let back = g.from_parseable(&t.parseable()).unwrap();
    assert_eq!(back, t);
    assert_eq!(back.count_nulls(), 2);
}

#[test]
fn test_parseable_errors() {
    let g = mixed();
    assert!(matches!(g.from_parseable("0:cat"), Err(GrammarError::Parse(_))));
    assert!(matches!(g.from_parseable("0:x;0:x"), Err(GrammarError::Parse(_))));
    assert!(matches!(g.from_parseable("q:x"), Err(GrammarError::Parse(_))));
    assert!(matches!(
        g.from_parseable("0:cat;1:flip;0:x"),
        Err(GrammarError::ParseTypeMismatch { index: 0, .. })
    ));
}

#[test]
fn test_simple_parse() {
    let g = mixed();
    let t = g.simple_parse("\u{03BB}x. if(not(flip()),x,cat(x,'a'))").unwrap();
    assert_eq!(t.to_string(), "if(not(flip()),x,cat(x,'a'))");
    assert!(t.is_complete());
    assert!(matches!(g.simple_parse("cat(x,'a'"), Err(GrammarError::Parse(_))));
    assert!(matches!(
        g.simple_parse("cat(flip(),x)"),
        Err(GrammarError::ParseTypeMismatch { index: 0, .. })
    ));
}

#[test]
fn test_display_lists_rules() {
    let g = pairs();
    let shown = g.to_string();
    assert!(shown.contains("a"));
    assert_eq!(shown.lines().count(), 3);
}
