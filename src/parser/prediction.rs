/*
    This module computes, for every rule, the set of tokens that can
    begin a match of its body, so a caller holding several candidate
    rules can choose without backtracking
*/

use std::collections::{BTreeSet, HashMap};

use crate::rules::{Alternative, Atom, AtomKind, Matcher, Node, Rule, TokenKind};

// Fixpoint iteration over the rule reference graph. Rules may refer to
// each other in cycles; the sets only ever grow and are bounded by the
// literals in the file, so the iteration terminates. Never fails: an
// empty resulting set is a legal, if weak, predictor.
pub fn analyze(rules: &mut HashMap<String, Rule>) {
    let mut names: Vec<String> = rules.keys().cloned().collect();
    names.sort();

    let mut sets: HashMap<String, BTreeSet<Matcher>> = names
        .iter()
        .map(|name| (name.clone(), BTreeSet::new()))
        .collect();

    loop {
        let mut changed = false;
        for name in &names {
            let Some(rule) = rules.get(name) else { continue };
            let computed = node_first_set(&rule.body, &sets);
            if sets.get(name) != Some(&computed) {
                sets.insert(name.clone(), computed);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for (name, rule) in rules.iter_mut() {
        if let Some(set) = sets.remove(name) {
            rule.next_tokens = set;
        }
    }
}

fn node_first_set(node: &Node, sets: &HashMap<String, BTreeSet<Matcher>>) -> BTreeSet<Matcher> {
    node.alternatives
        .iter()
        .flat_map(|alternative| alternative_first_set(alternative, sets))
        .collect()
}

// Atoms contribute in sequence order up to and including the first one
// that must consume something
fn alternative_first_set(
    alternative: &Alternative,
    sets: &HashMap<String, BTreeSet<Matcher>>,
) -> BTreeSet<Matcher> {
    let mut first = BTreeSet::new();
    for atom in alternative {
        first.extend(atom_first_set(atom, sets));
        if !atom.is_nullable() {
            break;
        }
    }
    first
}

fn atom_first_set(atom: &Atom, sets: &HashMap<String, BTreeSet<Matcher>>) -> BTreeSet<Matcher> {
    match &atom.kind {
        AtomKind::Group(node) => node_first_set(node, sets),
        AtomKind::Leaf(token) => match token.kind {
            TokenKind::StringLiteral => BTreeSet::from([Matcher::Literal(token.value.clone())]),
            TokenKind::KeywordLiteral => BTreeSet::from([Matcher::Keyword(token.value.clone())]),
            TokenKind::PredictionPattern => BTreeSet::from([Matcher::Pattern(token.value.clone())]),
            // References to rules that are never defined predict nothing
            TokenKind::Identifier => sets.get(&token.value).cloned().unwrap_or_default(),
            _ => BTreeSet::new(),
        },
    }
}
