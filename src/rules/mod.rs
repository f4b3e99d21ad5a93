/*
    This module stores the rule model built from a rule file
*/

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Display;

use crate::error_handling::Location;
use crate::parser::{self, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    StringLiteral,
    KeywordLiteral,
    PredictionPattern,
    Symbol,
    LineComment,
    BlockComment,
}

// One lexical unit of a rule file; the value holds decoded text, with
// escape sequences already resolved for the literal kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    None,
    ZeroOrMore,
    AtLeastOne,
    ZeroOrOne,
}

// The base unit in a rule body: a leaf reference or a parenthesized
// group, plus its annotations
#[derive(Debug, PartialEq)]
pub struct Atom {
    pub kind: AtomKind,
    pub repeat: Repeat,
    pub pin: bool,
    pub not_key: bool,
}

#[derive(Debug, PartialEq)]
pub enum AtomKind {
    Leaf(Token),
    Group(Node),
}

impl Atom {
    pub fn leaf(token: Token) -> Self {
        Atom {
            kind: AtomKind::Leaf(token),
            repeat: Repeat::None,
            pin: false,
            not_key: false,
        }
    }

    pub fn group(node: Node) -> Self {
        Atom {
            kind: AtomKind::Group(node),
            repeat: Repeat::None,
            pin: false,
            not_key: false,
        }
    }

    // An atom that may match nothing never constrains the next token
    pub fn is_nullable(&self) -> bool {
        matches!(self.repeat, Repeat::ZeroOrMore | Repeat::ZeroOrOne)
    }
}

// The atoms in a single alternative
pub type Alternative = Vec<Atom>;

// An alternation of sequences of atoms; alternatives keep their textual
// order, which is the priority order tried when matching
#[derive(Debug, PartialEq, Default)]
pub struct Node {
    pub alternatives: Vec<Alternative>,
}

// A leaf-level matcher that can begin a match of a rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Matcher {
    Literal(String),
    Keyword(String),
    Pattern(String),
}

impl Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::Literal(text) => write!(f, "'{}'", text),
            Matcher::Keyword(text) => write!(f, "<{}>", text),
            Matcher::Pattern(text) => write!(f, "\"{}\"", text),
        }
    }
}

// One named production
#[derive(Debug, PartialEq)]
pub struct Rule {
    pub name: String,
    pub prediction: Option<Token>,
    pub prediction_pin: bool,
    pub body: Node,
    pub next_tokens: BTreeSet<Matcher>,
    pub location: Location,
}

#[derive(Debug, PartialEq, Default)]
pub struct RuleSet {
    rules: HashMap<String, Rule>,
    key_set: HashSet<String>,
    symbol_set: HashSet<String>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet::default()
    }

    // Replaces the whole model with the rules in `text`. On failure the
    // set is left empty and the single diagnostic is returned.
    pub fn load(&mut self, text: &str) -> Result<(), ParseError> {
        self.clear();

        let scan = parser::lexer::tokenize(text);
        let mut rules = parser::parse_rules(&scan.tokens)?;
        parser::prediction::analyze(&mut rules);

        self.rules = rules;
        self.key_set = scan.key_set;
        self.symbol_set = scan.symbol_set;

        return Ok(());
    }

    pub fn find_rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn rules(&self) -> &HashMap<String, Rule> {
        &self.rules
    }

    // All distinct `<...>` literal texts seen by the last successful load
    pub fn key_set(&self) -> &HashSet<String> {
        &self.key_set
    }

    // All distinct `'...'` literal texts seen by the last successful load
    pub fn symbol_set(&self) -> &HashSet<String> {
        &self.symbol_set
    }

    pub fn clear(&mut self) {
        self.rules.clear();
        self.key_set.clear();
        self.symbol_set.clear();
    }
}
