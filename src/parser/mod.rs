/*
    This module parses rule files into the rule model
*/

pub mod lexer;
pub mod prediction;

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error_handling::{Error, ErrorType, Location};
use crate::rules::{Alternative, Atom, Node, Repeat, Rule, Token, TokenKind};

// Rule names and identifier references share one shape
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[_a-zA-Z][_a-zA-Z0-9]*$").unwrap());

#[derive(Debug, PartialEq)]
pub enum ParseErrorType {
    // The token stream ran out in the middle of a rule
    IncompleteRule,
    // The token at a rule's defining position is not an identifier
    ExpectedRuleName(String),
    // An identifier that does not fit the name shape
    InvalidName(String),
    // A rule name defined twice; names are global
    DuplicateRule(String),
    // `:` not followed by a prediction pattern
    ExpectedPattern(String),
    ExpectedEquals(String),
    ExpectedSemicolon(String),
    // `(` with no matching `)` before the rule ended
    UnclosedGroup,
    // A rule body with no content at all
    EmptyRule(String),
    // A parenthesized group with no content at all
    EmptyGroup,
    // A repeat, pin, not-key, or alternation operator with nothing on
    // its left to apply to
    MissingOperand(char),
    // A second repetition operator on the same atom
    RepeatRedefined(char),
    PinRedefined,
    NotKeyRedefined,
    // An alternation bar with no atom on its right
    EmptyAlternative,
    // A symbol the node grammar has no use for at this position
    UnexpectedSymbol(String),
}

impl ErrorType for ParseErrorType {}

impl Display for ParseErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorType::IncompleteRule => write!(f, "The last rule is incomplete"),
            ParseErrorType::ExpectedRuleName(found) => write!(f, "Expected a rule name but got `{}`", found),
            ParseErrorType::InvalidName(found) => write!(f, "Name `{}` must start with a letter or underscore and contain only letters, digits, and underscores", found),
            ParseErrorType::DuplicateRule(name) => write!(f, "Duplicate definition of rule name `{}`", name),
            ParseErrorType::ExpectedPattern(found) => write!(f, "Expected a prediction pattern after `:` but got `{}`", found),
            ParseErrorType::ExpectedEquals(found) => write!(f, "Expected `=` but got `{}`", found),
            ParseErrorType::ExpectedSemicolon(found) => write!(f, "Expected `;` but got `{}`", found),
            ParseErrorType::UnclosedGroup => write!(f, "Expected `)` before the end of the rule"),
            ParseErrorType::EmptyRule(name) => write!(f, "Rule `{}` has no content", name),
            ParseErrorType::EmptyGroup => write!(f, "Group has no content"),
            ParseErrorType::MissingOperand(op) => write!(f, "Nothing on the left of `{}`", op),
            ParseErrorType::RepeatRedefined(op) => write!(f, "`{}` applied to an atom that already has a repetition", op),
            ParseErrorType::PinRedefined => write!(f, "`@` applied to an atom that is already pinned"),
            ParseErrorType::NotKeyRedefined => write!(f, "`#` applied to an atom that is already excluded"),
            ParseErrorType::EmptyAlternative => write!(f, "Nothing on the right of `|`"),
            ParseErrorType::UnexpectedSymbol(found) => write!(f, "Unsupported symbol `{}`", found),
        }
    }
}

pub type ParseError = Error<ParseErrorType>;
pub type Result<T> = std::result::Result<T, ParseError>;

fn parse_error<T>(location: Location, error: ParseErrorType) -> Result<T> {
    Err(Error { location, error })
}

// Consumes the whole token sequence, one rule at a time. The first
// structural error aborts; no partial rule map escapes.
pub fn parse_rules(tokens: &[Token]) -> Result<HashMap<String, Rule>> {
    let mut parser = Parser::new(tokens);
    let mut rules = HashMap::new();

    loop {
        parser.skip_comments();
        if parser.peek().is_none() {
            break;
        }

        let rule = parser.parse_rule()?;
        if rules.contains_key(&rule.name) {
            return parse_error(rule.location, ParseErrorType::DuplicateRule(rule.name));
        }
        rules.insert(rule.name.clone(), rule);
    }

    return Ok(rules);
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    // Location of the current token, or of the last one once the stream
    // has run out
    fn here(&self) -> Location {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(Location::default(), |token| token.location)
    }

    fn peek_symbol(&self, value: &str) -> bool {
        matches!(self.peek(), Some(token) if token.kind == TokenKind::Symbol && token.value == value)
    }

    fn skip_comments(&mut self) {
        while matches!(
            self.peek(),
            Some(token) if matches!(token.kind, TokenKind::LineComment | TokenKind::BlockComment)
        ) {
            self.pos += 1;
        }
    }

    fn peek_past_comments(&self) -> Option<&'a Token> {
        self.tokens[self.pos..]
            .iter()
            .find(|token| !matches!(token.kind, TokenKind::LineComment | TokenKind::BlockComment))
    }

    // rule := Identifier (':' PredictionPattern '@'?)? '=' node ';'
    fn parse_rule(&mut self) -> Result<Rule> {
        let Some(name_token) = self.bump() else {
            return parse_error(self.here(), ParseErrorType::IncompleteRule);
        };
        if name_token.kind != TokenKind::Identifier {
            return parse_error(
                name_token.location,
                ParseErrorType::ExpectedRuleName(name_token.value.clone()),
            );
        }
        if !NAME_PATTERN.is_match(&name_token.value) {
            return parse_error(
                name_token.location,
                ParseErrorType::InvalidName(name_token.value.clone()),
            );
        }

        let mut prediction = None;
        let mut prediction_pin = false;
        if self.peek_symbol(":") {
            self.pos += 1;
            let Some(pattern) = self.bump() else {
                return parse_error(self.here(), ParseErrorType::IncompleteRule);
            };
            if pattern.kind != TokenKind::PredictionPattern {
                return parse_error(
                    pattern.location,
                    ParseErrorType::ExpectedPattern(pattern.value.clone()),
                );
            }
            prediction = Some(pattern.clone());

            if self.peek_symbol("@") {
                self.pos += 1;
                prediction_pin = true;
            }
        }

        match self.bump() {
            None => return parse_error(self.here(), ParseErrorType::IncompleteRule),
            Some(token) if token.kind != TokenKind::Symbol || token.value != "=" => {
                return parse_error(
                    token.location,
                    ParseErrorType::ExpectedEquals(token.value.clone()),
                );
            }
            Some(_) => {}
        }

        let body = self.parse_node()?;
        if body.alternatives.is_empty() {
            return parse_error(
                name_token.location,
                ParseErrorType::EmptyRule(name_token.value.clone()),
            );
        }

        match self.bump() {
            None => return parse_error(self.here(), ParseErrorType::IncompleteRule),
            Some(token) if token.kind != TokenKind::Symbol || token.value != ";" => {
                return parse_error(
                    token.location,
                    ParseErrorType::ExpectedSemicolon(token.value.clone()),
                );
            }
            Some(_) => {}
        }

        Ok(Rule {
            name: name_token.value.clone(),
            prediction,
            prediction_pin,
            body,
            next_tokens: BTreeSet::new(),
            location: name_token.location,
        })
    }

    // node := alt ('|' alt)*
    // Stops in front of `;`, `)`, or the end of the stream, which the
    // caller deals with.
    fn parse_node(&mut self) -> Result<Node> {
        let mut alternatives: Vec<Alternative> = Vec::new();

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::LineComment | TokenKind::BlockComment => {
                    self.pos += 1;
                }
                TokenKind::Identifier => {
                    if !NAME_PATTERN.is_match(&token.value) {
                        return parse_error(
                            token.location,
                            ParseErrorType::InvalidName(token.value.clone()),
                        );
                    }
                    push_atom(&mut alternatives, Atom::leaf(token.clone()));
                    self.pos += 1;
                }
                TokenKind::StringLiteral
                | TokenKind::KeywordLiteral
                | TokenKind::PredictionPattern => {
                    push_atom(&mut alternatives, Atom::leaf(token.clone()));
                    self.pos += 1;
                }
                TokenKind::Symbol => match token.value.as_str() {
                    "(" => {
                        let open = token.location;
                        self.pos += 1;
                        let inner = self.parse_node()?;
                        if !self.peek_symbol(")") {
                            return parse_error(open, ParseErrorType::UnclosedGroup);
                        }
                        self.pos += 1;
                        if inner.alternatives.is_empty() {
                            return parse_error(open, ParseErrorType::EmptyGroup);
                        }
                        push_atom(&mut alternatives, Atom::group(inner));
                    }
                    "*" => {
                        apply_repeat(&mut alternatives, Repeat::ZeroOrMore, '*', token.location)?;
                        self.pos += 1;
                    }
                    "+" => {
                        apply_repeat(&mut alternatives, Repeat::AtLeastOne, '+', token.location)?;
                        self.pos += 1;
                    }
                    "?" => {
                        apply_repeat(&mut alternatives, Repeat::ZeroOrOne, '?', token.location)?;
                        self.pos += 1;
                    }
                    "@" => {
                        let atom = modifier_target(&mut alternatives, '@', token.location)?;
                        if atom.pin {
                            return parse_error(token.location, ParseErrorType::PinRedefined);
                        }
                        atom.pin = true;
                        self.pos += 1;
                    }
                    "#" => {
                        let atom = modifier_target(&mut alternatives, '#', token.location)?;
                        if atom.not_key {
                            return parse_error(token.location, ParseErrorType::NotKeyRedefined);
                        }
                        atom.not_key = true;
                        self.pos += 1;
                    }
                    "|" => {
                        if alternatives.last().map_or(true, |alternative| alternative.is_empty()) {
                            return parse_error(
                                token.location,
                                ParseErrorType::MissingOperand('|'),
                            );
                        }
                        self.pos += 1;

                        // The bar needs an atom on its right, not an
                        // immediate terminator
                        match self.peek_past_comments() {
                            Some(next)
                                if next.kind != TokenKind::Symbol
                                    || (next.value != ";" && next.value != ")") =>
                            {
                                alternatives.push(Vec::new());
                            }
                            _ => {
                                return parse_error(
                                    token.location,
                                    ParseErrorType::EmptyAlternative,
                                );
                            }
                        }
                    }
                    ";" | ")" => break,
                    _ => {
                        return parse_error(
                            token.location,
                            ParseErrorType::UnexpectedSymbol(token.value.clone()),
                        );
                    }
                },
            }
        }

        Ok(Node { alternatives })
    }
}

fn push_atom(alternatives: &mut Vec<Alternative>, atom: Atom) {
    match alternatives.last_mut() {
        Some(alternative) => alternative.push(atom),
        None => alternatives.push(vec![atom]),
    }
}

// The atom a trailing modifier applies to: the most recent one in the
// most recent alternative
fn modifier_target<'b>(
    alternatives: &'b mut [Alternative],
    op: char,
    location: Location,
) -> Result<&'b mut Atom> {
    match alternatives.last_mut().and_then(|alternative| alternative.last_mut()) {
        Some(atom) => Ok(atom),
        None => parse_error(location, ParseErrorType::MissingOperand(op)),
    }
}

fn apply_repeat(
    alternatives: &mut [Alternative],
    repeat: Repeat,
    op: char,
    location: Location,
) -> Result<()> {
    let atom = modifier_target(alternatives, op, location)?;
    if atom.repeat != Repeat::None {
        return parse_error(location, ParseErrorType::RepeatRedefined(op));
    }
    atom.repeat = repeat;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rules::AtomKind;

    fn parse_text(text: &str) -> Result<HashMap<String, Rule>> {
        parse_rules(&lexer::tokenize(text).tokens)
    }

    fn leaf_value(atom: &Atom) -> &str {
        match &atom.kind {
            AtomKind::Leaf(token) => &token.value,
            AtomKind::Group(_) => panic!("expected a leaf"),
        }
    }

    #[test]
    fn parse_two_literal_sequence() {
        let rules = parse_text("r = 'a' 'b';").unwrap();
        let rule = &rules["r"];

        assert_eq!(rule.body.alternatives.len(), 1);
        let alternative = &rule.body.alternatives[0];
        assert_eq!(alternative.len(), 2);
        assert_eq!(leaf_value(&alternative[0]), "a");
        assert_eq!(leaf_value(&alternative[1]), "b");
        assert_eq!(alternative[0].repeat, Repeat::None);
        assert_eq!(alternative[1].repeat, Repeat::None);
    }

    #[test]
    fn parse_alternation_in_order() {
        let rules = parse_text("a = 'x' | 'y' | 'z';").unwrap();
        let body = &rules["a"].body;

        assert!(body.alternatives.iter().all(|alternative| alternative.len() == 1));
        let values: Vec<&str> = body
            .alternatives
            .iter()
            .map(|alternative| leaf_value(&alternative[0]))
            .collect();
        assert_eq!(values, vec!["x", "y", "z"]);
    }

    #[test]
    fn parse_group_with_repeat() {
        let rules = parse_text("a = ('x' 'y')+;").unwrap();
        let alternative = &rules["a"].body.alternatives[0];

        assert_eq!(alternative.len(), 1);
        assert_eq!(alternative[0].repeat, Repeat::AtLeastOne);
        let AtomKind::Group(inner) = &alternative[0].kind else {
            panic!("expected a group");
        };
        assert_eq!(inner.alternatives.len(), 1);
        assert_eq!(inner.alternatives[0].len(), 2);
    }

    #[test]
    fn parse_modifiers() {
        let rules = parse_text("a = 'x'* 'y'+ 'z'? ref@ 'k'#;").unwrap();
        let alternative = &rules["a"].body.alternatives[0];

        assert_eq!(alternative[0].repeat, Repeat::ZeroOrMore);
        assert_eq!(alternative[1].repeat, Repeat::AtLeastOne);
        assert_eq!(alternative[2].repeat, Repeat::ZeroOrOne);
        assert!(alternative[3].pin);
        assert!(alternative[4].not_key);
    }

    #[test]
    fn parse_all_modifier_classes_on_one_atom() {
        let rules = parse_text("a = 'x'*@#;").unwrap();
        let atom = &rules["a"].body.alternatives[0][0];

        assert_eq!(atom.repeat, Repeat::ZeroOrMore);
        assert!(atom.pin);
        assert!(atom.not_key);
    }

    #[test]
    fn parse_prediction() {
        let rules = parse_text("a : \"pat\" @ = 'x'; b : \"q\" = 'y'; c = 'z';").unwrap();

        let a = &rules["a"];
        assert_eq!(a.prediction.as_ref().unwrap().value, "pat");
        assert!(a.prediction_pin);

        let b = &rules["b"];
        assert_eq!(b.prediction.as_ref().unwrap().value, "q");
        assert!(!b.prediction_pin);

        let c = &rules["c"];
        assert_eq!(c.prediction, None);
        assert!(!c.prediction_pin);
    }

    #[test]
    fn duplicate_rule_is_rejected() {
        let error = parse_text("a = 'x'; a = 'y';").unwrap_err();

        assert_eq!(error.error, ParseErrorType::DuplicateRule("a".to_string()));
        assert_eq!(error.location, Location { line: 0, col: 9 });
    }

    #[test]
    fn repeated_modifiers_are_rejected() {
        let texts = vec![
            "a = 'x'**;",
            "a = 'x'*+;",
            "a = 'x'+?;",
            "a = 'x'@@;",
            "a = 'x'##;",
        ];
        let answers = vec![
            ParseErrorType::RepeatRedefined('*'),
            ParseErrorType::RepeatRedefined('+'),
            ParseErrorType::RepeatRedefined('?'),
            ParseErrorType::PinRedefined,
            ParseErrorType::NotKeyRedefined,
        ];

        for (text, answer) in zip(texts, answers) {
            assert_eq!(parse_text(text).unwrap_err().error, answer);
        }
    }

    #[test]
    fn second_repeat_is_reported_at_its_own_position() {
        let error = parse_text("a = 'x'**;").unwrap_err();
        assert_eq!(error.location, Location { line: 0, col: 8 });
    }

    #[test]
    fn modifier_without_operand_is_rejected() {
        let texts = vec!["a = *;", "a = +;", "a = ?;", "a = @;", "a = #;", "a = | 'x';"];
        let answers = vec!['*', '+', '?', '@', '#', '|'];

        for (text, answer) in zip(texts, answers) {
            assert_eq!(
                parse_text(text).unwrap_err().error,
                ParseErrorType::MissingOperand(answer)
            );
        }
    }

    #[test]
    fn alternation_missing_right_side() {
        let texts = vec!["a = 'x' | ;", "a = 'x' |", "a = ('x' | );"];

        for text in texts {
            assert_eq!(
                parse_text(text).unwrap_err().error,
                ParseErrorType::EmptyAlternative
            );
        }

        // A comment between the bar and the next atom is fine
        let rules = parse_text("a = 'x' | /* c */ 'y';").unwrap();
        assert_eq!(rules["a"].body.alternatives.len(), 2);
    }

    #[test]
    fn structural_errors() {
        let texts = vec![
            "a = 'x'",
            "a",
            "a : = 'x';",
            "a 'x';",
            "a = ('x';",
            "a = ;",
            "a = ();",
            "9a = 'x';",
            "a = 9x;",
            "'x' = 'y';",
            "a = 'x' = ;",
        ];
        let answers = vec![
            ParseErrorType::IncompleteRule,
            ParseErrorType::IncompleteRule,
            ParseErrorType::ExpectedPattern("=".to_string()),
            ParseErrorType::ExpectedEquals("x".to_string()),
            ParseErrorType::UnclosedGroup,
            ParseErrorType::EmptyRule("a".to_string()),
            ParseErrorType::EmptyGroup,
            ParseErrorType::InvalidName("9a".to_string()),
            ParseErrorType::InvalidName("9x".to_string()),
            ParseErrorType::ExpectedRuleName("x".to_string()),
            ParseErrorType::UnexpectedSymbol("=".to_string()),
        ];

        for (text, answer) in zip(texts, answers) {
            assert_eq!(parse_text(text).unwrap_err().error, answer, "for {:?}", text);
        }
    }

    #[test]
    fn comments_are_skipped_between_rules() {
        let rules = parse_text("// header\na = 'x';\n/* note */ b = 'y';").unwrap();
        assert_eq!(rules.len(), 2);

        // Comment-only tails and files are not incomplete rules
        assert_eq!(parse_text("a = 'x'; // tail").unwrap().len(), 1);
        assert!(parse_text("// nothing here").unwrap().is_empty());
        assert!(parse_text("").unwrap().is_empty());
    }

    #[test]
    fn comments_are_skipped_inside_bodies() {
        let rules = parse_text("a = 'x' /* gap */ 'y';").unwrap();
        let alternative = &rules["a"].body.alternatives[0];

        assert_eq!(alternative.len(), 2);
        assert_eq!(leaf_value(&alternative[1]), "y");
    }

    #[test]
    fn stray_close_paren_is_not_a_rule_end() {
        let error = parse_text("a = 'x');").unwrap_err();
        assert_eq!(error.error, ParseErrorType::ExpectedSemicolon(")".to_string()));
    }

    #[test]
    fn modifier_after_group_applies_to_the_group() {
        let rules = parse_text("a = ('x')?@;").unwrap();
        let atom = &rules["a"].body.alternatives[0][0];

        assert!(matches!(atom.kind, AtomKind::Group(_)));
        assert_eq!(atom.repeat, Repeat::ZeroOrOne);
        assert!(atom.pin);
    }
}
