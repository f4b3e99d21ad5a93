use std::collections::HashSet;
use std::str::Chars;

use itertools::{multipeek, MultiPeek};

use crate::error_handling::Location;
use crate::rules::{Token, TokenKind};

// Everything produced by one pass over a rule file. The keyword and
// symbol sets are lexical aggregates: they cover every literal in the
// text, reachable from a valid rule or not.
pub struct Scan {
    pub tokens: Vec<Token>,
    pub key_set: HashSet<String>,
    pub symbol_set: HashSet<String>,
}

fn is_symbol(c: char) -> bool {
    matches!(c, '=' | '@' | '#' | ':' | '*' | '?' | '+' | '|' | ';' | '(' | ')')
}

// Escapes shared by all three quoted forms. Anything unrecognized
// degrades to the escaped character itself, which also covers the
// delimiter and the backslash.
fn resolve_escape(c: char) -> char {
    match c {
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0C',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0B',
        _ => c,
    }
}

struct Lexer<'a> {
    chars: MultiPeek<Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { chars: multipeek(text.chars()), line: 0, col: 0 }
    }

    fn here(&self) -> Location {
        Location { line: self.line, col: self.col }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.reset_peek();
        self.chars.peek().copied()
    }

    fn peek2(&mut self) -> Option<char> {
        self.chars.reset_peek();
        self.chars.peek();
        self.chars.peek().copied()
    }

    // Scans past the opening delimiter through the closing one, decoding
    // escapes. A literal still open at end-of-input closes implicitly.
    fn lex_quoted(&mut self, kind: TokenKind, close: char, location: Location) -> Token {
        self.bump();
        let mut value = String::new();

        loop {
            match self.bump() {
                None => break,
                Some('\\') => match self.bump() {
                    None => {
                        value.push('\\');
                        break;
                    }
                    Some(escaped) => value.push(resolve_escape(escaped)),
                },
                Some(c) if c == close => break,
                Some(c) => value.push(c),
            }
        }

        Token { kind, value, location }
    }

    // Captures everything after `//` up to the line break, which is
    // consumed but not kept. A `\r` not followed by `\n` is content.
    fn lex_line_comment(&mut self, location: Location) -> Token {
        self.bump();
        self.bump();
        let mut value = String::new();

        loop {
            match self.peek() {
                None => break,
                Some('\n') => {
                    self.bump();
                    break;
                }
                Some('\r') if self.peek2() == Some('\n') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }

        Token { kind: TokenKind::LineComment, value, location }
    }

    fn lex_block_comment(&mut self, location: Location) -> Token {
        self.bump();
        self.bump();
        let mut value = String::new();

        loop {
            match self.bump() {
                None => break,
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    break;
                }
                Some(c) => value.push(c),
            }
        }

        Token { kind: TokenKind::BlockComment, value, location }
    }

    // A bare run of characters; the allowed character set is checked at
    // parse time, not here
    fn lex_identifier(&mut self, location: Location) -> Token {
        let mut value = String::new();

        loop {
            match self.peek() {
                None => break,
                Some('/') if matches!(self.peek2(), Some('/' | '*')) => break,
                Some(c) if matches!(c, ' ' | '\t' | '\r' | '\n' | '\'' | '<' | '"') || is_symbol(c) => break,
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }

        Token { kind: TokenKind::Identifier, value, location }
    }
}

// Total over the input: malformed literals and comments are closed
// implicitly at end-of-input instead of reported
pub fn tokenize(text: &str) -> Scan {
    let mut lexer = Lexer::new(text);
    let mut tokens = Vec::new();
    let mut key_set = HashSet::new();
    let mut symbol_set = HashSet::new();

    while let Some(c) = lexer.peek() {
        let location = lexer.here();

        if matches!(c, ' ' | '\t' | '\r' | '\n') {
            lexer.bump();
        } else if c == '\'' {
            let token = lexer.lex_quoted(TokenKind::StringLiteral, '\'', location);
            symbol_set.insert(token.value.clone());
            tokens.push(token);
        } else if c == '<' {
            let token = lexer.lex_quoted(TokenKind::KeywordLiteral, '>', location);
            key_set.insert(token.value.clone());
            tokens.push(token);
        } else if c == '"' {
            tokens.push(lexer.lex_quoted(TokenKind::PredictionPattern, '"', location));
        } else if c == '/' && lexer.peek2() == Some('/') {
            tokens.push(lexer.lex_line_comment(location));
        } else if c == '/' && lexer.peek2() == Some('*') {
            tokens.push(lexer.lex_block_comment(location));
        } else if is_symbol(c) {
            lexer.bump();
            tokens.push(Token { kind: TokenKind::Symbol, value: c.to_string(), location });
        } else {
            tokens.push(lexer.lex_identifier(location));
        }
    }

    return Scan { tokens, key_set, symbol_set };
}
