/*
    rulebook compiles ABNF-style rule files into a queryable rule model:
    every production by name, with the set of tokens that can begin a
    match of it, plus the file's keyword and symbol literal sets
*/

pub mod error_handling;
pub mod parser;
pub mod rules;

pub use parser::ParseError;
pub use rules::RuleSet;
