//! A tokenizer generator driven by an ordered list of regexp rules.
//!
//! [`make_tokenizer`] compiles a list of [`TokenSpec`] rules into a
//! [`Tokenizer`]. Tokenizing scans the input left to right; at every offset
//! the rules are tried in the given order and the first one whose pattern
//! matches at that offset wins, so rule order encodes priority (a `float`
//! rule listed before `int` takes `3.14` whole instead of stopping at `3`).
//! Tokens carry exact 1-origin line/column positions.
//!
//! The tokenizer itself drops nothing except rules explicitly marked
//! [`TokenSpec::useless`]; anything else the grammar does not care about
//! must be filtered by the caller before parsing.

use std::fmt;

use regex::Regex;
use thiserror::Error;

/// A source location: 1-origin line and column, counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.line, self.column)
    }
}

/// A lexical token.
///
/// `start` points at the first character of the token and `end` at the last
/// one (inclusive). Both are `None` for synthetic tokens built with
/// [`Token::new`]. Equality compares `(kind, value)` only; positions are
/// metadata and never influence matching.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: String,
    pub value: String,
    pub start: Option<Position>,
    pub end: Option<Position>,
}

impl Token {
    /// Creates a token without position information.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            start: None,
            end: None,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.value == other.value
    }
}

impl Eq for Token {}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => {
                write!(f, "{}-{}: {} '{}'", start, end, self.kind, self.value)
            }
            _ => write!(f, "{} '{}'", self.kind, self.value),
        }
    }
}

/// Raised when no rule matches the input, carrying the exact position and
/// the text of the offending line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot tokenize data: {place}: {message:?}")]
pub struct LexerError {
    pub place: Position,
    pub message: String,
}

/// A single tokenizer rule: a name, a regexp pattern and a `useful` flag.
///
/// Rules marked useless still match and advance the cursor but produce no
/// token, which is the cheap way to drop whitespace and comments without a
/// downstream filter.
#[derive(Debug, Clone)]
pub struct TokenSpec {
    pub name: String,
    pub pattern: String,
    pub useful: bool,
}

impl TokenSpec {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            useful: true,
        }
    }

    /// Marks the rule as consuming input without emitting a token.
    pub fn useless(mut self) -> Self {
        self.useful = false;
        self
    }
}

impl From<(&str, &str)> for TokenSpec {
    fn from((name, pattern): (&str, &str)) -> Self {
        TokenSpec::new(name, pattern)
    }
}

struct CompiledSpec {
    name: String,
    useful: bool,
    re: Regex,
}

/// A compiled rule list, ready to tokenize any number of inputs.
pub struct Tokenizer {
    specs: Vec<CompiledSpec>,
}

/// Compiles `specs` into a [`Tokenizer`].
///
/// Patterns are anchored at the current offset, so `^`-style anchoring must
/// not be written into the rules themselves. An invalid pattern is a
/// programmer error and surfaces as the regex crate's own error.
pub fn make_tokenizer<S, T>(specs: S) -> Result<Tokenizer, regex::Error>
where
    S: IntoIterator<Item = T>,
    T: Into<TokenSpec>,
{
    let mut compiled = Vec::new();
    for spec in specs {
        let spec = spec.into();
        let re = Regex::new(&format!(r"\A(?:{})", spec.pattern))?;
        compiled.push(CompiledSpec {
            name: spec.name,
            useful: spec.useful,
            re,
        });
    }
    Ok(Tokenizer { specs: compiled })
}

impl Tokenizer {
    /// Returns a lazy token stream over `text`.
    ///
    /// The iterator yields `Err` at the first offset no rule matches and is
    /// fused afterwards. It simply ends at the end of input; end-of-input
    /// checks belong to the parser (`finished`).
    pub fn tokenize<'a>(&'a self, text: &'a str) -> Tokens<'a> {
        Tokens {
            specs: &self.specs,
            text,
            offset: 0,
            line: 1,
            col: 0,
            done: false,
        }
    }
}

/// Iterator over the tokens of one input.
pub struct Tokens<'a> {
    specs: &'a [CompiledSpec],
    text: &'a str,
    offset: usize,
    line: usize,
    /// Characters already consumed on the current line.
    col: usize,
    done: bool,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<Token, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.offset >= self.text.len() {
                return None;
            }
            let rest = &self.text[self.offset..];
            let hit = self
                .specs
                .iter()
                .find_map(|spec| spec.re.find(rest).map(|m| (spec, m)));
            let Some((spec, m)) = hit else {
                self.done = true;
                let errline = self
                    .text
                    .lines()
                    .nth(self.line - 1)
                    .unwrap_or_default()
                    .to_string();
                return Some(Err(LexerError {
                    place: Position::new(self.line, self.col + 1),
                    message: errline,
                }));
            };
            let value = m.as_str();
            if value.is_empty() {
                self.done = true;
                return Some(Err(LexerError {
                    place: Position::new(self.line, self.col + 1),
                    message: format!("rule '{}' matched an empty string", spec.name),
                }));
            }
            let start = Position::new(self.line, self.col + 1);
            let newlines = value.matches('\n').count();
            let end_col = if newlines == 0 {
                self.col + value.chars().count()
            } else {
                value.chars().rev().take_while(|&c| c != '\n').count()
            };
            let end = Position::new(self.line + newlines, end_col);
            self.line = end.line;
            self.col = end_col;
            self.offset += value.len();
            if spec.useful {
                return Some(Ok(Token {
                    kind: spec.name.clone(),
                    value: value.to_string(),
                    start: Some(start),
                    end: Some(end),
                }));
            }
        }
    }
}
