//! Parser combinators over token sequences.
//!
//! A [`Parser`] is a value; grammars are built by combining parsers with
//! operators and the free functions of this module, then run with
//! [`Parser::parse`]. See the crate docs for the operator glossary.

mod combinators;
mod state;

pub use combinators::{
    a, any, finished, forward_decl, many, maybe, oneplus, pure, skip, some, tok, tok_value,
    Parser, Seq, Skip,
};

use std::fmt;

use thiserror::Error;

use state::{FailKind, NoParse, ParseState};

/// A failed parse, pointing at the furthest token any branch reached.
///
/// The rendered message is stable:
///
/// * `got unexpected token: <token>, expected: <name> or <name> or ...`
/// * `got unexpected end of input, expected: ...`
/// * `should have reached <EOF>: <token>` when `finished` saw leftovers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ParserError {
    message: String,
    /// Token index the failing parser was at when it gave up.
    pub pos: usize,
    /// Furthest token index any branch reached during the run.
    pub max: usize,
    /// Names of the parsers that were tried and failed at `max`.
    pub expected: Vec<String>,
    /// Rendering of the token at `max`, if the input was that long.
    pub found: Option<String>,
}

impl ParserError {
    pub(crate) fn from_failure<I: fmt::Display>(
        failure: NoParse,
        tokens: &[I],
        state: ParseState,
    ) -> Self {
        let found = tokens.get(state.max).map(|t| t.to_string());
        let expected = state.expected;
        let list = expected.join(" or ");
        let message = match failure.kind {
            FailKind::EofExpected => format!(
                "should have reached <EOF>: {}",
                found.as_deref().unwrap_or("<EOF>")
            ),
            FailKind::Unexpected => {
                // Whatever raised this kind reported its name first, so the
                // expectation list is never empty here.
                debug_assert!(!expected.is_empty());
                match &found {
                    Some(token) => format!("got unexpected token: {token}, expected: {list}"),
                    None => format!("got unexpected end of input, expected: {list}"),
                }
            }
        };
        Self {
            message,
            pos: failure.pos,
            max: state.max,
            expected,
            found,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A bug in the grammar itself, as opposed to bad input: repetition over a
/// parser that may succeed without consuming anything, or running a
/// forward declaration that was never defined. Never recovered from.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct GrammarError(pub String);

/// Every way [`Parser::parse`] can fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParserError),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}
