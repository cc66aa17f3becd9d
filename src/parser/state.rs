//! # Parser State Management
//!
//! The per-run bookkeeping every parser threads along:
//!
//! 1. **Position** (`pos`) - index of the next token to consume
//! 2. **Furthest reach** (`max`) - the rightmost index any branch got to
//! 3. **Expectations** (`expected`) - names of the parsers that failed at
//!    `max`
//!
//! Backtracking restores `pos` only; `max` and `expected` are monotone for
//! the whole run, which is what makes the final error point at the deepest
//! failure instead of wherever the last alternative happened to give up:
//!
//! ```text
//! let save = state.pos;
//! match first.call(tokens, state) {
//!     Ok(value) => Ok(value),
//!     Err(_) => {
//!         state.restore(save);            // pos moves back, max does not
//!         second.call(tokens, state)
//!     }
//! }
//! ```
//!
//! A state lives exactly as long as one top-level `parse` call and is never
//! shared between runs.

use super::GrammarError;

/// Mutable context threaded through one parse run.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParseState {
    /// Index of the next token to consume.
    pub(crate) pos: usize,
    /// Furthest index any branch has reached.
    pub(crate) max: usize,
    /// Names recorded by parsers that failed at `max`.
    pub(crate) expected: Vec<String>,
}

impl ParseState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Consumes one token. When this moves past the furthest point reached
    /// so far, expectations recorded for shallower positions are stale and
    /// get dropped.
    pub(crate) fn advance(&mut self) {
        self.pos += 1;
        if self.pos > self.max {
            self.max = self.pos;
            self.expected.clear();
        }
    }

    /// Moves back to a previously saved position. Only `pos` is restored.
    pub(crate) fn restore(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Records that the parser called `name` failed at `pos`.
    ///
    /// A failure beyond `max` starts a fresh expectation set; a failure at
    /// `max` joins it; anything shallower is already explained by a deeper
    /// branch and is ignored.
    pub(crate) fn report(&mut self, pos: usize, name: &str) {
        if pos > self.max {
            self.max = pos;
            self.expected.clear();
            self.expected.push(name.to_owned());
        } else if pos == self.max && !self.expected.iter().any(|n| n == name) {
            self.expected.push(name.to_owned());
        }
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            recorded: self.expected.len(),
        }
    }

    /// Swaps the expectations a wrapped parser recorded for a single
    /// user-chosen name.
    ///
    /// Only applies when the wrapped parser failed at its own starting
    /// position; once it consumed input, the names it recorded deeper in
    /// are more precise than any label around them.
    pub(crate) fn relabel(&mut self, start: usize, mark: Checkpoint, name: &str) {
        if self.max == start && self.expected.len() > mark.recorded {
            self.expected.truncate(mark.recorded);
            if !self.expected.iter().any(|n| n == name) {
                self.expected.push(name.to_owned());
            }
        }
    }
}

/// Snapshot of how many expectations were recorded at some point.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    recorded: usize,
}

/// The kind of a recoverable parse failure, used to pick the final message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailKind {
    /// A token (or end of input) did not match.
    Unexpected,
    /// `finished` ran into leftover input.
    EofExpected,
}

/// A recoverable failure. Not an error by itself: alternation and
/// repetition interpret it as a signal to try something else, and only an
/// unrecovered one becomes a [`super::ParserError`].
#[derive(Debug, Clone)]
pub(crate) struct NoParse {
    pub(crate) kind: FailKind,
    /// Position the failing parser was at when it gave up.
    pub(crate) pos: usize,
}

/// Result of one parse step. Grammar errors pass through every combinator
/// untouched; syntax failures are fair game for recovery.
#[derive(Debug, Clone)]
pub(crate) enum Fail {
    Syntax(NoParse),
    Grammar(GrammarError),
}

pub(crate) type Step<T> = Result<T, Fail>;
