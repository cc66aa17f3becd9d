use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::{Add, BitOr, Neg, Shr};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::lexer::Token;

use super::state::{Fail, FailKind, NoParse, ParseState, Step};
use super::{Error, GrammarError, ParserError};

type RunFn<I, O> = Rc<dyn Fn(&[I], &mut ParseState) -> Step<O>>;

// === The parser value ===

/// A parser over tokens of type `I` producing values of type `O`.
///
/// Parsers are cheap to clone and immutable once the grammar is built; the
/// one exception is [`Parser::define`], which fills in a forward
/// declaration and must happen before the first `parse`. Cloned handles
/// share their definition, so defining a declaration is visible through
/// every clone captured inside the grammar.
pub struct Parser<I, O> {
    name: Rc<RefCell<String>>,
    progress: Rc<Cell<bool>>,
    run: Rc<RefCell<Option<RunFn<I, O>>>>,
}

impl<I, O> Clone for Parser<I, O> {
    fn clone(&self) -> Self {
        Parser {
            name: Rc::clone(&self.name),
            progress: Rc::clone(&self.progress),
            run: Rc::clone(&self.run),
        }
    }
}

impl<I: 'static, O: 'static> Parser<I, O> {
    fn wrap(
        name: impl Into<String>,
        progress: bool,
        run: impl Fn(&[I], &mut ParseState) -> Step<O> + 'static,
    ) -> Self {
        Parser {
            name: Rc::new(RefCell::new(name.into())),
            progress: Rc::new(Cell::new(progress)),
            run: Rc::new(RefCell::new(Some(Rc::new(run) as RunFn<I, O>))),
        }
    }

    pub(crate) fn call(&self, tokens: &[I], state: &mut ParseState) -> Step<O> {
        trace!(parser = self.name.borrow().as_str(), pos = state.pos, "trying");
        let run = self.run.borrow().clone();
        match run {
            Some(run) => run(tokens, state),
            None => Err(Fail::Grammar(GrammarError(
                "you must define() a forward_decl parser before using it".into(),
            ))),
        }
    }

    /// The name shown in `expected:` listings.
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// True if every successful run of this parser consumes at least one
    /// token. `many` and `oneplus` refuse to loop over parsers for which
    /// this does not hold.
    pub fn makes_progress(&self) -> bool {
        self.progress.get()
    }

    /// Same behavior, different name in error messages.
    ///
    /// When the wrapped parser fails right where it started, the names it
    /// recorded are folded into this one, so messages read at the
    /// granularity the grammar author chose. Failures after the parser
    /// already consumed input keep their deeper, more precise names.
    pub fn named(self, name: impl Into<String>) -> Self {
        let name = Rc::new(RefCell::new(name.into()));
        let label = Rc::clone(&name);
        let inner = self.clone();
        let run = move |tokens: &[I], state: &mut ParseState| {
            let start = state.pos;
            let mark = state.checkpoint();
            let result = inner.call(tokens, state);
            if matches!(result, Err(Fail::Syntax(_))) {
                state.relabel(start, mark, label.borrow().as_str());
            }
            result
        };
        Parser {
            name,
            progress: self.progress,
            run: Rc::new(RefCell::new(Some(Rc::new(run) as RunFn<I, O>))),
        }
    }

    /// Fills in a forward declaration.
    ///
    /// The declaration takes over the definition's name and progress flag.
    /// All `define` calls must be finished before the grammar is first run;
    /// a defined grammar is frozen from then on.
    pub fn define(&self, parser: impl Into<Parser<I, O>>) {
        let parser = parser.into();
        self.progress.set(parser.progress.get());
        *self.name.borrow_mut() = parser.name();
        let target = parser.clone();
        *self.run.borrow_mut() = Some(Rc::new(move |tokens, state| target.call(tokens, state)));
    }

    /// Transforms the parsed value.
    pub fn map<U: 'static>(self, f: impl Fn(O) -> U + 'static) -> Parser<I, U> {
        let name = self.name();
        let progress = self.makes_progress();
        let inner = self;
        Parser::wrap(name, progress, move |tokens, state| {
            inner.call(tokens, state).map(|value| f(value))
        })
    }

    /// Monadic bind: the parsed value picks the parser for the rest of the
    /// input. The other combinators cover most grammars; `bind` is for the
    /// rare genuinely context-sensitive spot.
    pub fn bind<U: 'static>(self, f: impl Fn(O) -> Parser<I, U> + 'static) -> Parser<I, U> {
        let name = format!("({} >>=)", self.name());
        let progress = self.makes_progress();
        let inner = self;
        Parser::wrap(name, progress, move |tokens, state| {
            let value = inner.call(tokens, state)?;
            f(value).call(tokens, state)
        })
    }

    /// Runs the parser over a token sequence.
    ///
    /// Leftover tokens are ignored; a grammar that must consume everything
    /// ends with `+ -finished()`. On failure the returned [`ParserError`]
    /// points at the furthest token any branch reached.
    pub fn parse(&self, tokens: &[I]) -> Result<O, Error>
    where
        I: fmt::Display,
    {
        let mut state = ParseState::new();
        debug!(
            parser = self.name.borrow().as_str(),
            tokens = tokens.len(),
            "parse started"
        );
        match self.call(tokens, &mut state) {
            Ok(value) => Ok(value),
            Err(Fail::Grammar(error)) => {
                debug!(parser = self.name.borrow().as_str(), %error, "parse failed");
                Err(Error::Grammar(error))
            }
            Err(Fail::Syntax(failure)) => {
                let error = ParserError::from_failure(failure, tokens, state);
                debug!(parser = self.name.borrow().as_str(), %error, "parse failed");
                Err(Error::Parse(error))
            }
        }
    }
}

// === Primitive parsers ===

/// Consumes the next token if `pred` accepts it.
pub fn some<I: Clone + 'static>(pred: impl Fn(&I) -> bool + 'static) -> Parser<I, I> {
    Parser::wrap("(some)", true, move |tokens: &[I], state: &mut ParseState| {
        match tokens.get(state.pos) {
            Some(token) if pred(token) => {
                let token = token.clone();
                state.advance();
                Ok(token)
            }
            _ => {
                let pos = state.pos;
                state.report(pos, "(some)");
                Err(Fail::Syntax(NoParse {
                    kind: FailKind::Unexpected,
                    pos,
                }))
            }
        }
    })
}

/// Consumes any single token. Fails only on empty input.
pub fn any<I: Clone + 'static>() -> Parser<I, I> {
    some(|_| true).named("any")
}

/// Consumes the next token if it equals `value`.
pub fn a<I>(value: I) -> Parser<I, I>
where
    I: Clone + PartialEq + fmt::Debug + 'static,
{
    let name = format!("{:?}", value);
    some(move |token: &I| *token == value).named(name)
}

/// Consumes the next [`Token`] of the given kind.
pub fn tok(kind: impl Into<String>) -> Parser<Token, Token> {
    let kind = kind.into();
    let name = kind.clone();
    some(move |token: &Token| token.kind == kind).named(name)
}

/// Consumes the next [`Token`] matching both kind and value.
pub fn tok_value(kind: impl Into<String>, value: impl Into<String>) -> Parser<Token, Token> {
    let kind = kind.into();
    let value = value.into();
    let name = format!("{:?}", value);
    some(move |token: &Token| token.kind == kind && token.value == value).named(name)
}

/// Succeeds with `value` without touching the input.
pub fn pure<I: 'static, O: Clone + 'static>(value: O) -> Parser<I, O> {
    Parser::wrap("(pure)", false, move |_, _| Ok(value.clone()))
}

/// Succeeds exactly at the end of the token sequence.
pub fn finished<I: 'static>() -> Parser<I, ()> {
    Parser::wrap("finished", false, |tokens: &[I], state: &mut ParseState| {
        if state.pos >= tokens.len() {
            Ok(())
        } else {
            let pos = state.pos;
            state.report(pos, "finished");
            Err(Fail::Syntax(NoParse {
                kind: FailKind::EofExpected,
                pos,
            }))
        }
    })
}

/// An undefined parser for recursive grammars; supply its body later with
/// [`Parser::define`]. Running it undefined is a [`GrammarError`].
pub fn forward_decl<I: 'static, O: 'static>() -> Parser<I, O> {
    Parser {
        name: Rc::new(RefCell::new("forward_decl".to_string())),
        progress: Rc::new(Cell::new(false)),
        run: Rc::new(RefCell::new(None)),
    }
}

// === Repetition ===

/// Applies `parser` until it fails, collecting the results. Zero matches is
/// fine. A failing iteration backs off to the end of the last complete one.
///
/// The first invocation raises [`GrammarError`] if `parser` may succeed
/// without consuming input, since the loop would never terminate. The flag
/// is read at run time, so a forward declaration defined after this
/// combinator was built is still judged by its definition.
pub fn many<I: 'static, O: 'static>(parser: impl Into<Parser<I, O>>) -> Parser<I, Vec<O>> {
    let parser = parser.into();
    let name = format!("{{ {} }}", parser.name());
    Parser::wrap(name, false, move |tokens, state| {
        if !parser.makes_progress() {
            return Err(Fail::Grammar(GrammarError(format!(
                "many() applied to a parser that may succeed without consuming input: {}",
                parser.name()
            ))));
        }
        let mut items = Vec::new();
        loop {
            let save = state.pos;
            match parser.call(tokens, state) {
                Ok(item) => items.push(item),
                Err(Fail::Grammar(error)) => return Err(Fail::Grammar(error)),
                Err(Fail::Syntax(_)) => {
                    state.restore(save);
                    break;
                }
            }
        }
        Ok(items)
    })
}

/// Like [`many`], but requires at least one match.
pub fn oneplus<I: 'static, O: 'static>(parser: impl Into<Parser<I, O>>) -> Parser<I, Vec<O>> {
    let parser = parser.into();
    let name = format!("({} , {{ {} }})", parser.name(), parser.name());
    let progress = Rc::clone(&parser.progress);
    let rest = many(parser.clone());
    let first = parser;
    let run = move |tokens: &[I], state: &mut ParseState| {
        if !first.makes_progress() {
            return Err(Fail::Grammar(GrammarError(format!(
                "oneplus() applied to a parser that may succeed without consuming input: {}",
                first.name()
            ))));
        }
        let head = first.call(tokens, state)?;
        let mut items = vec![head];
        items.extend(rest.call(tokens, state)?);
        Ok(items)
    };
    Parser {
        name: Rc::new(RefCell::new(name)),
        progress,
        run: Rc::new(RefCell::new(Some(Rc::new(run) as RunFn<I, Vec<O>>))),
    }
}

/// Zero or one: `None` instead of a failure when `parser` does not match.
pub fn maybe<I: 'static, O: 'static>(parser: impl Into<Parser<I, O>>) -> Parser<I, Option<O>> {
    let parser = parser.into();
    let name = format!("[ {} ]", parser.name());
    let fallback: Parser<I, Option<O>> = Parser::wrap("(pure)", false, |_, _| Ok(None));
    (parser.map(Some) | fallback).named(name)
}

// === Sequencing ===

/// The result of `p + q`: a parser whose output is a flat tuple.
///
/// Appending more parsers with `+` extends the tuple (up to six elements)
/// instead of nesting, so `(p + q) + r` and `p + (q + r)` both produce
/// `(A, B, C)` in source order.
pub struct Seq<I, O> {
    parser: Parser<I, O>,
}

impl<I, O> Clone for Seq<I, O> {
    fn clone(&self) -> Self {
        Seq {
            parser: self.parser.clone(),
        }
    }
}

impl<I: 'static, O: 'static> Seq<I, O> {
    pub fn name(&self) -> String {
        self.parser.name()
    }

    pub fn makes_progress(&self) -> bool {
        self.parser.makes_progress()
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        Seq {
            parser: self.parser.named(name),
        }
    }

    pub fn map<U: 'static>(self, f: impl Fn(O) -> U + 'static) -> Parser<I, U> {
        self.parser.map(f)
    }

    pub fn bind<U: 'static>(self, f: impl Fn(O) -> Parser<I, U> + 'static) -> Parser<I, U> {
        self.parser.bind(f)
    }

    pub fn parse(&self, tokens: &[I]) -> Result<O, Error>
    where
        I: fmt::Display,
    {
        self.parser.parse(tokens)
    }
}

impl<I, O> From<Seq<I, O>> for Parser<I, O> {
    fn from(seq: Seq<I, O>) -> Self {
        seq.parser
    }
}

/// The result of `-p`: a parser whose output is dropped from the
/// surrounding sequence. On its own it parses to `()`.
pub struct Skip<I> {
    parser: Parser<I, ()>,
}

impl<I> Clone for Skip<I> {
    fn clone(&self) -> Self {
        Skip {
            parser: self.parser.clone(),
        }
    }
}

impl<I> From<Skip<I>> for Parser<I, ()> {
    fn from(skip: Skip<I>) -> Self {
        skip.parser
    }
}

/// Ignores the result of `parser` inside a sequence; same as unary `-`.
pub fn skip<I: 'static, O: 'static>(parser: impl Into<Parser<I, O>>) -> Skip<I> {
    let parser = parser.into();
    Skip {
        parser: parser.map(|_| ()),
    }
}

fn seq_pair<I: 'static, A: 'static, B: 'static>(
    lhs: Parser<I, A>,
    rhs: Parser<I, B>,
) -> Parser<I, (A, B)> {
    let name = format!("({}, {})", lhs.name(), rhs.name());
    let progress = lhs.makes_progress() || rhs.makes_progress();
    Parser::wrap(name, progress, move |tokens, state| {
        let a = lhs.call(tokens, state)?;
        let b = rhs.call(tokens, state)?;
        Ok((a, b))
    })
}

fn seq_keep_left<I: 'static, A: 'static>(lhs: Parser<I, A>, rhs: Parser<I, ()>) -> Parser<I, A> {
    let name = format!("({}, {})", lhs.name(), rhs.name());
    let progress = lhs.makes_progress() || rhs.makes_progress();
    Parser::wrap(name, progress, move |tokens, state| {
        let a = lhs.call(tokens, state)?;
        rhs.call(tokens, state)?;
        Ok(a)
    })
}

fn seq_keep_right<I: 'static, B: 'static>(lhs: Parser<I, ()>, rhs: Parser<I, B>) -> Parser<I, B> {
    let name = format!("({}, {})", lhs.name(), rhs.name());
    let progress = lhs.makes_progress() || rhs.makes_progress();
    Parser::wrap(name, progress, move |tokens, state| {
        lhs.call(tokens, state)?;
        rhs.call(tokens, state)
    })
}

fn alt<I: 'static, O: 'static>(lhs: Parser<I, O>, rhs: Parser<I, O>) -> Parser<I, O> {
    let name = format!("{} or {}", lhs.name(), rhs.name());
    let progress = lhs.makes_progress() && rhs.makes_progress();
    Parser::wrap(name, progress, move |tokens, state| {
        let start = state.pos;
        match lhs.call(tokens, state) {
            Ok(value) => Ok(value),
            Err(Fail::Grammar(error)) => Err(Fail::Grammar(error)),
            Err(Fail::Syntax(_)) => {
                state.restore(start);
                rhs.call(tokens, state)
            }
        }
    })
}

// === Operator overloading ===

/// `+` for sequence: `A + B -> (A, B)`
impl<I: 'static, A: 'static, B: 'static> Add<Parser<I, B>> for Parser<I, A> {
    type Output = Seq<I, (A, B)>;

    fn add(self, rhs: Parser<I, B>) -> Self::Output {
        Seq {
            parser: seq_pair(self, rhs),
        }
    }
}

/// `+` with a skipped right side keeps only the left result.
impl<I: 'static, A: 'static> Add<Skip<I>> for Parser<I, A> {
    type Output = Parser<I, A>;

    fn add(self, rhs: Skip<I>) -> Self::Output {
        seq_keep_left(self, rhs.parser)
    }
}

/// `+` with a skipped left side keeps only the right result.
impl<I: 'static, B: 'static> Add<Parser<I, B>> for Skip<I> {
    type Output = Parser<I, B>;

    fn add(self, rhs: Parser<I, B>) -> Self::Output {
        seq_keep_right(self.parser, rhs)
    }
}

/// Two skipped sides in a row stay skipped.
impl<I: 'static> Add<Skip<I>> for Skip<I> {
    type Output = Skip<I>;

    fn add(self, rhs: Skip<I>) -> Self::Output {
        Skip {
            parser: seq_keep_left(self.parser, rhs.parser),
        }
    }
}

impl<I: 'static, T: 'static> Add<Seq<I, T>> for Skip<I> {
    type Output = Seq<I, T>;

    fn add(self, rhs: Seq<I, T>) -> Self::Output {
        Seq {
            parser: seq_keep_right(self.parser, rhs.parser),
        }
    }
}

impl<I: 'static, T: 'static> Add<Skip<I>> for Seq<I, T> {
    type Output = Seq<I, T>;

    fn add(self, rhs: Skip<I>) -> Self::Output {
        Seq {
            parser: seq_keep_left(self.parser, rhs.parser),
        }
    }
}

/// Appends one more parser to a flat sequence tuple.
macro_rules! flat_append {
    (($($T:ident),+) + $U:ident => ($($v:ident),+)) => {
        impl<I: 'static, $($T: 'static,)+ $U: 'static> Add<Parser<I, $U>> for Seq<I, ($($T,)+)> {
            type Output = Seq<I, ($($T,)+ $U)>;

            fn add(self, rhs: Parser<I, $U>) -> Self::Output {
                let lhs = self.parser;
                let name = format!("({}, {})", lhs.name(), rhs.name());
                let progress = lhs.makes_progress() || rhs.makes_progress();
                Seq {
                    parser: Parser::wrap(name, progress, move |tokens, state| {
                        let ($($v,)+) = lhs.call(tokens, state)?;
                        let tail = rhs.call(tokens, state)?;
                        Ok(($($v,)+ tail))
                    }),
                }
            }
        }
    };
}

/// Prepends a parser to a flat sequence tuple.
macro_rules! flat_prepend {
    ($H:ident + ($($T:ident),+) => ($($v:ident),+)) => {
        impl<I: 'static, $H: 'static, $($T: 'static),+> Add<Seq<I, ($($T,)+)>> for Parser<I, $H> {
            type Output = Seq<I, ($H, $($T),+)>;

            fn add(self, rhs: Seq<I, ($($T,)+)>) -> Self::Output {
                let lhs = self;
                let rhs = rhs.parser;
                let name = format!("({}, {})", lhs.name(), rhs.name());
                let progress = lhs.makes_progress() || rhs.makes_progress();
                Seq {
                    parser: Parser::wrap(name, progress, move |tokens, state| {
                        let head = lhs.call(tokens, state)?;
                        let ($($v,)+) = rhs.call(tokens, state)?;
                        Ok((head, $($v),+))
                    }),
                }
            }
        }
    };
}

/// Concatenates two flat sequence tuples.
macro_rules! flat_concat {
    (($($T:ident),+) + ($($U:ident),+) => ($($x:ident),+) ($($y:ident),+)) => {
        impl<I: 'static, $($T: 'static,)+ $($U: 'static),+> Add<Seq<I, ($($U,)+)>> for Seq<I, ($($T,)+)> {
            type Output = Seq<I, ($($T,)+ $($U),+)>;

            fn add(self, rhs: Seq<I, ($($U,)+)>) -> Self::Output {
                let lhs = self.parser;
                let rhs = rhs.parser;
                let name = format!("({}, {})", lhs.name(), rhs.name());
                let progress = lhs.makes_progress() || rhs.makes_progress();
                Seq {
                    parser: Parser::wrap(name, progress, move |tokens, state| {
                        let ($($x,)+) = lhs.call(tokens, state)?;
                        let ($($y,)+) = rhs.call(tokens, state)?;
                        Ok(($($x,)+ $($y),+))
                    }),
                }
            }
        }
    };
}

flat_append!((A, B) + C => (a, b));
flat_append!((A, B, C) + D => (a, b, c));
flat_append!((A, B, C, D) + E => (a, b, c, d));
flat_append!((A, B, C, D, E) + F => (a, b, c, d, e));

flat_prepend!(H + (A, B) => (a, b));
flat_prepend!(H + (A, B, C) => (a, b, c));
flat_prepend!(H + (A, B, C, D) => (a, b, c, d));
flat_prepend!(H + (A, B, C, D, E) => (a, b, c, d, e));

flat_concat!((A, B) + (C, D) => (a, b) (c, d));
flat_concat!((A, B) + (C, D, E) => (a, b) (c, d, e));
flat_concat!((A, B) + (C, D, E, F) => (a, b) (c, d, e, f));
flat_concat!((A, B, C) + (D, E) => (a, b, c) (d, e));
flat_concat!((A, B, C) + (D, E, F) => (a, b, c) (d, e, f));
flat_concat!((A, B, C, D) + (E, F) => (a, b, c, d) (e, f));

/// `|` for alternation: try the left side, fall back to the right.
impl<I: 'static, O: 'static, R: Into<Parser<I, O>>> BitOr<R> for Parser<I, O> {
    type Output = Parser<I, O>;

    fn bitor(self, rhs: R) -> Self::Output {
        alt(self, rhs.into())
    }
}

impl<I: 'static, O: 'static, R: Into<Parser<I, O>>> BitOr<R> for Seq<I, O> {
    type Output = Parser<I, O>;

    fn bitor(self, rhs: R) -> Self::Output {
        alt(self.parser, rhs.into())
    }
}

/// `>>` for mapping: `A >> fn -> B`
impl<I: 'static, O: 'static, U: 'static, F: Fn(O) -> U + 'static> Shr<F> for Parser<I, O> {
    type Output = Parser<I, U>;

    fn shr(self, f: F) -> Self::Output {
        self.map(f)
    }
}

impl<I: 'static, O: 'static, U: 'static, F: Fn(O) -> U + 'static> Shr<F> for Seq<I, O> {
    type Output = Parser<I, U>;

    fn shr(self, f: F) -> Self::Output {
        self.parser.map(f)
    }
}

/// Unary `-` marks a parser's result as ignored within a sequence.
impl<I: 'static, O: 'static> Neg for Parser<I, O> {
    type Output = Skip<I>;

    fn neg(self) -> Self::Output {
        skip(self)
    }
}

impl<I: 'static, O: 'static> Neg for Seq<I, O> {
    type Output = Skip<I>;

    fn neg(self) -> Self::Output {
        skip(self.parser)
    }
}

impl<I: 'static> Neg for Skip<I> {
    type Output = Skip<I>;

    fn neg(self) -> Self::Output {
        self
    }
}
