//! The repetition guard: `many` and `oneplus` refuse parsers that may
//! succeed without consuming input, since looping over them would never
//! terminate.

use descent::parser::{a, finished, forward_decl, many, maybe, oneplus, pure, Error};

fn grammar_err<O: std::fmt::Debug>(result: Result<O, Error>) -> descent::parser::GrammarError {
    match result {
        Err(Error::Grammar(e)) => e,
        other => panic!("expected a grammar error, got {other:?}"),
    }
}

#[test]
fn progress_flags() {
    let x = || a('x');
    assert!(x().makes_progress());
    assert!(!maybe(x()).makes_progress());
    assert!(!pure::<char, bool>(true).makes_progress());
    assert!(!finished::<char>().makes_progress());
    assert!(!many(x()).makes_progress());
    assert!(oneplus(x()).makes_progress());

    // A sequence makes progress if either side does.
    assert!((maybe(x()) + x()).makes_progress());
    assert!((pure(1) + x()).makes_progress());

    // An alternation only if both sides do.
    assert!(!((x() >> |c| vec![c]) | many(x())).makes_progress());
    assert!((x() | x()).makes_progress());

    // Mapping and naming change neither.
    assert!((x() >> |c| c).makes_progress());
    assert!(x().named("x").makes_progress());
}

#[test]
fn many_over_maybe_is_rejected() {
    let p = many(maybe(a('a')));
    let err = grammar_err(p.parse(&['a']));
    assert!(
        err.to_string().contains("may succeed without consuming input"),
        "unexpected message: {err}"
    );
    assert!(err.to_string().contains("[ 'a' ]"), "unexpected message: {err}");
}

#[test]
fn many_over_many_is_rejected() {
    let p = many(many(a('x')));
    assert!(matches!(p.parse(&['x']), Err(Error::Grammar(_))));
}

#[test]
fn oneplus_over_many_is_rejected() {
    let p = oneplus(many(a('x')));
    let err = grammar_err(p.parse(&['x']));
    assert!(err.to_string().contains("oneplus()"), "unexpected message: {err}");
}

#[test]
fn guard_fires_inside_a_larger_grammar() {
    let p = a('x') + many(maybe(a('y')));
    assert!(matches!(p.parse(&['x']), Err(Error::Grammar(_))));
}

#[test]
fn guard_is_not_recovered_by_alternation() {
    let p = many(maybe(a('x'))) | (a('x') >> |c| vec![Some(c)]);
    assert!(matches!(p.parse(&['x']), Err(Error::Grammar(_))));
}

#[test]
fn progressing_repetitions_run_fine() {
    let p = many(oneplus(a('x')));
    assert_eq!(p.parse(&['x', 'x']).unwrap(), vec![vec!['x', 'x']]);

    let q = many(pure(1) + a('x'));
    assert_eq!(q.parse(&['x', 'x']).unwrap(), vec![(1, 'x'), (1, 'x')]);
}

#[test]
fn undefined_forward_decl_is_an_error() {
    let p = forward_decl::<char, char>();
    let err = grammar_err(p.parse(&['x']));
    assert!(err.to_string().contains("define()"), "unexpected message: {err}");
}

#[test]
fn defined_forward_decl_behaves_like_its_definition() {
    let p = forward_decl::<char, char>();
    p.define(a('x'));
    assert!(p.makes_progress());
    assert_eq!(p.name(), "'x'");
    assert_eq!(p.parse(&['x']).unwrap(), 'x');
    assert_eq!(many(p).parse(&['x', 'x']).unwrap(), vec!['x', 'x']);
}

#[test]
fn repetition_built_before_define_is_judged_by_the_definition() {
    let decl = forward_decl::<char, char>();
    let rep = many(decl.clone());
    decl.define(a('x'));
    assert_eq!(rep.parse(&['x', 'x']).unwrap(), vec!['x', 'x']);
}

#[test]
fn repetition_over_a_nullable_definition_is_rejected() {
    let decl = forward_decl::<char, Option<char>>();
    let rep = many(decl.clone());
    decl.define(maybe(a('x')));
    assert!(matches!(rep.parse(&['x']), Err(Error::Grammar(_))));
}

#[test]
fn recursive_definitions_make_progress_through_the_cycle() {
    // item := 'x' | '(' item ')'
    let item = forward_decl::<char, char>();
    item.define(a('x') | (-a('(') + item.clone() + -a(')')));
    assert!(item.makes_progress());
    assert_eq!(item.parse(&['(', '(', 'x', ')', ')']).unwrap(), 'x');
    assert_eq!(
        many(item).parse(&['x', '(', 'x', ')']).unwrap(),
        vec!['x', 'x']
    );
}
