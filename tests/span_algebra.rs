//! Span Algebra Tests
//!
//! Tests for span invariants:
//! - Streamlining is idempotent
//! - EMPTY and FULL absorb and vanish as expected
//! - IN-list spans are sorted, deduplicated and stable

use aeroquery::catalog::IndexKeyDef;
use aeroquery::expr::{and, constant, eq, ident, in_list, or, param, path};
use aeroquery::sarg::{above_null, sarg_for, Bound, KeySarger, Range, SargSpans, Span};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn point(v: Value) -> Span {
    Span::single(Range::point(constant(v)), true)
}

fn range(low: i64, high: i64) -> Span {
    Span::single(
        Range::new(
            Bound::Included(constant(json!(low))),
            Bound::Excluded(constant(json!(high))),
        ),
        true,
    )
}

/// A spread of shapes: sentinels, terms with duplicates and empty spans,
/// nested intersections and unions, dynamic bounds.
fn samples() -> Vec<SargSpans> {
    let empty_span = Span::single(
        Range::new(
            Bound::Included(constant(json!(5))),
            Bound::Excluded(constant(json!(5))),
        ),
        true,
    );
    let dynamic = Span::single(Range::point(param("p")), true);
    let valued = Span::single(Range::new(above_null(), Bound::Unbounded), false);
    let t1 = SargSpans::Term(vec![point(json!(1)), point(json!(2))]);
    let t2 = SargSpans::Term(vec![range(1, 10), range(1, 10), empty_span.clone()]);
    let t3 = SargSpans::Term(vec![dynamic, valued]);

    vec![
        SargSpans::Empty,
        SargSpans::Full,
        SargSpans::Whole,
        SargSpans::ExactFull,
        SargSpans::Term(vec![]),
        SargSpans::Term(vec![empty_span]),
        SargSpans::Term(vec![Span::single(Range::unbounded(), true)]),
        SargSpans::Term(vec![Span::single(Range::unbounded(), false)]),
        t1.clone(),
        t2.clone(),
        t3.clone(),
        SargSpans::Intersect(vec![t1.clone(), SargSpans::Full, t2.clone()]),
        SargSpans::Intersect(vec![
            SargSpans::Intersect(vec![t1.clone(), t3.clone()]),
            SargSpans::Whole,
        ]),
        SargSpans::Intersect(vec![t1.clone(), SargSpans::Empty]),
        SargSpans::Union(vec![t1.clone(), SargSpans::Empty, t1.clone()]),
        SargSpans::Union(vec![
            SargSpans::Union(vec![t2.clone(), t3.clone()]),
            SargSpans::Intersect(vec![t1.clone(), t2.clone()]),
        ]),
        SargSpans::Union(vec![t3, SargSpans::ExactFull]),
        SargSpans::Intersect(vec![SargSpans::Union(vec![t1, t2])]),
        SargSpans::Union(vec![]),
        SargSpans::Intersect(vec![]),
    ]
}

// =============================================================================
// Streamline Tests
// =============================================================================

/// streamline(streamline(s)) == streamline(s) for every sample.
#[test]
fn test_streamline_idempotent() {
    for s in samples() {
        let once = s.streamline();
        assert_eq!(once.streamline(), once, "not idempotent for {}", s);
    }
}

/// Streamlined unions and intersections never contain a member of their
/// own kind.
#[test]
fn test_streamline_flattens() {
    for s in samples() {
        match s.streamline() {
            SargSpans::Union(members) => {
                assert!(members.iter().all(|m| !matches!(m, SargSpans::Union(_))), "{}", s)
            }
            SargSpans::Intersect(members) => {
                assert!(members.iter().all(|m| !matches!(m, SargSpans::Intersect(_))), "{}", s)
            }
            _ => {}
        }
    }
}

// =============================================================================
// Absorption Tests
// =============================================================================

/// intersect(s, EMPTY) == EMPTY
#[test]
fn test_intersect_with_empty() {
    for s in samples() {
        assert_eq!(
            SargSpans::intersect(vec![s.clone(), SargSpans::Empty]),
            SargSpans::Empty,
            "{}",
            s
        );
    }
}

/// intersect(s, FULL) == streamline(s)
#[test]
fn test_intersect_with_full() {
    for s in samples() {
        assert_eq!(
            SargSpans::intersect(vec![s.clone(), SargSpans::Full]),
            s.streamline(),
            "{}",
            s
        );
    }
}

/// union(s, FULL) == FULL
#[test]
fn test_union_with_full() {
    for s in samples() {
        assert_eq!(
            SargSpans::union(vec![s.clone(), SargSpans::Full]),
            SargSpans::Full,
            "{}",
            s
        );
    }
}

/// union(s, EMPTY) == streamline(s)
#[test]
fn test_union_with_empty() {
    for s in samples() {
        assert_eq!(
            SargSpans::union(vec![s.clone(), SargSpans::Empty]),
            s.streamline(),
            "{}",
            s
        );
    }
}

// =============================================================================
// IN-list Determinism Tests
// =============================================================================

/// Duplicate and unordered static values give sorted, deduplicated points,
/// identical across runs.
#[test]
fn test_in_list_points_sorted_and_stable() {
    let key = path("a", "x");
    let pred = in_list(key.clone(), constant(json!([3, 1, 2, 1])));
    let expected = SargSpans::Term(vec![point(json!(1)), point(json!(2)), point(json!(3))]);

    for _ in 0..5 {
        let spans = KeySarger::new(&key, "a", 8192).sarg(&pred).unwrap();
        assert_eq!(spans, expected);
    }
}

/// Mixed types follow collation order: null dropped, numbers before
/// strings.
#[test]
fn test_in_list_mixed_types_follow_collation() {
    let key = path("a", "x");
    let pred = in_list(key.clone(), constant(json!(["b", 2, null, "a", 1, 2])));
    let spans = KeySarger::new(&key, "a", 8192).sarg(&pred).unwrap();
    assert_eq!(
        spans,
        SargSpans::Term(vec![
            point(json!(1)),
            point(json!(2)),
            point(json!("a")),
            point(json!("b")),
        ])
    );
}

/// Composite IN lists form the ordered cartesian product.
#[test]
fn test_composite_in_lists() {
    let keys = vec![
        IndexKeyDef::scalar(ident("x")).formalize("a"),
        IndexKeyDef::scalar(ident("y")).formalize("a"),
    ];
    let pred = and(vec![
        in_list(path("a", "x"), constant(json!([2, 1]))),
        eq(path("a", "y"), constant(json!(7))),
    ]);
    let sarg = sarg_for(&pred, &keys, "a", 8192).unwrap();
    assert_eq!(
        sarg.spans.to_string(),
        "{[1, 1] [7, 7]}, {[2, 2] [7, 7]}"
    );

    let or_pred = or(vec![
        eq(path("a", "x"), constant(json!(2))),
        eq(path("a", "x"), constant(json!(2))),
    ]);
    let sarg = sarg_for(&or_pred, &keys[..1], "a", 8192).unwrap();
    assert_eq!(sarg.spans.size(), 1);
}
