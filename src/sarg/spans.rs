//! Span algebra
//!
//! A [`SargSpans`] value describes the index ranges a scan must read. Terms
//! are lists of composite spans over one index; intersections and unions
//! combine access paths. Values are immutable: every operation returns a
//! new value.

use std::fmt;

use serde::Serialize;

use super::span::Span;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "spans", rename_all = "snake_case")]
pub enum SargSpans {
    /// Provably no rows
    Empty,
    /// Unconstrained, the predicate still has to be applied
    Full,
    /// Unconstrained including entries whose leading key is MISSING
    Whole,
    /// Unconstrained and exact: the scan alone answers the predicate
    ExactFull,
    Term(Vec<Span>),
    Intersect(Vec<SargSpans>),
    Union(Vec<SargSpans>),
}

impl SargSpans {
    pub fn term(spans: Vec<Span>) -> SargSpans {
        SargSpans::Term(spans)
    }

    /// Streamlined AND of access paths.
    pub fn intersect(members: Vec<SargSpans>) -> SargSpans {
        SargSpans::Intersect(members).streamline()
    }

    /// Streamlined OR of access paths.
    pub fn union(members: Vec<SargSpans>) -> SargSpans {
        SargSpans::Union(members).streamline()
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            SargSpans::Empty | SargSpans::Full | SargSpans::Whole | SargSpans::ExactFull
        )
    }

    /// An unconstrained scan of any flavour.
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, SargSpans::Full | SargSpans::Whole | SargSpans::ExactFull)
    }

    /// Normal form: nested nodes of the same kind flattened, neutral
    /// sentinels dropped, duplicates removed, and trivial results collapsed
    /// to a sentinel or a single member.
    pub fn streamline(&self) -> SargSpans {
        match self {
            SargSpans::Empty | SargSpans::Full | SargSpans::Whole | SargSpans::ExactFull => {
                self.clone()
            }
            SargSpans::Term(spans) => streamline_term(spans),
            SargSpans::Intersect(members) => streamline_intersect(members),
            SargSpans::Union(members) => streamline_union(members),
        }
    }

    /// The predicate is fully answered by the scan.
    pub fn is_exact(&self) -> bool {
        match self {
            SargSpans::Empty | SargSpans::ExactFull => true,
            SargSpans::Full | SargSpans::Whole => false,
            SargSpans::Term(spans) => spans.iter().all(|s| s.exact),
            SargSpans::Intersect(members) | SargSpans::Union(members) => {
                members.iter().all(SargSpans::is_exact)
            }
        }
    }

    /// Copy with every span marked inexact.
    pub fn inexact(&self) -> SargSpans {
        match self {
            SargSpans::ExactFull => SargSpans::Full,
            SargSpans::Empty | SargSpans::Full | SargSpans::Whole => self.clone(),
            SargSpans::Term(spans) => SargSpans::Term(
                spans
                    .iter()
                    .map(|s| Span::new(s.ranges.clone(), false))
                    .collect(),
            ),
            SargSpans::Intersect(members) => {
                SargSpans::Intersect(members.iter().map(SargSpans::inexact).collect())
            }
            SargSpans::Union(members) => {
                SargSpans::Union(members.iter().map(SargSpans::inexact).collect())
            }
        }
    }

    /// Number of leaf spans.
    pub fn size(&self) -> usize {
        match self {
            SargSpans::Empty => 0,
            SargSpans::Full | SargSpans::Whole | SargSpans::ExactFull => 1,
            SargSpans::Term(spans) => spans.len(),
            SargSpans::Intersect(members) | SargSpans::Union(members) => {
                members.iter().map(SargSpans::size).sum()
            }
        }
    }

    /// Output arrives in index order with no secondary sort: one span,
    /// or an unconstrained scan.
    pub fn can_use_index_order(&self) -> bool {
        match self {
            SargSpans::Empty | SargSpans::Full | SargSpans::Whole | SargSpans::ExactFull => true,
            SargSpans::Term(spans) => spans.len() == 1,
            SargSpans::Union(members) => members.len() == 1 && members[0].can_use_index_order(),
            SargSpans::Intersect(_) => false,
        }
    }

    /// Key position `pos` is pinned to one value: a single span whose
    /// range there is a point.
    pub fn equivalent_at(&self, pos: usize) -> bool {
        match self {
            SargSpans::Term(spans) => {
                spans.len() == 1 && spans[0].ranges.get(pos).map_or(false, |r| r.is_point())
            }
            _ => false,
        }
    }

    /// OFFSET can be applied inside the scan: the scan returns exactly the
    /// qualifying rows, once each.
    pub fn can_push_down_offset(&self, array_key: bool) -> bool {
        if array_key {
            return false;
        }
        match self {
            SargSpans::Empty | SargSpans::ExactFull => true,
            SargSpans::Full | SargSpans::Whole => false,
            SargSpans::Term(spans) => spans.len() == 1 && spans[0].exact,
            SargSpans::Intersect(_) | SargSpans::Union(_) => false,
        }
    }

    /// The scan may return one document more than once: a non-distinct
    /// array key, overlapping spans, or a union of access paths.
    pub fn can_have_duplicates(&self, array_key: bool) -> bool {
        if array_key {
            return true;
        }
        match self {
            SargSpans::Empty | SargSpans::Full | SargSpans::Whole | SargSpans::ExactFull => false,
            SargSpans::Term(spans) => spans
                .iter()
                .enumerate()
                .any(|(i, a)| spans[i + 1..].iter().any(|b| !a.disjoint(b))),
            SargSpans::Union(members) => members.len() > 1,
            SargSpans::Intersect(_) => false,
        }
    }

    /// Fraction of index entries the spans select, from a per-span
    /// estimate. Intersections multiply; unions combine as
    /// `1 - prod(1 - s)`.
    pub fn selectivity<F>(&self, span_selectivity: &mut F) -> f64
    where
        F: FnMut(&Span) -> f64,
    {
        let s: f64 = match self {
            SargSpans::Empty => 0.0,
            SargSpans::Full | SargSpans::Whole | SargSpans::ExactFull => 1.0,
            SargSpans::Term(spans) => spans.iter().map(|s| span_selectivity(s)).sum(),
            SargSpans::Intersect(members) => members
                .iter()
                .map(|m| m.selectivity(span_selectivity))
                .product(),
            SargSpans::Union(members) => {
                1.0 - members
                    .iter()
                    .map(|m| 1.0 - m.selectivity(span_selectivity))
                    .product::<f64>()
            }
        };
        s.clamp(0.0, 1.0)
    }
}

fn streamline_term(spans: &[Span]) -> SargSpans {
    let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.is_empty() || kept.contains(span) {
            continue;
        }
        kept.push(span.clone());
    }
    if kept.is_empty() {
        return SargSpans::Empty;
    }
    if kept.iter().any(|s| s.exact && s.is_unbounded()) {
        return SargSpans::ExactFull;
    }
    if kept.iter().any(Span::is_unbounded) {
        return SargSpans::Full;
    }
    SargSpans::Term(kept)
}

/// Strength of an unconstrained sentinel inside an intersection: the
/// surviving one is the most informative.
fn intersect_rank(s: &SargSpans) -> u8 {
    match s {
        SargSpans::ExactFull => 3,
        SargSpans::Whole => 2,
        SargSpans::Full => 1,
        _ => 0,
    }
}

fn streamline_intersect(members: &[SargSpans]) -> SargSpans {
    let mut flat: Vec<SargSpans> = Vec::with_capacity(members.len());
    let mut identity: Option<SargSpans> = None;
    for member in members {
        let member = member.streamline();
        let parts = match member {
            SargSpans::Intersect(inner) => inner,
            other => vec![other],
        };
        for part in parts {
            match part {
                SargSpans::Empty => return SargSpans::Empty,
                SargSpans::Full | SargSpans::Whole | SargSpans::ExactFull => {
                    let stronger = identity
                        .as_ref()
                        .map_or(true, |cur| intersect_rank(&part) > intersect_rank(cur));
                    if stronger {
                        identity = Some(part);
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
    }
    match flat.len() {
        0 => identity.unwrap_or(SargSpans::Full),
        1 => flat.remove(0),
        _ => SargSpans::Intersect(flat),
    }
}

fn streamline_union(members: &[SargSpans]) -> SargSpans {
    let mut flat: Vec<SargSpans> = Vec::with_capacity(members.len());
    let mut full = false;
    let mut exact_full = false;
    let mut whole = false;
    for member in members {
        let member = member.streamline();
        let parts = match member {
            SargSpans::Union(inner) => inner,
            other => vec![other],
        };
        for part in parts {
            match part {
                SargSpans::Empty => {}
                SargSpans::Full => full = true,
                SargSpans::ExactFull => exact_full = true,
                SargSpans::Whole => whole = true,
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
    }
    if full {
        return SargSpans::Full;
    }
    if exact_full {
        return SargSpans::ExactFull;
    }
    if whole {
        return SargSpans::Whole;
    }
    match flat.len() {
        0 => SargSpans::Empty,
        1 => flat.remove(0),
        _ => SargSpans::Union(flat),
    }
}

impl fmt::Display for SargSpans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SargSpans::Empty => write!(f, "EMPTY"),
            SargSpans::Full => write!(f, "FULL"),
            SargSpans::Whole => write!(f, "WHOLE"),
            SargSpans::ExactFull => write!(f, "EXACT_FULL"),
            SargSpans::Term(spans) => {
                let parts: Vec<String> = spans.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            SargSpans::Intersect(members) => {
                let parts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "INTERSECT({})", parts.join("; "))
            }
            SargSpans::Union(members) => {
                let parts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "UNION({})", parts.join("; "))
            }
        }
    }
}
