//! Reconcile candidate spans from all detectors into disjoint entities.
//!
//! Greedy interval selection over a total order:
//! start ascending, confidence descending, detector priority (pattern
//! first), longer span first, entity kind declaration order. A candidate is
//! accepted only if it intersects nothing accepted so far. Accepted spans
//! are final, so a later candidate that contains one is dropped rather than
//! used to widen it.

use std::cmp::Ordering;

use tracing::{debug, warn};
use veil_core::{Error, IndexedText, MergedEntity, Result, Span};

/// Span reconciliation.
pub struct SpanMerger;

impl SpanMerger {
    /// Merge candidates into ordered, non-overlapping entities.
    ///
    /// Candidates with empty or out-of-range intervals are dropped. Detectors
    /// may emit overlapping spans, including with themselves.
    pub fn merge(text: &IndexedText<'_>, candidates: Vec<Span>) -> Vec<MergedEntity> {
        let total = candidates.len();
        let limit = text.char_len();

        let mut valid: Vec<Span> = candidates
            .into_iter()
            .filter(|s| {
                let ok = s.start < s.end && s.end <= limit;
                if !ok {
                    warn!(
                        "Dropping invalid span [{}, {}) from {} detector (text has {} chars)",
                        s.start, s.end, s.source, limit
                    );
                }
                ok
            })
            .map(|mut s| {
                s.confidence = if s.confidence.is_finite() {
                    s.confidence.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                s
            })
            .collect();

        valid.sort_by(Self::precedence);

        let mut accepted: Vec<MergedEntity> = Vec::with_capacity(valid.len());
        // Every accepted span starts at or before the current candidate, so
        // the candidate intersects one of them iff it starts before the
        // furthest accepted end.
        let mut frontier = 0usize;
        for span in valid {
            if !accepted.is_empty() && span.start < frontier {
                continue;
            }
            let Some(value) = text.slice(span.start, span.end) else {
                continue;
            };
            frontier = span.end;
            accepted.push(MergedEntity {
                value: value.to_string(),
                span,
            });
        }

        debug!(
            "Merged {} candidates into {} entities ({} discarded)",
            total,
            accepted.len(),
            total - accepted.len()
        );
        accepted
    }

    /// Total order used by the sweep. Independent of input order.
    pub fn precedence(a: &Span, b: &Span) -> Ordering {
        a.start
            .cmp(&b.start)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.source.priority().cmp(&b.source.priority()))
            .then_with(|| b.end.cmp(&a.end))
            .then_with(|| a.label.cmp(&b.label))
    }

    /// Check the merge invariants: ascending, pairwise disjoint.
    pub fn validate(entities: &[MergedEntity]) -> Result<()> {
        for pair in entities.windows(2) {
            let (prev, next) = (&pair[0].span, &pair[1].span);
            if next.start < prev.end {
                return Err(Error::MergeConflict(format!(
                    "[{}, {}) {} overlaps [{}, {}) {}",
                    prev.start, prev.end, prev.label, next.start, next.end, next.label
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::{DetectorKind, EntityKind};

    fn span(start: usize, end: usize, label: EntityKind, conf: f64, source: DetectorKind) -> Span {
        Span::new(start, end, label, conf, source)
    }

    #[test]
    fn test_contact_example() {
        let text = IndexedText::new("Contact John Smith at john@example.com");
        let merged = SpanMerger::merge(
            &text,
            vec![
                span(22, 38, EntityKind::Email, 1.0, DetectorKind::Pattern),
                span(8, 18, EntityKind::Person, 0.92, DetectorKind::Semantic),
            ],
        );
        let values: Vec<(&str, EntityKind)> = merged
            .iter()
            .map(|e| (e.value.as_str(), e.span.label))
            .collect();
        assert_eq!(
            values,
            vec![
                ("John Smith", EntityKind::Person),
                ("john@example.com", EntityKind::Email)
            ]
        );
    }

    #[test]
    fn test_pattern_wins_tie() {
        let text = IndexedText::new("reach 555-123-4567 now");
        let merged = SpanMerger::merge(
            &text,
            vec![
                span(6, 18, EntityKind::Pnr, 1.0, DetectorKind::Semantic),
                span(6, 18, EntityKind::Phone, 1.0, DetectorKind::Pattern),
            ],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].span.source, DetectorKind::Pattern);
        assert_eq!(merged[0].span.label, EntityKind::Phone);
    }

    #[test]
    fn test_higher_confidence_wins_same_start() {
        let text = IndexedText::new("Paris Hilton arrived");
        let merged = SpanMerger::merge(
            &text,
            vec![
                span(0, 5, EntityKind::Location, 0.6, DetectorKind::Semantic),
                span(0, 12, EntityKind::Person, 0.9, DetectorKind::Semantic),
            ],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "Paris Hilton");
    }

    #[test]
    fn test_containing_candidate_discarded() {
        // The earlier-starting span is placed first; the one inside it is dropped,
        // and a later span overlapping its tail is dropped too.
        let text = IndexedText::new("abcdefghijklmnop");
        let merged = SpanMerger::merge(
            &text,
            vec![
                span(2, 6, EntityKind::Person, 0.7, DetectorKind::Semantic),
                span(3, 5, EntityKind::Email, 1.0, DetectorKind::Pattern),
                span(5, 9, EntityKind::Date, 1.0, DetectorKind::Pattern),
                span(9, 12, EntityKind::Date, 0.5, DetectorKind::Semantic),
            ],
        );
        let ranges: Vec<(usize, usize)> =
            merged.iter().map(|e| (e.span.start, e.span.end)).collect();
        assert_eq!(ranges, vec![(2, 6), (9, 12)]);
    }

    #[test]
    fn test_accepted_span_not_widened() {
        let text = IndexedText::new("Dr. Jane Doe");
        let merged = SpanMerger::merge(
            &text,
            vec![
                span(4, 8, EntityKind::Person, 1.0, DetectorKind::Pattern),
                span(4, 12, EntityKind::Person, 0.8, DetectorKind::Semantic),
            ],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "Jane");
    }

    #[test]
    fn test_order_independent() {
        let text = IndexedText::new("x John Smith y john@example.com z");
        let candidates = vec![
            span(2, 12, EntityKind::Person, 0.9, DetectorKind::Semantic),
            span(2, 6, EntityKind::Person, 0.9, DetectorKind::Semantic),
            span(15, 31, EntityKind::Email, 1.0, DetectorKind::Pattern),
            span(15, 31, EntityKind::Url, 1.0, DetectorKind::Semantic),
            span(20, 31, EntityKind::Url, 0.4, DetectorKind::Semantic),
        ];
        let forward = SpanMerger::merge(&text, candidates.clone());
        let mut reversed = candidates;
        reversed.reverse();
        let backward = SpanMerger::merge(&text, reversed);
        assert_eq!(forward, backward);
        assert!(SpanMerger::validate(&forward).is_ok());
    }

    #[test]
    fn test_adjacent_spans_both_kept() {
        let text = IndexedText::new("JohnSmith");
        let merged = SpanMerger::merge(
            &text,
            vec![
                span(0, 4, EntityKind::Person, 0.9, DetectorKind::Semantic),
                span(4, 9, EntityKind::Person, 0.9, DetectorKind::Semantic),
            ],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_invalid_spans_dropped() {
        let text = IndexedText::new("short");
        let merged = SpanMerger::merge(
            &text,
            vec![
                span(3, 3, EntityKind::Person, 0.9, DetectorKind::Semantic),
                span(2, 40, EntityKind::Person, 0.9, DetectorKind::Semantic),
            ],
        );
        assert!(merged.is_empty());
    }

    #[test]
    fn test_validate_reports_overlap() {
        let entities = vec![
            MergedEntity {
                span: span(0, 5, EntityKind::Person, 1.0, DetectorKind::Pattern),
                value: "Alice".into(),
            },
            MergedEntity {
                span: span(3, 8, EntityKind::Email, 1.0, DetectorKind::Pattern),
                value: "ce@x.".into(),
            },
        ];
        assert!(matches!(
            SpanMerger::validate(&entities),
            Err(Error::MergeConflict(_))
        ));
    }
}
