//! Rule-based PII detection using regex patterns.

use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use veil_core::{DetectorKind, EntityKind, IndexedText, Result, Span};

use crate::detector::Detector;

// Compiled regex patterns (compiled once, reused).
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap()
});
static SSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static CC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b|\b\d{4}[-\s]?\d{6}[-\s]?\d{5}\b").unwrap()
});
static IP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b")
        .unwrap()
});
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"']+"#).unwrap());
// Bare ten-digit booking references. The same digits also match PHONE;
// `find` keeps the PNR reading.
static PNR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{10}\b").unwrap());
// Labelled identifiers: only the captured value is redacted, not the label.
static TRANSACTION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Transaction ID:\s*(\d+)").unwrap());
static INVOICE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Invoice Number:\s*([A-Z0-9]+)").unwrap());

const PATTERN_CONFIDENCE: f64 = 1.0;

/// PII detector using compiled regex patterns.
pub struct PatternDetector {
    patterns: Vec<(EntityKind, &'static Regex)>,
}

impl PatternDetector {
    /// Create a new pattern detector.
    pub fn new() -> Self {
        Self {
            patterns: vec![
                (EntityKind::Email, &EMAIL_RE),
                (EntityKind::Ssn, &SSN_RE),
                (EntityKind::CreditCard, &CC_RE),
                (EntityKind::Phone, &PHONE_RE),
                (EntityKind::IpAddress, &IP_RE),
                (EntityKind::Url, &URL_RE),
                (EntityKind::Pnr, &PNR_RE),
                (EntityKind::TransactionId, &TRANSACTION_ID_RE),
                (EntityKind::InvoiceNumber, &INVOICE_NUMBER_RE),
            ],
        }
    }

    /// Synchronous core of `detect`. Spans are sorted by start offset.
    pub fn find(&self, text: &IndexedText<'_>, kinds: &[EntityKind]) -> Vec<Span> {
        let raw = text.as_str();
        let mut spans = Vec::new();

        for (kind, regex) in &self.patterns {
            if !kinds.contains(kind) {
                continue;
            }
            for caps in regex.captures_iter(raw) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let (start, mut end) = (m.start(), m.end());

                match kind {
                    // PHONE is unanchored so the `(` and `+` prefixes match;
                    // reject windows cut out of a longer run of digits or letters.
                    EntityKind::Phone => {
                        if !is_standalone(raw, start, end) {
                            continue;
                        }
                    }
                    EntityKind::CreditCard => {
                        let digits = m.as_str().replace(['-', ' '], "");
                        if !is_valid_luhn(&digits) {
                            continue;
                        }
                    }
                    EntityKind::Url => {
                        end = start + trim_trailing_punctuation(m.as_str()).len();
                    }
                    _ => {}
                }

                if let Some(range) = text.char_range(start, end) {
                    if range.start < range.end {
                        spans.push(Span::new(
                            range.start,
                            range.end,
                            *kind,
                            PATTERN_CONFIDENCE,
                            DetectorKind::Pattern,
                        ));
                    }
                }
            }
        }

        let pnr_ranges: HashSet<(usize, usize)> = spans
            .iter()
            .filter(|s| s.label == EntityKind::Pnr)
            .map(|s| (s.start, s.end))
            .collect();
        spans.retain(|s| {
            s.label != EntityKind::Phone || !pnr_ranges.contains(&(s.start, s.end))
        });

        spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        debug!("Pattern detector produced {} candidate spans", spans.len());
        spans
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Detector for PatternDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Pattern
    }

    async fn detect(&self, text: &IndexedText<'_>, kinds: &[EntityKind]) -> Result<Vec<Span>> {
        Ok(self.find(text, kinds))
    }
}

/// Luhn algorithm for credit card validation.
fn is_valid_luhn(card_number: &str) -> bool {
    let digits: Vec<u32> = card_number.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, &digit)| {
            if idx % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    checksum % 10 == 0
}

fn is_standalone(raw: &str, start: usize, end: usize) -> bool {
    let before = raw[..start].chars().next_back();
    let after = raw[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Sentence punctuation directly after a URL is not part of it.
fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_all(text: &str) -> Vec<(EntityKind, String)> {
        let indexed = IndexedText::new(text);
        PatternDetector::new()
            .find(&indexed, EntityKind::all())
            .into_iter()
            .map(|s| (s.label, indexed.slice(s.start, s.end).unwrap().to_string()))
            .collect()
    }

    #[test]
    fn test_detect_email() {
        let found = find_all("Contact me at user@example.com for details.");
        assert_eq!(found, vec![(EntityKind::Email, "user@example.com".to_string())]);
    }

    #[test]
    fn test_detect_phone() {
        let found = find_all("Call me at (555) 123-4567 today.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, EntityKind::Phone);
    }

    #[test]
    fn test_phone_not_cut_from_longer_numbers() {
        let found = find_all("acct 123456789012345");
        assert!(found.iter().all(|(k, _)| *k != EntityKind::Phone), "{:?}", found);

        let found = find_all("ref A5551234567B");
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_bare_ten_digits_are_pnr() {
        let found = find_all("PNR 1234567890");
        assert_eq!(found, vec![(EntityKind::Pnr, "1234567890".to_string())]);

        // Without PNR enabled the same digits still read as a phone number.
        let indexed = IndexedText::new("PNR 1234567890");
        let spans = PatternDetector::new().find(&indexed, &[EntityKind::Phone]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].label, EntityKind::Phone);
    }

    #[test]
    fn test_formatted_phone_is_not_pnr() {
        let found = find_all("Call +1 555-123-4567.");
        assert_eq!(found, vec![(EntityKind::Phone, "+1 555-123-4567".to_string())]);
    }

    #[test]
    fn test_detect_ssn() {
        let found = find_all("My SSN is 123-45-6789.");
        assert_eq!(found, vec![(EntityKind::Ssn, "123-45-6789".to_string())]);
    }

    #[test]
    fn test_credit_card_requires_luhn() {
        let valid = find_all("Card: 4111 1111 1111 1111");
        assert!(valid
            .iter()
            .any(|(k, v)| *k == EntityKind::CreditCard && v == "4111 1111 1111 1111"));

        let invalid = find_all("Card: 4111 1111 1111 1112");
        assert!(invalid.iter().all(|(k, _)| *k != EntityKind::CreditCard));
    }

    #[test]
    fn test_labelled_identifiers_capture_value_only() {
        let found = find_all("Transaction ID: 99812 and Invoice Number: INV2024A");
        assert!(found.contains(&(EntityKind::TransactionId, "99812".to_string())));
        assert!(found.contains(&(EntityKind::InvoiceNumber, "INV2024A".to_string())));
    }

    #[test]
    fn test_url_trailing_punctuation() {
        let found = find_all("See https://example.com/profile.");
        assert_eq!(
            found,
            vec![(EntityKind::Url, "https://example.com/profile".to_string())]
        );
    }

    #[test]
    fn test_kind_filter() {
        let indexed = IndexedText::new("user@example.com 123-45-6789");
        let spans = PatternDetector::new().find(&indexed, &[EntityKind::Ssn]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].label, EntityKind::Ssn);
    }

    #[test]
    fn test_char_offsets_after_multibyte_text() {
        let text = "Zoë: zoe@example.com";
        let indexed = IndexedText::new(text);
        let spans = PatternDetector::new().find(&indexed, &[EntityKind::Email]);
        assert_eq!(spans[0].start, 5);
        assert_eq!(spans[0].end, 20);
    }

    #[test]
    fn test_tokens_are_not_redetected() {
        let found = find_all("[PERSON_1] wrote to [EMAIL_1] about [PHONE_2]");
        assert!(found.is_empty());
    }

    #[test]
    fn test_pattern_confidence_fixed() {
        let indexed = IndexedText::new("ip 192.168.1.100");
        let spans = PatternDetector::new().find(&indexed, EntityKind::all());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].confidence, 1.0);
        assert_eq!(spans[0].source, DetectorKind::Pattern);
    }
}
