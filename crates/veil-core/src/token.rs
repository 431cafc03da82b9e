//! Placeholder tokens substituted for redacted values.
//!
//! Format: `[<LABEL>_<n>]`, e.g. `[PERSON_1]` or `[CREDIT_CARD_3]`. The
//! brackets never occur inside a token body, so tokens stay cleanly
//! delimited from surrounding text, and no detector pattern can match
//! across or inside them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::EntityKind;

/// A minted placeholder: entity kind plus per-kind sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub kind: EntityKind,
    pub seq: u32,
}

impl Token {
    pub fn new(kind: EntityKind, seq: u32) -> Self {
        Self { kind, seq }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}_{}]", self.kind.label(), self.seq)
    }
}

// Only labels of known kinds are recognised as tokens.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    let labels: Vec<String> = EntityKind::all()
        .iter()
        .map(|k| regex::escape(k.label()))
        .collect();
    Regex::new(&format!(r"\[({})_(\d+)\]", labels.join("|"))).unwrap()
});

/// A token-shaped substring found in text. Offsets are bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
    pub kind: EntityKind,
}

/// Find every token-shaped substring, left to right, non-overlapping.
pub fn scan_tokens(text: &str) -> Vec<TokenMatch<'_>> {
    TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?.as_str();
            let kind = EntityKind::all().iter().find(|k| k.label() == label)?;
            Some(TokenMatch {
                start: whole.start(),
                end: whole.end(),
                text: whole.as_str(),
                kind: *kind,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        assert_eq!(Token::new(EntityKind::Person, 1).to_string(), "[PERSON_1]");
        assert_eq!(
            Token::new(EntityKind::CreditCard, 12).to_string(),
            "[CREDIT_CARD_12]"
        );
    }

    #[test]
    fn test_scan_finds_minted_tokens() {
        let text = "Contact [PERSON_1] at [EMAIL_1] or [CREDIT_CARD_2].";
        let found = scan_tokens(text);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].text, "[PERSON_1]");
        assert_eq!(found[0].kind, EntityKind::Person);
        assert_eq!(found[2].kind, EntityKind::CreditCard);
        assert_eq!(&text[found[1].start..found[1].end], "[EMAIL_1]");
    }

    #[test]
    fn test_scan_ignores_unknown_labels() {
        assert!(scan_tokens("[FOO_1] [PERSON] [person_1] PERSON_1").is_empty());
    }
}
