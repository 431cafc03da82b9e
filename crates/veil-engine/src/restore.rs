//! Restoration: swap tokens back for their original values.
//!
//! All-or-nothing. A token missing from the session's mapping aborts the
//! whole restoration, so callers never receive text that still carries
//! placeholders posing as values.

use std::sync::Arc;

use tracing::{debug, error, info};
use veil_core::{scan_tokens, Error, RedactedDocument, Result};
use veil_vault::{MappingRecord, MappingVault};

use crate::types::RestoredDocument;

pub struct RestorationEngine {
    vault: Arc<MappingVault>,
}

impl RestorationEngine {
    pub fn new(vault: Arc<MappingVault>) -> Self {
        Self { vault }
    }

    /// Restore text produced by a redaction of `session_id`.
    ///
    /// The mapping is only read, so a session can be restored any number of
    /// times until it expires or is invalidated.
    pub async fn restore(&self, session_id: &str, text: &str) -> Result<RestoredDocument> {
        let record = self.vault.get(session_id).await?;
        let restored = substitute_back(&record, text)?;
        debug!(
            session_id = %session_id,
            "Restored document using {} mapped tokens",
            record.entries.len()
        );
        Ok(RestoredDocument { text: restored })
    }

    pub async fn restore_document(&self, document: &RedactedDocument) -> Result<RestoredDocument> {
        self.restore(&document.session_id, &document.text).await
    }

    /// The session's token -> value mapping, without a document.
    ///
    /// Like `restore`, this does not consume the mapping. Every call is
    /// recorded as a security event since it discloses all values at once.
    pub async fn reveal(&self, session_id: &str) -> Result<MappingRecord> {
        let record = self.vault.get(session_id).await?;
        info!(
            target: "veil::security",
            session_id = %session_id,
            "Revealed {} mapped values",
            record.entries.len()
        );
        Ok(record)
    }
}

fn substitute_back(record: &MappingRecord, text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    for found in scan_tokens(text) {
        let Some(value) = record.lookup(found.text) else {
            error!(
                target: "veil::security",
                session_id = %record.session_id,
                token = %found.text,
                "Token not present in session mapping"
            );
            return Err(Error::UnknownToken(found.text.to_string()));
        };
        out.push_str(&text[cursor..found.start]);
        out.push_str(value);
        cursor = found.end;
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record(pairs: &[(&str, &str)]) -> MappingRecord {
        MappingRecord {
            session_id: "s1".into(),
            created_at: Utc::now(),
            entries: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_substitute_back() {
        let rec = record(&[
            ("[PERSON_1]", "John Smith"),
            ("[EMAIL_1]", "john@example.com"),
        ]);
        let out = substitute_back(&rec, "Contact [PERSON_1] at [EMAIL_1]. Bye [PERSON_1]!").unwrap();
        assert_eq!(
            out,
            "Contact John Smith at john@example.com. Bye John Smith!"
        );
    }

    #[test]
    fn test_values_are_not_rescanned() {
        // A restored value that looks like a token stays as-is.
        let rec = record(&[("[PERSON_1]", "[PERSON_2]"), ("[PERSON_2]", "Bob")]);
        let out = substitute_back(&rec, "[PERSON_1]").unwrap();
        assert_eq!(out, "[PERSON_2]");
    }

    #[test]
    fn test_unknown_token_aborts() {
        let rec = record(&[("[PERSON_1]", "John Smith")]);
        let err = substitute_back(&rec, "[PERSON_1] and [PERSON_2]").unwrap_err();
        assert!(matches!(err, Error::UnknownToken(ref t) if t == "[PERSON_2]"));
    }

    #[test]
    fn test_non_token_brackets_pass_through() {
        let rec = record(&[]);
        let text = "see [1], [NOTE_2] and [PERSON]";
        assert_eq!(substitute_back(&rec, text).unwrap(), text);
    }
}
