//! Session-scoped token assignment.
//!
//! A `TokenSession` is owned by exactly one redaction and mutated through
//! `&mut self`, so sequence numbers are minted against a consistent view of
//! what the session has already issued.

use std::collections::{BTreeMap, HashMap};

use veil_core::{EntityKind, MergedEntity, Token};

#[derive(Debug, Default)]
pub struct TokenSession {
    by_value: HashMap<String, Token>,
    next_seq: HashMap<EntityKind, u32>,
    /// Token string -> original value, the payload persisted to the vault.
    entries: BTreeMap<String, String>,
}

impl TokenSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for an entity, reusing the one already issued for an identical value.
    ///
    /// Lookup is an exact, case-sensitive match on the extracted text. A value
    /// seen first under one kind keeps that token even if it recurs under another.
    pub fn assign(&mut self, entity: &MergedEntity) -> Token {
        if let Some(token) = self.by_value.get(&entity.value) {
            return *token;
        }

        let seq = self.next_seq.entry(entity.span.label).or_insert(1);
        let token = Token::new(entity.span.label, *seq);
        *seq += 1;

        self.by_value.insert(entity.value.clone(), token);
        self.entries.insert(token.to_string(), entity.value.clone());
        token
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Number of distinct tokens issued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
