//! Redaction pipeline.
//!
//! Stages: extract token literals already in the text, run detectors
//! concurrently, merge spans, assign tokens, rebuild the text, persist the
//! mapping. Persistence is last, so a failure at any earlier stage leaves
//! nothing behind in the vault.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;
use veil_core::config::{DEFAULT_DETECTOR_TIMEOUT_MS, DEFAULT_MAPPING_TTL_SECS};
use veil_core::{
    scan_tokens, DetectorKind, EntityKind, Error, IndexedText, MergedEntity, RedactedDocument,
    Result, Severity, Span, VeilConfig,
};
use veil_detect::{create_detectors, Detector, SpanMerger};
use veil_vault::MappingVault;

use crate::session::SessionGuard;
use crate::tokens::TokenSession;
use crate::types::{Redaction, RedactionStage};

pub struct RedactionEngine {
    detectors: Vec<Arc<dyn Detector>>,
    vault: Arc<MappingVault>,
    severity: Severity,
    detector_timeout: Duration,
    ttl: Duration,
    sessions: SessionGuard,
}

impl RedactionEngine {
    pub fn new(detectors: Vec<Arc<dyn Detector>>, vault: Arc<MappingVault>) -> Self {
        Self {
            detectors,
            vault,
            severity: Severity::default(),
            detector_timeout: Duration::from_millis(DEFAULT_DETECTOR_TIMEOUT_MS),
            ttl: Duration::from_secs(DEFAULT_MAPPING_TTL_SECS),
            sessions: SessionGuard::new(),
        }
    }

    /// Engine with the detectors, severity, timeout and TTL from configuration.
    pub fn from_config(config: &VeilConfig, vault: Arc<MappingVault>) -> Result<Self> {
        let detectors = create_detectors(&config.detectors)?;
        Ok(Self::new(detectors, vault)
            .with_severity(config.detectors.severity)
            .with_detector_timeout(config.detectors.timeout)
            .with_ttl(config.mapping_ttl))
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_detector_timeout(mut self, timeout: Duration) -> Self {
        self.detector_timeout = timeout;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Redact under a freshly generated session id.
    pub async fn redact(&self, text: &str) -> Result<Redaction> {
        self.redact_at(text, self.severity).await
    }

    /// Redact at a severity chosen for this request instead of the engine's.
    pub async fn redact_at(&self, text: &str, severity: Severity) -> Result<Redaction> {
        let session_id = Uuid::new_v4().to_string();
        self.redact_with_session_at(text, &session_id, severity).await
    }

    /// Redact under a caller-chosen session id.
    ///
    /// Fails with `SessionConflict` if the id is being redacted right now or
    /// already has a stored mapping.
    pub async fn redact_with_session(&self, text: &str, session_id: &str) -> Result<Redaction> {
        self.redact_with_session_at(text, session_id, self.severity).await
    }

    pub async fn redact_with_session_at(
        &self,
        text: &str,
        session_id: &str,
        severity: Severity,
    ) -> Result<Redaction> {
        if session_id.trim().is_empty() {
            return Err(Error::Config("Session id must not be empty".into()));
        }
        let _claim = self.sessions.claim(session_id)?;

        let mut stage = RedactionStage::Extracting;
        let result = self.run(text, session_id, severity, &mut stage).await;
        match &result {
            Ok(redaction) => info!(
                session_id = %session_id,
                "Redacted {} entities across {} kinds at severity {}{}",
                redaction.entity_count,
                redaction.counts.len(),
                severity,
                if redaction.is_degraded() { ", degraded" } else { "" }
            ),
            Err(e) => {
                let failed_at = stage;
                advance(&mut stage, RedactionStage::Failed, session_id);
                warn!(
                    session_id = %session_id,
                    "Redaction failed while {}: {}",
                    failed_at,
                    e
                );
            }
        }
        result
    }

    async fn run(
        &self,
        text: &str,
        session_id: &str,
        severity: Severity,
        stage: &mut RedactionStage,
    ) -> Result<Redaction> {
        let indexed = IndexedText::new(text);
        let mut candidates = literal_token_spans(&indexed);

        advance(stage, RedactionStage::Detecting, session_id);
        let kinds = severity.kinds();
        let failed_detectors = if kinds.is_empty() {
            Vec::new()
        } else {
            let (spans, failed) = self.detect_all(&indexed, kinds).await;
            candidates.extend(spans);
            failed
        };

        advance(stage, RedactionStage::Merging, session_id);
        let entities = SpanMerger::merge(&indexed, candidates);
        debug_assert!(SpanMerger::validate(&entities).is_ok());

        advance(stage, RedactionStage::Tokenizing, session_id);
        let mut tokens = TokenSession::new();
        let redacted = substitute(&indexed, &entities, &mut tokens)?;

        advance(stage, RedactionStage::Persisting, session_id);
        self.vault.put(session_id, tokens.entries(), self.ttl).await?;

        advance(stage, RedactionStage::Done, session_id);
        let mut counts: BTreeMap<EntityKind, usize> = BTreeMap::new();
        for entity in &entities {
            *counts.entry(entity.span.label).or_insert(0) += 1;
        }

        Ok(Redaction {
            document: RedactedDocument {
                session_id: session_id.to_string(),
                text: redacted,
            },
            entity_count: entities.len(),
            counts,
            failed_detectors,
        })
    }

    /// Run every detector concurrently, each bounded by the detector timeout.
    ///
    /// A detector that errors or times out contributes nothing and is
    /// reported in the returned failure list.
    async fn detect_all(
        &self,
        text: &IndexedText<'_>,
        kinds: &[EntityKind],
    ) -> (Vec<Span>, Vec<DetectorKind>) {
        let timeout = self.detector_timeout;
        let runs = self.detectors.iter().map(|detector| async move {
            let outcome = tokio::time::timeout(timeout, detector.detect(text, kinds)).await;
            (detector.kind(), outcome)
        });

        let mut spans = Vec::new();
        let mut failed = Vec::new();
        for (kind, outcome) in join_all(runs).await {
            match outcome {
                Ok(Ok(found)) => {
                    debug!("{} detector returned {} spans", kind, found.len());
                    spans.extend(found.into_iter().filter(|s| kinds.contains(&s.label)));
                }
                Ok(Err(e)) => {
                    warn!("{} detector failed, continuing without it: {}", kind, e);
                    failed.push(kind);
                }
                Err(_) => {
                    warn!(
                        "{} detector timed out after {:?}, continuing without it",
                        kind, timeout
                    );
                    failed.push(kind);
                }
            }
        }
        (spans, failed)
    }
}

fn advance(stage: &mut RedactionStage, next: RedactionStage, session_id: &str) {
    debug!(session_id = %session_id, "Redaction stage {} -> {}", stage, next);
    *stage = next;
}

/// Token-shaped literals already present in the input.
///
/// They are redacted like any other entity, so restoration never confuses
/// them with tokens minted for this session.
fn literal_token_spans(text: &IndexedText<'_>) -> Vec<Span> {
    scan_tokens(text.as_str())
        .into_iter()
        .filter_map(|m| {
            let range = text.char_range(m.start, m.end)?;
            Some(Span::new(
                range.start,
                range.end,
                m.kind,
                1.0,
                DetectorKind::Pattern,
            ))
        })
        .collect()
}

/// Rebuild the text in one pass, replacing each entity with its token.
fn substitute(
    text: &IndexedText<'_>,
    entities: &[MergedEntity],
    tokens: &mut TokenSession,
) -> Result<String> {
    let raw = text.as_str();
    let mut out = String::with_capacity(raw.len());
    let mut cursor = 0usize;

    for entity in entities {
        let range = text
            .byte_range(entity.span.start, entity.span.end)
            .filter(|r| r.start >= cursor)
            .ok_or_else(|| {
                Error::MergeConflict(format!(
                    "entity [{}, {}) is out of order or out of range",
                    entity.span.start, entity.span.end
                ))
            })?;
        out.push_str(&raw[cursor..range.start]);
        out.push_str(&tokens.assign(entity).to_string());
        cursor = range.end;
    }
    out.push_str(&raw[cursor..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(text: &IndexedText<'_>, start: usize, end: usize, kind: EntityKind) -> MergedEntity {
        MergedEntity {
            span: Span::new(start, end, kind, 1.0, DetectorKind::Pattern),
            value: text.slice(start, end).unwrap().to_string(),
        }
    }

    #[test]
    fn test_substitute_single_pass() {
        let text = IndexedText::new("Contact John Smith at john@example.com");
        let entities = vec![
            entity(&text, 8, 18, EntityKind::Person),
            entity(&text, 22, 38, EntityKind::Email),
        ];
        let mut tokens = TokenSession::new();
        let out = substitute(&text, &entities, &mut tokens).unwrap();
        assert_eq!(out, "Contact [PERSON_1] at [EMAIL_1]");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_substitute_multibyte() {
        let text = IndexedText::new("Zoë Müller → zoë@example.com");
        let entities = vec![
            entity(&text, 0, 10, EntityKind::Person),
            entity(&text, 13, 28, EntityKind::Email),
        ];
        let mut tokens = TokenSession::new();
        let out = substitute(&text, &entities, &mut tokens).unwrap();
        assert_eq!(out, "[PERSON_1] → [EMAIL_1]");
    }

    #[test]
    fn test_substitute_rejects_overlap() {
        let text = IndexedText::new("abcdefgh");
        let entities = vec![
            entity(&text, 0, 4, EntityKind::Person),
            entity(&text, 2, 6, EntityKind::Person),
        ];
        let mut tokens = TokenSession::new();
        assert!(matches!(
            substitute(&text, &entities, &mut tokens),
            Err(Error::MergeConflict(_))
        ));
    }

    #[test]
    fn test_literal_tokens_become_spans() {
        let text = IndexedText::new("née [PERSON_1] and [NOT_A_TOKEN]");
        let spans = literal_token_spans(&text);
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end), (4, 14));
        assert_eq!(spans[0].label, EntityKind::Person);
        assert_eq!(spans[0].source, DetectorKind::Pattern);
    }

    #[test]
    fn test_stage_order() {
        let stages = RedactionStage::all();
        assert_eq!(stages.first(), Some(&RedactionStage::Extracting));
        assert_eq!(stages.last(), Some(&RedactionStage::Done));
        assert_eq!(stages.len(), 6);
        assert!(!stages.contains(&RedactionStage::Failed));
        assert!(RedactionStage::Failed.is_terminal());
        assert!(RedactionStage::Done.is_terminal());
        assert!(!RedactionStage::Persisting.is_terminal());
    }
}
