//! Model-assisted detection for context-dependent PII (names, places, ...).
//!
//! The model only reports entity values and labels. This module locates each
//! value in the text and turns every occurrence into a span.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use veil_core::{DetectorKind, EntityKind, IndexedText, Result, Span};

use crate::detector::Detector;

/// Confidence assumed when the model does not report one.
pub const DEFAULT_MODEL_CONFIDENCE: f64 = 0.85;

/// An entity as reported by a model: the exact text plus a free-form label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntity {
    pub text: String,
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Text in, labelled entities out. The query mechanics live behind this trait.
#[async_trait]
pub trait EntityModel: Send + Sync {
    async fn find_entities(&self, text: &str, kinds: &[EntityKind]) -> Result<Vec<ModelEntity>>;
}

/// Detector backed by an `EntityModel`.
pub struct SemanticDetector {
    model: Arc<dyn EntityModel>,
}

impl SemanticDetector {
    pub fn new(model: Arc<dyn EntityModel>) -> Self {
        Self { model }
    }

    /// Convert model entities into spans over `text`.
    pub fn locate(
        text: &IndexedText<'_>,
        entities: &[ModelEntity],
        kinds: &[EntityKind],
    ) -> Vec<Span> {
        let raw = text.as_str();
        let mut seen: HashSet<(usize, usize, EntityKind)> = HashSet::new();
        let mut spans = Vec::new();

        for entity in entities {
            let Some(kind) = EntityKind::from_label(&entity.label) else {
                debug!(label = %entity.label, "Dropping entity with unmapped label");
                continue;
            };
            if !kinds.contains(&kind) || entity.text.trim().is_empty() {
                continue;
            }

            let confidence = clamp_confidence(entity.confidence);
            for (byte_start, matched) in raw.match_indices(entity.text.as_str()) {
                let byte_end = byte_start + matched.len();
                if !is_standalone(raw, byte_start, byte_end) {
                    continue;
                }
                let Some(range) = text.char_range(byte_start, byte_end) else {
                    continue;
                };
                if seen.insert((range.start, range.end, kind)) {
                    spans.push(Span::new(
                        range.start,
                        range.end,
                        kind,
                        confidence,
                        DetectorKind::Semantic,
                    ));
                }
            }
        }

        spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        spans
    }
}

#[async_trait]
impl Detector for SemanticDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Semantic
    }

    async fn detect(&self, text: &IndexedText<'_>, kinds: &[EntityKind]) -> Result<Vec<Span>> {
        if kinds.is_empty() || text.as_str().trim().is_empty() {
            return Ok(Vec::new());
        }
        let entities = self.model.find_entities(text.as_str(), kinds).await?;
        let spans = Self::locate(text, &entities, kinds);
        debug!(
            "Semantic detector: {} model entities -> {} candidate spans",
            entities.len(),
            spans.len()
        );
        Ok(spans)
    }
}

/// True when the match is not glued to letters or digits on either side.
/// A value found inside a longer word is a different word.
fn is_standalone(raw: &str, start: usize, end: usize) -> bool {
    let before = raw[..start].chars().next_back();
    let after = raw[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

fn clamp_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        Some(_) => 0.0,
        None => DEFAULT_MODEL_CONFIDENCE,
    }
}
