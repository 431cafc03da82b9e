//! Detector capability trait.
//!
//! Implementations:
//! - `PatternDetector`: compiled regex patterns, fixed confidence 1.0
//! - `SemanticDetector`: model-assisted, variable confidence, may be noisy

use async_trait::async_trait;
use veil_core::{DetectorKind, EntityKind, IndexedText, Result, Span};

/// A source of candidate PII spans.
///
/// Each call is independent and returns a finite set of spans for the given
/// text. Spans must only carry kinds from `kinds`.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Which variant this is. Used for merge priority and failure reporting.
    fn kind(&self) -> DetectorKind;

    /// Detect candidate spans in `text`, restricted to `kinds`.
    async fn detect(&self, text: &IndexedText<'_>, kinds: &[EntityKind]) -> Result<Vec<Span>>;
}
