//! Veil Detect — PII detectors and span reconciliation.
//!
//! Provides the `Detector` trait with two implementations:
//! `PatternDetector` (regex, deterministic) and `SemanticDetector`
//! (LLM-assisted, via the `EntityModel` trait). `SpanMerger` turns the
//! candidates of all detectors into one disjoint, ordered entity list.

pub mod detector;
pub mod merge;
pub mod model;
pub mod pattern;
pub mod semantic;

pub use detector::Detector;
pub use merge::SpanMerger;
pub use model::LlmEntityModel;
pub use pattern::PatternDetector;
pub use semantic::{EntityModel, ModelEntity, SemanticDetector};

use std::sync::Arc;

use veil_core::{DetectorConfig, Result};

/// Build the detectors enabled by configuration.
///
/// A semantic detector requested without model settings is skipped with a
/// warning; the pattern detector still runs.
pub fn create_detectors(config: &DetectorConfig) -> Result<Vec<Arc<dyn Detector>>> {
    let mut detectors: Vec<Arc<dyn Detector>> = Vec::new();

    if config.enable_pattern {
        detectors.push(Arc::new(PatternDetector::new()));
    }

    if config.enable_semantic {
        match &config.semantic {
            Some(model_config) => {
                tracing::info!(
                    "Semantic detection enabled ({} / {})",
                    model_config.provider,
                    model_config.model
                );
                let model = LlmEntityModel::new(model_config.clone(), config.timeout)?;
                detectors.push(Arc::new(SemanticDetector::new(Arc::new(model))));
            }
            None => {
                tracing::warn!("Semantic detection requested but no model configured, skipping");
            }
        }
    }

    if detectors.is_empty() {
        tracing::warn!("No detectors enabled. Only existing token literals will be redacted.");
    }

    Ok(detectors)
}
