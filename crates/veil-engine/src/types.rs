//! Engine types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use veil_core::{DetectorKind, EntityKind, RedactedDocument};

/// Redaction pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionStage {
    Extracting,
    Detecting,
    Merging,
    Tokenizing,
    Persisting,
    Done,
    /// Any stage can end here; nothing has been persisted.
    Failed,
}

impl RedactionStage {
    /// The successful path, in order. `Failed` is reachable from any of them.
    pub fn all() -> &'static [RedactionStage] {
        &[
            Self::Extracting,
            Self::Detecting,
            Self::Merging,
            Self::Tokenizing,
            Self::Persisting,
            Self::Done,
        ]
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for RedactionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Extracting => "extracting",
            Self::Detecting => "detecting",
            Self::Merging => "merging",
            Self::Tokenizing => "tokenizing",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of one redaction.
#[derive(Debug, Clone, Serialize)]
pub struct Redaction {
    #[serde(flatten)]
    pub document: RedactedDocument,
    #[serde(rename = "entityCount")]
    pub entity_count: usize,
    /// Entity occurrences per kind.
    #[serde(rename = "entityCounts")]
    pub counts: BTreeMap<EntityKind, usize>,
    /// Detectors that errored or timed out. Non-empty means a degraded run.
    #[serde(rename = "failedDetectors")]
    pub failed_detectors: Vec<DetectorKind>,
}

impl Redaction {
    pub fn session_id(&self) -> &str {
        &self.document.session_id
    }

    pub fn text(&self) -> &str {
        &self.document.text
    }

    pub fn is_degraded(&self) -> bool {
        !self.failed_detectors.is_empty()
    }
}

/// Output of restoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredDocument {
    #[serde(rename = "restoredText")]
    pub text: String,
}
