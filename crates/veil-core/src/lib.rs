//! Veil Core — shared types, character indexing, severity levels,
//! configuration and the error taxonomy.

pub mod config;
pub mod error;
pub mod severity;
pub mod text;
pub mod token;
pub mod types;

pub use config::{DetectorConfig, ModelProvider, SemanticModelConfig, VeilConfig};
pub use error::{Error, Result};
pub use severity::Severity;
pub use text::IndexedText;
pub use token::{scan_tokens, Token, TokenMatch};
pub use types::{DetectorKind, EntityKind, MergedEntity, RedactedDocument, Span};
