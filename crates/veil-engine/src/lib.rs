//! Veil Engine — redaction and restoration pipelines.
//!
//! `RedactionEngine` runs the detectors, merges their spans, tokenizes the
//! entities under a fresh `TokenSession` and persists the mapping.
//! `RestorationEngine` reads the mapping back and substitutes tokens with
//! the original values.

pub mod redact;
pub mod restore;
pub mod session;
pub mod tokens;
pub mod types;

pub use redact::RedactionEngine;
pub use restore::RestorationEngine;
pub use session::SessionGuard;
pub use tokens::TokenSession;
pub use types::{Redaction, RedactionStage, RestoredDocument};
