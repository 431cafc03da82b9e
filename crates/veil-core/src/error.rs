//! Error types for Veil.

use thiserror::Error;

use crate::types::DetectorKind;

#[derive(Error, Debug)]
pub enum Error {
    /// One detector errored or timed out. Absorbed by the redaction pipeline.
    #[error("Detector {detector} failed: {reason}")]
    DetectorFailure { detector: DetectorKind, reason: String },

    /// Internal span reconciliation problem. Never returned to callers.
    #[error("Merge conflict: {0}")]
    MergeConflict(String),

    #[error("Vault write error: {0}")]
    VaultWrite(String),

    #[error("Vault read error: {0}")]
    VaultRead(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already in use: {0}")]
    SessionConflict(String),

    #[error("Decryption failed for session {session_id}: {reason}")]
    Decryption { session_id: String, reason: String },

    #[error("Unknown token in text: {0}")]
    UnknownToken(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure is transient storage trouble worth retrying later.
    ///
    /// Everything else marks the request itself as invalid.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VaultWrite(_) | Error::VaultRead(_))
    }

    /// Whether the failure should be treated as a security event.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Error::Decryption { .. } | Error::UnknownToken(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
