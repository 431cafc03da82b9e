//! Encrypted, expiring storage of token mappings.
//!
//! A record is stored as a JSON envelope whose `ciphertext` holds the sealed
//! token -> value map. The envelope carries everything needed to open it
//! except the master key.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use veil_core::config::DEFAULT_VAULT_TIMEOUT_MS;
use veil_core::{Error, Result, VeilConfig};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{self, MasterKey, Sealed};
use crate::redis_store::RedisStore;
use crate::store::{KvStore, StoreError};

pub const ENVELOPE_VERSION: u32 = 1;
const KEY_PREFIX: &str = "veil:mapping:";

/// Stored form of a mapping record.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    session_id: String,
    created_at: DateTime<Utc>,
    key_id: String,
    salt: String,
    nonce: String,
    ciphertext: String,
}

/// Decrypted mapping for one session. Values are wiped when dropped.
#[derive(Debug)]
pub struct MappingRecord {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    /// Token string -> original value.
    pub entries: BTreeMap<String, String>,
}

impl MappingRecord {
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(String::as_str)
    }
}

impl Drop for MappingRecord {
    fn drop(&mut self) {
        for value in self.entries.values_mut() {
            value.zeroize();
        }
    }
}

pub struct MappingVault {
    store: Arc<dyn KvStore>,
    master: MasterKey,
    timeout: Duration,
}

impl MappingVault {
    pub fn new(store: Arc<dyn KvStore>, master: MasterKey) -> Self {
        Self {
            store,
            master,
            timeout: Duration::from_millis(DEFAULT_VAULT_TIMEOUT_MS),
        }
    }

    /// Bound every store round trip.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Redis-backed vault using the configured URL, master key and timeout.
    pub fn from_config(config: &VeilConfig) -> Result<Self> {
        let encoded = config
            .master_key
            .as_deref()
            .ok_or_else(|| Error::Config("VEIL_MASTER_KEY is not set".into()))?;
        let master = MasterKey::from_base64(encoded)?;
        let store = RedisStore::open(&config.redis_url)?;
        info!(
            "Mapping vault using {} (key id {})",
            config.redis_url,
            master.key_id()
        );
        Ok(Self::new(Arc::new(store), master).with_timeout(config.vault_timeout))
    }

    pub fn key_id(&self) -> String {
        self.master.key_id()
    }

    /// Encrypt and store a session's mapping with an expiry.
    ///
    /// Fails with `SessionConflict` if a record already exists for the id.
    pub async fn put(
        &self,
        session_id: &str,
        entries: &BTreeMap<String, String>,
        ttl: Duration,
    ) -> Result<()> {
        if ttl.as_millis() == 0 {
            return Err(Error::Config("Mapping TTL must be at least 1ms".into()));
        }

        let plaintext = Zeroizing::new(serde_json::to_vec(entries)?);
        let sealed = crypto::seal(&self.master, session_id, &plaintext)?;
        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            key_id: sealed.key_id,
            salt: sealed.salt,
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext,
        };
        let blob = serde_json::to_vec(&envelope)?;

        let written = self
            .bounded(self.store.put_if_absent(&store_key(session_id), blob, ttl))
            .await
            .map_err(|e| Error::VaultWrite(e.to_string()))?;
        if !written {
            return Err(Error::SessionConflict(session_id.to_string()));
        }

        debug!(
            "Stored mapping for session {} ({} entries, ttl {:?})",
            session_id,
            entries.len(),
            ttl
        );
        Ok(())
    }

    /// Fetch and decrypt a session's mapping.
    pub async fn get(&self, session_id: &str) -> Result<MappingRecord> {
        let blob = self
            .bounded(self.store.get(&store_key(session_id)))
            .await
            .map_err(|e| Error::VaultRead(e.to_string()))?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        self.open_envelope(session_id, &blob).map_err(|e| {
            if let Error::Decryption { reason, .. } = &e {
                error!(
                    target: "veil::security",
                    session_id = %session_id,
                    "Mapping record failed integrity check: {}",
                    reason
                );
            }
            e
        })
    }

    /// Delete a session's mapping. Deleting an absent record is not an error.
    pub async fn invalidate(&self, session_id: &str) -> Result<()> {
        let removed = self
            .bounded(self.store.delete(&store_key(session_id)))
            .await
            .map_err(|e| Error::VaultWrite(e.to_string()))?;
        if removed {
            info!("Invalidated mapping for session {}", session_id);
        } else {
            debug!("No mapping to invalidate for session {}", session_id);
        }
        Ok(())
    }

    fn open_envelope(&self, session_id: &str, blob: &[u8]) -> Result<MappingRecord> {
        let fail = |reason: String| Error::Decryption {
            session_id: session_id.to_string(),
            reason,
        };

        let envelope: Envelope = serde_json::from_slice(blob)
            .map_err(|e| fail(format!("malformed envelope: {}", e)))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(fail(format!("unsupported envelope version {}", envelope.version)));
        }
        if envelope.session_id != session_id {
            return Err(fail("envelope belongs to a different session".into()));
        }

        let sealed = Sealed {
            key_id: envelope.key_id,
            salt: envelope.salt,
            nonce: envelope.nonce,
            ciphertext: envelope.ciphertext,
        };
        let plaintext = crypto::open(&self.master, session_id, &sealed)?;
        let entries: BTreeMap<String, String> = serde_json::from_slice(&plaintext)
            .map_err(|e| fail(format!("decrypted mapping is not valid: {}", e)))?;

        Ok(MappingRecord {
            session_id: envelope.session_id,
            created_at: envelope.created_at,
            entries,
        })
    }

    async fn bounded<T, F>(&self, op: F) -> std::result::Result<T, StoreError>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

/// Key under which a session's envelope is stored.
pub fn store_key(session_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, session_id)
}
