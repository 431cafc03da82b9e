//! Record encryption.
//!
//! Each record gets its own key: HKDF-SHA256 over the master key with a
//! random 16-byte salt and the session id in the info string. Payloads are
//! sealed with AES-256-GCM under a random 12-byte nonce, using the session
//! id as associated data so a record cannot be replayed under another id.
//! Derived keys live only for the duration of one seal/open call.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use veil_core::{Error, Result};
use zeroize::Zeroizing;

pub const MASTER_KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
const RECORD_KEY_LEN: usize = 32;
const KDF_INFO_PREFIX: &[u8] = b"veil/mapping/v1/";

/// Externally supplied master key. Zeroized on drop.
pub struct MasterKey {
    bytes: Zeroizing<[u8; MASTER_KEY_LEN]>,
}

impl MasterKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(Error::Config(format!(
                "Master key must be {} bytes, got {}",
                MASTER_KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; MASTER_KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Decode a base64-encoded key, as supplied through `VEIL_MASTER_KEY`.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| Error::Config(format!("Master key is not valid base64: {}", e)))?,
        );
        Self::from_bytes(&decoded)
    }

    /// Short public identifier: hex of the first 8 bytes of SHA-256(key).
    pub fn key_id(&self) -> String {
        let digest = Sha256::digest(self.bytes.as_slice());
        hex::encode(&digest[..8])
    }

    fn derive_record_key(&self, salt: &[u8], session_id: &str) -> Result<Zeroizing<[u8; RECORD_KEY_LEN]>> {
        let mut info = Vec::with_capacity(KDF_INFO_PREFIX.len() + session_id.len());
        info.extend_from_slice(KDF_INFO_PREFIX);
        info.extend_from_slice(session_id.as_bytes());

        let hk = Hkdf::<Sha256>::new(Some(salt), self.bytes.as_slice());
        let mut okm = Zeroizing::new([0u8; RECORD_KEY_LEN]);
        hk.expand(&info, okm.as_mut_slice())
            .map_err(|e| Error::Config(format!("Key derivation failed: {}", e)))?;
        Ok(okm)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("key_id", &self.key_id())
            .finish()
    }
}

/// Output of `seal`, base64-encoded for the stored envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub key_id: String,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// Encrypt `plaintext` for `session_id` under a freshly derived record key.
pub fn seal(master: &MasterKey, session_id: &str, plaintext: &[u8]) -> Result<Sealed> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce_bytes);

    let record_key = master.derive_record_key(&salt, session_id)?;
    let cipher = Aes256Gcm::new_from_slice(record_key.as_slice())
        .map_err(|e| Error::VaultWrite(format!("Cipher init failed: {}", e)))?;

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: session_id.as_bytes(),
            },
        )
        .map_err(|_| Error::VaultWrite("Encryption failed".into()))?;

    Ok(Sealed {
        key_id: master.key_id(),
        salt: STANDARD.encode(salt),
        nonce: STANDARD.encode(nonce_bytes),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Decrypt a sealed payload. Any integrity problem is a `Decryption` error.
pub fn open(master: &MasterKey, session_id: &str, sealed: &Sealed) -> Result<Zeroizing<Vec<u8>>> {
    let fail = |reason: &str| Error::Decryption {
        session_id: session_id.to_string(),
        reason: reason.to_string(),
    };

    if sealed.key_id != master.key_id() {
        return Err(fail("record was sealed under a different master key"));
    }

    let salt = STANDARD
        .decode(&sealed.salt)
        .map_err(|_| fail("salt is not valid base64"))?;
    let nonce_bytes = STANDARD
        .decode(&sealed.nonce)
        .map_err(|_| fail("nonce is not valid base64"))?;
    let ciphertext = STANDARD
        .decode(&sealed.ciphertext)
        .map_err(|_| fail("ciphertext is not valid base64"))?;

    if salt.len() != SALT_LEN || nonce_bytes.len() != NONCE_LEN {
        return Err(fail("salt or nonce has the wrong length"));
    }

    let record_key = master.derive_record_key(&salt, session_id)?;
    let cipher = Aes256Gcm::new_from_slice(record_key.as_slice())
        .map_err(|_| fail("cipher init failed"))?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &ciphertext,
                aad: session_id.as_bytes(),
            },
        )
        .map_err(|_| fail("integrity check failed"))?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> MasterKey {
        MasterKey::from_bytes(&[byte; MASTER_KEY_LEN]).unwrap()
    }

    #[test]
    fn test_seal_open_round_trip() {
        let master = key(7);
        let sealed = seal(&master, "session-a", b"{\"[PERSON_1]\":\"John\"}").unwrap();
        let opened = open(&master, "session-a", &sealed).unwrap();
        assert_eq!(opened.as_slice(), b"{\"[PERSON_1]\":\"John\"}");
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_seal() {
        let master = key(7);
        let a = seal(&master, "s", b"same").unwrap();
        let b = seal(&master, "s", b"same").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_wrong_session_fails() {
        let master = key(7);
        let sealed = seal(&master, "session-a", b"payload").unwrap();
        assert!(matches!(
            open(&master, "session-b", &sealed),
            Err(Error::Decryption { .. })
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal(&key(7), "s", b"payload").unwrap();
        let err = open(&key(8), "s", &sealed).unwrap_err();
        assert!(matches!(err, Error::Decryption { .. }));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let master = key(7);
        let mut sealed = seal(&master, "s", b"payload").unwrap();
        let mut raw = STANDARD.decode(&sealed.ciphertext).unwrap();
        raw[0] ^= 0x01;
        sealed.ciphertext = STANDARD.encode(raw);
        assert!(matches!(
            open(&master, "s", &sealed),
            Err(Error::Decryption { .. })
        ));
    }

    #[test]
    fn test_master_key_validation() {
        assert!(matches!(MasterKey::from_bytes(&[1u8; 16]), Err(Error::Config(_))));
        assert!(matches!(MasterKey::from_base64("not base64!!"), Err(Error::Config(_))));
        let encoded = STANDARD.encode([3u8; MASTER_KEY_LEN]);
        let master = MasterKey::from_base64(&encoded).unwrap();
        assert_eq!(master.key_id().len(), 16);
        assert!(!format!("{:?}", master).contains(&encoded));
    }
}
