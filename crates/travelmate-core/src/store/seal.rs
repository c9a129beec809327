//! At-rest sealing for the credential file.
//!
//! Sealed bytes are `nonce (12 bytes) || ciphertext`. The associated data
//! pins the ciphertext to this file format so a sealed blob from some other
//! use of the same key is rejected.

use anyhow::{anyhow, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};

const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

const AAD: &[u8] = b"travelmate-credentials:v1";

/// 32-byte symmetric key for the credential file.
#[derive(Clone)]
pub struct SealKey([u8; KEY_LEN]);

impl SealKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse the hex form kept in the keychain.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let decoded = hex::decode(encoded.trim()).map_err(|e| anyhow!("Invalid seal key: {e}"))?;
        let bytes: [u8; KEY_LEN] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| anyhow!("Seal key must be {} bytes, got {}", KEY_LEN, v.len()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl std::fmt::Debug for SealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealKey(..)")
    }
}

pub fn seal(key: &SealKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: AAD,
            },
        )
        .map_err(|e| anyhow!("Encryption failure: {e}"))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

pub fn open(key: &SealKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(anyhow!("Invalid ciphertext length"));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

    key.cipher()
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: AAD,
            },
        )
        .map_err(|e| anyhow!("Decryption failure: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_recovers_sealed_bytes() {
        let key = SealKey::from_bytes([7u8; KEY_LEN]);
        let sealed = seal(&key, b"{\"token\":\"abc\"}").unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"{\"token\":\"abc\"}");
        assert_eq!(open(&key, &sealed).unwrap(), b"{\"token\":\"abc\"}");
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let sealed = seal(&SealKey::from_bytes([1u8; KEY_LEN]), b"secret").unwrap();
        assert!(open(&SealKey::from_bytes([2u8; KEY_LEN]), &sealed).is_err());
    }

    #[test]
    fn test_open_rejects_short_input() {
        let key = SealKey::generate();
        assert!(open(&key, &[0u8; 4]).is_err());
    }

    #[test]
    fn test_hex_form_survives_keychain_storage() {
        let key = SealKey::generate();
        let parsed = SealKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(parsed.0, key.0);
        assert!(SealKey::from_hex("abc").is_err());
        assert!(SealKey::from_hex(&"zz".repeat(KEY_LEN)).is_err());
        assert!(SealKey::from_hex(&"ab".repeat(KEY_LEN - 1)).is_err());
        assert!(SealKey::from_hex(&"é".repeat(KEY_LEN)).is_err());
        assert_eq!(key.to_hex().len(), KEY_LEN * 2);
    }
}
