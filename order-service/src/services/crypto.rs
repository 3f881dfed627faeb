//! Field-level encryption for the order owner id.
//!
//! AES-256-GCM with a random 96-bit nonce per encryption. The at-rest
//! form is self-framed (`nonce || ciphertext+tag`) so it survives
//! database round-trips opaquely. A keyed SHA-256 digest provides a
//! deterministic lookup tag for equality queries without ever storing
//! the plaintext.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};

use service_core::error::AppError;

const NONCE_LEN: usize = 12;

/// Domain separator between the key and the plaintext in lookup digests.
const DIGEST_SEPARATOR: u8 = 0x1f;

#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
    key: [u8; 32],
}

impl FieldCipher {
    pub fn new(key: [u8; 32]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        Self { cipher, key }
    }

    /// Encrypt a plaintext into the self-framed at-rest form.
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("field encryption failed")))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);
        Ok(framed)
    }

    /// Decrypt the self-framed form. Fails on truncation, tampering, or
    /// a wrong key; tag verification covers all three.
    pub fn decrypt(&self, framed: &[u8]) -> Result<String, AppError> {
        if framed.len() <= NONCE_LEN {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "encrypted field is truncated"
            )));
        }

        let (nonce, ciphertext) = framed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("field decryption failed")))?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("decrypted field is not UTF-8")))
    }

    /// Deterministic keyed digest of a plaintext, used as an equality
    /// index. Without the key the digest reveals nothing about the
    /// plaintext beyond equality of rows.
    pub fn lookup_digest(&self, plaintext: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update([DIGEST_SEPARATOR]);
        hasher.update(plaintext.as_bytes());
        hasher.finalize().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new([42u8; 32])
    }

    #[test]
    fn encrypt_decrypt_round_trips() {
        let c = cipher();
        let framed = c.encrypt("1742").unwrap();
        assert_eq!(c.decrypt(&framed).unwrap(), "1742");
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let c = cipher();
        let a = c.encrypt("1742").unwrap();
        let b = c.encrypt("1742").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decryption_under_a_different_key_fails() {
        let framed = cipher().encrypt("1742").unwrap();
        let other = FieldCipher::new([43u8; 32]);
        assert!(other.decrypt(&framed).is_err());
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let c = cipher();
        let mut framed = c.encrypt("1742").unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0x01;
        assert!(c.decrypt(&framed).is_err());
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let c = cipher();
        assert!(c.decrypt(&[0u8; 4]).is_err());
        assert!(c.decrypt(&[0u8; NONCE_LEN]).is_err());
    }

    #[test]
    fn lookup_digest_is_deterministic_and_keyed() {
        let c = cipher();
        assert_eq!(c.lookup_digest("1742"), c.lookup_digest("1742"));
        assert_ne!(c.lookup_digest("1742"), c.lookup_digest("1743"));

        let other = FieldCipher::new([43u8; 32]);
        assert_ne!(c.lookup_digest("1742"), other.lookup_digest("1742"));
    }
}
