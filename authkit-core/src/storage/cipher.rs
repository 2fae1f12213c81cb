//! Software encryption layer for platforms without natively-encrypted storage.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};

use super::error::{StorageError, StorageResult};
use super::keys::KeyMaterial;

const NONCE_LEN: usize = 24;

/// XChaCha20-Poly1305 over a domain key, producing base64 strings that fit
/// the string-valued key-value backends.
///
/// Stored form: base64(nonce ‖ ciphertext).
pub struct StoreCipher {
    cipher: XChaCha20Poly1305,
}

impl StoreCipher {
    /// Builds a cipher over `key`.
    #[must_use]
    pub fn new(key: &KeyMaterial) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key.bytes())),
        }
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if the AEAD rejects the operation.
    pub fn encrypt(&self, plaintext: &str) -> StorageResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|err| StorageError::Crypto(err.to_string()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    /// Decrypts a stored value, returning `None` when `stored` is not a valid
    /// ciphertext under this key.
    ///
    /// Callers fall back to treating the stored value as plaintext, which
    /// tolerates pre-existing unencrypted records.
    #[must_use]
    pub fn decrypt(&self, stored: &str) -> Option<String> {
        let raw = STANDARD.decode(stored.as_bytes()).ok()?;
        if raw.len() <= NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}
