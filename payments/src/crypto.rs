//! Encryption of OAuth tokens at rest.
//!
//! Tokens are sealed with AES-256-GCM under a fresh random 96-bit nonce.
//! The sealed form is `base64url(nonce) "." base64url(ciphertext)`, so a
//! single string column is enough to store one token.

use crate::error::{PaymentError, Result};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::sync::Arc;

const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for access and refresh tokens.
///
/// Cloning shares the cipher. Every [`seal`](Self::seal) draws its own
/// nonce, so clones never reuse one.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Arc<Aes256Gcm>,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Create a cipher from a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Encryption`] if the key is not 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| {
            PaymentError::Encryption(format!("AES-256-GCM needs a 32 byte key: {e}"))
        })?;
        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }

    /// Encrypt a token.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Encryption`] if encryption fails.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| PaymentError::Encryption(format!("encryption failed: {e}")))?;
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(nonce),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    /// Decrypt a token produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Encryption`] if the input is malformed, was
    /// sealed under another key, or was tampered with.
    pub fn open(&self, sealed: &str) -> Result<String> {
        let (nonce_part, ciphertext_part) = sealed
            .split_once('.')
            .ok_or_else(|| PaymentError::Encryption("sealed token has no nonce".to_string()))?;
        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(nonce_part)
            .map_err(|e| PaymentError::Encryption(format!("bad nonce encoding: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(PaymentError::Encryption(
                "invalid nonce length (expected 12 bytes)".to_string(),
            ));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_part)
            .map_err(|e| PaymentError::Encryption(format!("bad ciphertext encoding: {e}")))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|e| PaymentError::Encryption(format!("decryption failed: {e}")))?;
        String::from_utf8(plaintext)
            .map_err(|e| PaymentError::Encryption(format!("token is not UTF-8: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sealed_token_opens_to_the_original() {
        let cipher = TokenCipher::new(&[1u8; 32]).unwrap();
        let sealed = cipher.seal("access_abc123").unwrap();
        assert!(!sealed.contains("access_abc123"));
        assert_eq!(cipher.open(&sealed).unwrap(), "access_abc123");
    }

    #[test]
    fn same_plaintext_gets_a_fresh_nonce() {
        let cipher = TokenCipher::new(&[1u8; 32]).unwrap();
        assert_ne!(cipher.seal("token").unwrap(), cipher.seal("token").unwrap());
    }

    #[test]
    fn wrong_key_cannot_open() {
        let sealed = TokenCipher::new(&[1u8; 32]).unwrap().seal("token").unwrap();
        let other = TokenCipher::new(&[2u8; 32]).unwrap();
        assert!(matches!(other.open(&sealed), Err(PaymentError::Encryption(_))));
    }

    #[test]
    fn tampering_is_detected() {
        let cipher = TokenCipher::new(&[1u8; 32]).unwrap();
        let sealed = cipher.seal("token").unwrap();
        let (nonce, body) = sealed.split_once('.').unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(body).unwrap();
        bytes[0] ^= 0x01;
        let forged = format!("{nonce}.{}", URL_SAFE_NO_PAD.encode(bytes));
        assert!(cipher.open(&forged).is_err());
        assert!(cipher.open("no-separator").is_err());
    }

    #[test]
    fn rejects_short_keys() {
        assert!(TokenCipher::new(&[0u8; 16]).is_err());
    }
}
