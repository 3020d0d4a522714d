//! QR payload signing.
//!
//! A payload reads `{ticket_id}.{secret}.{signature}` where the signature is
//! `base64url(HMAC-SHA256(key, "{ticket_id}.{secret}"))`. Neither a UUID nor
//! a base64url string contains a `.`, so the payload splits unambiguously.

use crate::error::{Result, TicketingError};
use crate::types::TicketId;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Bytes of randomness in a ticket secret.
pub const SECRET_BYTES: usize = 32;

/// Generate a fresh ticket secret: 32 random bytes, base64url without padding.
#[must_use]
pub fn generate_ticket_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A payload whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload {
    /// Ticket the payload names
    pub ticket_id: TicketId,
    /// Secret the payload carries
    pub secret: String,
}

/// Signs and verifies QR payloads with one HMAC key.
#[derive(Clone)]
pub struct QrSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for QrSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrSigner").finish_non_exhaustive()
    }
}

impl QrSigner {
    /// Create a signer from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::Internal`] if the secret is empty.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(TicketingError::Internal("QR signing secret is empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| TicketingError::Internal(format!("invalid QR signing key: {e}")))?;
        Ok(Self { mac })
    }

    fn tag(&self, ticket_id: TicketId, secret: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(ticket_id.to_string().as_bytes());
        mac.update(b".");
        mac.update(secret.as_bytes());
        mac
    }

    /// Build the payload encoded into a ticket's QR code.
    #[must_use]
    pub fn sign(&self, ticket_id: TicketId, secret: &str) -> String {
        let signature = self.tag(ticket_id, secret).finalize().into_bytes();
        format!("{ticket_id}.{secret}.{}", URL_SAFE_NO_PAD.encode(signature))
    }

    /// Check a scanned payload. Returns `None` for anything malformed or
    /// forged; the signature comparison is constant-time.
    #[must_use]
    pub fn verify(&self, payload: &str) -> Option<VerifiedPayload> {
        let (signed, signature) = payload.trim().rsplit_once('.')?;
        let (ticket_id, secret) = signed.split_once('.')?;
        let ticket_id: TicketId = ticket_id.parse().ok()?;
        if secret.is_empty() {
            return None;
        }
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        self.tag(ticket_id, secret).verify_slice(&signature).ok()?;
        Some(VerifiedPayload {
            ticket_id,
            secret: secret.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signer() -> QrSigner {
        QrSigner::new(b"test-qr-secret").unwrap()
    }

    #[test]
    fn signed_payload_verifies() {
        let id = TicketId::new();
        let secret = generate_ticket_secret();
        let payload = signer().sign(id, &secret);

        assert_eq!(payload.matches('.').count(), 2);
        let verified = signer().verify(&payload).unwrap();
        assert_eq!(verified.ticket_id, id);
        assert_eq!(verified.secret, secret);
    }

    #[test]
    fn secrets_are_43_char_base64url() {
        let a = generate_ticket_secret();
        let b = generate_ticket_secret();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tampering_is_detected() {
        let id = TicketId::new();
        let payload = signer().sign(id, "abc");

        let other_id = payload.replacen(&id.to_string(), &TicketId::new().to_string(), 1);
        assert!(signer().verify(&other_id).is_none());

        let other_secret = payload.replacen(".abc.", ".abd.", 1);
        assert!(signer().verify(&other_secret).is_none());

        let other_key = QrSigner::new(b"another-secret").unwrap();
        assert!(other_key.verify(&payload).is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        let no_secret = format!("{}..", TicketId::new());
        for payload in ["", "...", "not-a-uuid.abc.def", "abc", no_secret.as_str()] {
            assert!(signer().verify(payload).is_none(), "{payload:?}");
        }
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(QrSigner::new(b"").is_err());
    }
}
