//! Mollie Connect configuration.
//!
//! Loads OAuth client credentials and token handling settings from
//! environment variables with development defaults.

use crate::error::{PaymentError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Duration;
use std::env;

/// Scopes requested from organizers when they connect their account.
pub const DEFAULT_SCOPES: &[&str] = &[
    "payments.read",
    "payments.write",
    "refunds.read",
    "refunds.write",
    "onboarding.read",
    "organizations.read",
    "profiles.read",
];

/// Key used when `MOLLIE_TOKEN_ENCRYPTION_KEY` is unset. Development only.
const DEV_TOKEN_KEY: [u8; 32] = *b"kassa-dev-token-encryption-key32";

/// Mollie OAuth application configuration.
#[derive(Debug, Clone)]
pub struct MollieConfig {
    /// OAuth client id of the platform's Mollie app
    pub client_id: String,
    /// OAuth client secret of the platform's Mollie app
    pub client_secret: String,
    /// Callback URL registered with Mollie
    pub redirect_uri: String,
    /// Authorization endpoint organizers are sent to
    pub authorize_url: String,
    /// Scopes requested on connect
    pub scopes: Vec<String>,
    /// Base64 encoded 32-byte AES-256 key for tokens at rest.
    ///
    /// `None` falls back to a fixed development key.
    pub token_encryption_key: Option<String>,
    /// Create payments in test mode
    pub testmode: bool,
    /// Refresh access tokens this many seconds before they expire (default: 300)
    pub refresh_margin_secs: i64,
    /// Lifetime of a connect state parameter in seconds (default: 600)
    pub state_ttl_secs: i64,
}

impl MollieConfig {
    /// Create a configuration with default endpoints and scopes.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url: "https://my.mollie.com/oauth2/authorize".to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            token_encryption_key: None,
            testmode: true,
            refresh_margin_secs: 300,
            state_ttl_secs: 600,
        }
    }

    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new(
            env::var("MOLLIE_CLIENT_ID").unwrap_or_else(|_| "app_dev".to_string()),
            env::var("MOLLIE_CLIENT_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            env::var("MOLLIE_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:3000/api/mollie/callback".to_string()),
        );
        if let Ok(url) = env::var("MOLLIE_AUTHORIZE_URL") {
            config.authorize_url = url;
        }
        if let Ok(scopes) = env::var("MOLLIE_SCOPES") {
            config.scopes = scopes.split_whitespace().map(str::to_string).collect();
        }
        config.token_encryption_key = env::var("MOLLIE_TOKEN_ENCRYPTION_KEY").ok();
        config.testmode = env::var("MOLLIE_TESTMODE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);
        config.refresh_margin_secs = env::var("MOLLIE_REFRESH_MARGIN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);
        config.state_ttl_secs = env::var("MOLLIE_STATE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(600);
        config
    }

    /// Set the token encryption key (base64, 32 bytes decoded).
    #[must_use]
    pub fn with_encryption_key(mut self, key_base64: String) -> Self {
        self.token_encryption_key = Some(key_base64);
        self
    }

    /// Decode the token encryption key.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Configuration`] if the key is not valid base64
    /// or does not decode to exactly 32 bytes.
    pub fn encryption_key_bytes(&self) -> Result<[u8; 32]> {
        let Some(encoded) = &self.token_encryption_key else {
            tracing::warn!("MOLLIE_TOKEN_ENCRYPTION_KEY not set, using development key");
            return Ok(DEV_TOKEN_KEY);
        };
        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
            PaymentError::Configuration(format!("token encryption key is not base64: {e}"))
        })?;
        <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
            PaymentError::Configuration(format!(
                "token encryption key must be 32 bytes, got {}",
                bytes.len()
            ))
        })
    }

    /// How long before expiry an access token is refreshed.
    #[must_use]
    pub fn refresh_margin(&self) -> Duration {
        Duration::seconds(self.refresh_margin_secs)
    }

    /// How long a connect state parameter stays valid.
    #[must_use]
    pub fn state_ttl(&self) -> Duration {
        Duration::seconds(self.state_ttl_secs)
    }

    /// Scopes joined the way the authorize endpoint expects them.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> MollieConfig {
        MollieConfig::new(
            "app_test".into(),
            "secret".into(),
            "https://kassa.test/callback".into(),
        )
    }

    #[test]
    fn missing_key_falls_back_to_development_key() {
        assert_eq!(config().encryption_key_bytes().unwrap(), DEV_TOKEN_KEY);
    }

    #[test]
    fn key_must_decode_to_32_bytes() {
        let short = config().with_encryption_key(STANDARD.encode([7u8; 16]));
        assert!(matches!(
            short.encryption_key_bytes(),
            Err(PaymentError::Configuration(_))
        ));

        let garbage = config().with_encryption_key("not base64!!".into());
        assert!(garbage.encryption_key_bytes().is_err());

        let good = config().with_encryption_key(STANDARD.encode([7u8; 32]));
        assert_eq!(good.encryption_key_bytes().unwrap(), [7u8; 32]);
    }

    #[test]
    fn scopes_are_space_separated() {
        let mut config = config();
        config.scopes = vec!["payments.read".into(), "payments.write".into()];
        assert_eq!(config.scope_param(), "payments.read payments.write");
    }
}
