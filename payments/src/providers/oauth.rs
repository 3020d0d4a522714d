//! Mollie OAuth client trait.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Mollie's OAuth endpoints.
///
/// # Implementation Notes
///
/// - Token calls authenticate with the platform's client id and secret
/// - A refresh rejected with `invalid_grant` must map to
///   [`PaymentError::InvalidGrant`](crate::PaymentError::InvalidGrant) so the
///   connection can be flagged for reauthorization
#[async_trait]
pub trait MollieOAuthClient: Send + Sync {
    /// Exchange an authorization code for a token pair.
    ///
    /// # Errors
    ///
    /// Returns error if Mollie rejects the code or the request fails.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse>;

    /// Obtain a fresh access token from a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidGrant`](crate::PaymentError::InvalidGrant)
    /// if the refresh token was revoked, otherwise a transport or API error.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// Revoke a token.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    async fn revoke(&self, token: &str) -> Result<()>;

    /// Create a client link that signs up a new Mollie account and
    /// connects it in one go.
    ///
    /// # Errors
    ///
    /// Returns error if Mollie rejects the owner details.
    async fn create_client_link(&self, request: &ClientLinkRequest) -> Result<ClientLink>;
}

/// Token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// Bearer token for API calls
    pub access_token: String,
    /// Refresh token. Mollie may rotate it on refresh; `None` keeps the old one.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
    /// Granted scopes, space separated
    pub scope: String,
}

/// Owner details for a new Mollie account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLinkOwner {
    /// Owner e-mail
    pub email: String,
    /// Owner first name
    pub given_name: String,
    /// Owner last name
    pub family_name: String,
}

/// Request body for creating a client link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLinkRequest {
    /// Account owner
    pub owner: ClientLinkOwner,
    /// Legal name of the organization
    pub name: String,
    /// ISO 3166-1 alpha-2 country of the organization
    pub country: String,
}

/// A created client link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLink {
    /// Mollie id of the link
    pub id: String,
    /// Link the organizer follows; OAuth parameters are appended to it
    pub url: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn client_link_request_uses_camel_case() {
        let request = ClientLinkRequest {
            owner: ClientLinkOwner {
                email: "jan@example.nl".into(),
                given_name: "Jan".into(),
                family_name: "Jansen".into(),
            },
            name: "Poppodium Noord".into(),
            country: "NL".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["owner"]["givenName"], "Jan");
        assert_eq!(json["owner"]["familyName"], "Jansen");
    }
}
