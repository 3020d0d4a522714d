//! Configuration management for the ticketing application.
//!
//! Loads configuration from environment variables with development defaults.

use crate::pricing::ServiceFeeConfig;
use crate::types::Money;
use chrono::Duration;
use kassa_payments::MollieConfig;
use serde::{Deserialize, Serialize};
use std::env;

/// Development QR signing secret, used when `QR_SIGNING_SECRET` is unset.
const DEV_QR_SECRET: &str = "kassa-dev-qr-signing-secret";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Process settings
    pub server: ServerConfig,
    /// Buyer-side fees and reservation timing
    pub pricing: PricingConfig,
    /// Ticket signing
    pub tickets: TicketConfig,
    /// Mollie Connect OAuth application
    pub mollie: MollieConfig,
}

/// Process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Public URL buyers return to after paying
    pub public_base_url: String,
}

/// Service fee components and the order reservation window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Fixed platform component in cents, VAT excluded (default: 35)
    pub platform_fixed_cents: u64,
    /// Percentage platform component in basis points (default: 200)
    pub platform_percentage_bp: u32,
    /// Fixed processor component in cents, VAT excluded (default: 29)
    pub processor_fixed_cents: u64,
    /// Minutes a PENDING order holds its tickets (default: 15)
    pub order_ttl_minutes: i64,
}

/// Ticket signing configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TicketConfig {
    /// HMAC key for QR payloads
    pub qr_signing_secret: String,
}

impl std::fmt::Debug for TicketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketConfig")
            .field("qr_signing_secret", &"<redacted>")
            .finish()
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let fees = ServiceFeeConfig::default();
        Self {
            platform_fixed_cents: fees.platform_fixed.cents(),
            platform_percentage_bp: fees.platform_percentage_bp,
            processor_fixed_cents: fees.processor_fixed.cents(),
            order_ttl_minutes: 15,
        }
    }
}

impl PricingConfig {
    /// Fee components as the pricing functions take them.
    #[must_use]
    pub const fn service_fee_config(&self) -> ServiceFeeConfig {
        ServiceFeeConfig {
            platform_fixed: Money::from_cents(self.platform_fixed_cents),
            platform_percentage_bp: self.platform_percentage_bp,
            processor_fixed: Money::from_cents(self.processor_fixed_cents),
        }
    }

    /// How long a PENDING order holds its tickets.
    #[must_use]
    pub fn order_ttl(&self) -> Duration {
        Duration::minutes(self.order_ttl_minutes)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Falls back to development defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let pricing_defaults = PricingConfig::default();
        Self {
            server: ServerConfig {
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            pricing: PricingConfig {
                platform_fixed_cents: env::var("SERVICE_FEE_PLATFORM_FIXED_CENTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(pricing_defaults.platform_fixed_cents),
                platform_percentage_bp: env::var("SERVICE_FEE_PLATFORM_PERCENTAGE_BP")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(pricing_defaults.platform_percentage_bp),
                processor_fixed_cents: env::var("SERVICE_FEE_PROCESSOR_FIXED_CENTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(pricing_defaults.processor_fixed_cents),
                order_ttl_minutes: env::var("ORDER_TTL_MINUTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|m: &i64| *m > 0)
                    .unwrap_or(pricing_defaults.order_ttl_minutes),
            },
            tickets: TicketConfig {
                qr_signing_secret: env::var("QR_SIGNING_SECRET").unwrap_or_else(|_| {
                    tracing::warn!("QR_SIGNING_SECRET not set, using development secret");
                    DEV_QR_SECRET.to_string()
                }),
            },
            mollie: MollieConfig::from_env(),
        }
    }

    /// Defaults for tests and local runs, without reading the environment.
    #[must_use]
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                log_level: "info".to_string(),
                public_base_url: "http://localhost:3000".to_string(),
            },
            pricing: PricingConfig::default(),
            tickets: TicketConfig {
                qr_signing_secret: DEV_QR_SECRET.to_string(),
            },
            mollie: MollieConfig::new(
                "app_dev".to_string(),
                "dev-secret".to_string(),
                "http://localhost:3000/api/mollie/callback".to_string(),
            ),
        }
    }
}
