//! # Booking Configuration
//!
//! Configuration management for the booking engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     AURA_HOME_SERVICE_FEE_PAISE=25000                                  │
//! │     AURA_PAYMENT_SIGNING_SECRET=...                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/booking/booking.toml (Linux)                             │
//! │     ~/Library/Application Support/com.aura.booking/booking.toml        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ₹200 home visit fee, 15% add-on commission, INR                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # booking.toml
//! [pricing]
//! home_service_fee_paise = 20000
//! redemption_block_points = 100
//!
//! [upsell]
//! idle_base_bps = 1000
//! cap_bps = 3000
//!
//! [schedule]
//! min_gap_minutes = 30
//! max_gap_minutes = 120
//!
//! [payment]
//! currency = "INR"
//! commission_bps = 1500
//!
//! [loyalty]
//! earn_rate_bps = 1000
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 200
//! ```

use aura_core::money::Money;
use aura_core::pricing::PricingConfig;
use aura_core::schedule::IdleSlotWindow;
use aura_core::types::DiscountRate;
use aura_core::upsell::UpsellConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{BookingError, BookingResult};

// =============================================================================
// Payment Settings
// =============================================================================

/// Gateway-facing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// ISO currency code sent with every order.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Platform commission on sold add-on offers, in basis points.
    /// Default: 1500 (15%)
    #[serde(default = "default_commission_bps")]
    pub commission_bps: u32,

    /// Shared secret for verifying callback signatures locally.
    /// When unset, verification is delegated to the gateway.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

fn default_currency() -> String {
    aura_core::CURRENCY.to_string()
}

fn default_commission_bps() -> u32 {
    1_500
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            currency: default_currency(),
            commission_bps: default_commission_bps(),
            signing_secret: None,
        }
    }
}

impl PaymentSettings {
    pub fn commission(&self) -> DiscountRate {
        DiscountRate::from_bps(self.commission_bps)
    }
}

// =============================================================================
// Loyalty Settings
// =============================================================================

/// Points awarded when an appointment completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltySettings {
    /// Share of the final amount (in rupees) credited as points, in basis
    /// points. Default: 1000 (10 points per ₹100)
    #[serde(default = "default_earn_rate_bps")]
    pub earn_rate_bps: u32,
}

fn default_earn_rate_bps() -> u32 {
    1_000
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            earn_rate_bps: default_earn_rate_bps(),
        }
    }
}

impl LoyaltySettings {
    /// Points earned on a completed appointment worth `amount`.
    pub fn points_for(&self, amount: Money) -> i64 {
        amount.floor_zero().portion_bps(self.earn_rate_bps).rupees()
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Backoff for read-only collaborator calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first one. 1 disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    200
}
fn default_max_backoff() -> u64 {
    2_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// =============================================================================
// Storage & Events
// =============================================================================

/// Where the SQLite database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to `aura.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Domain event fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// Events buffered per subscriber before the slowest one starts lagging.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            capacity: default_event_capacity(),
        }
    }
}

// =============================================================================
// Main Booking Configuration
// =============================================================================

/// Complete booking engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingConfig {
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Suggestion discount rates and placeholder metadata.
    #[serde(default)]
    pub upsell: UpsellConfig,

    /// Idle-slot gap bounds.
    #[serde(default)]
    pub schedule: IdleSlotWindow,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub loyalty: LoyaltySettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub events: EventSettings,
}

impl BookingConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (booking.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> BookingResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading booking config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load booking config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> BookingResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| BookingError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Booking config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> BookingResult<()> {
        if self.pricing.home_service_fee_paise < 0 {
            return Err(BookingError::InvalidConfig(
                "pricing.home_service_fee_paise must not be negative".into(),
            ));
        }
        if self.pricing.redemption_block_points <= 0 {
            return Err(BookingError::InvalidConfig(
                "pricing.redemption_block_points must be greater than 0".into(),
            ));
        }

        self.upsell
            .validate()
            .map_err(|e| BookingError::InvalidConfig(e.to_string()))?;
        self.schedule
            .validate()
            .map_err(|e| BookingError::InvalidConfig(e.to_string()))?;

        if self.payment.currency.trim().is_empty() {
            return Err(BookingError::InvalidConfig("payment.currency is required".into()));
        }
        if self.payment.commission_bps > aura_core::money::BPS_SCALE as u32 {
            return Err(BookingError::InvalidConfig(format!(
                "payment.commission_bps must be at most 10000, got {}",
                self.payment.commission_bps
            )));
        }
        if matches!(self.payment.signing_secret.as_deref(), Some(s) if s.is_empty()) {
            return Err(BookingError::InvalidConfig(
                "payment.signing_secret must not be empty when set".into(),
            ));
        }

        if self.loyalty.earn_rate_bps > aura_core::money::BPS_SCALE as u32 {
            return Err(BookingError::InvalidConfig(format!(
                "loyalty.earn_rate_bps must be at most 10000, got {}",
                self.loyalty.earn_rate_bps
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(BookingError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(BookingError::InvalidConfig(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(BookingError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.events.capacity == 0 {
            return Err(BookingError::InvalidConfig(
                "events.capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(fee) = var("AURA_HOME_SERVICE_FEE_PAISE") {
            match fee.parse::<i64>() {
                Ok(paise) => {
                    debug!(paise, "Overriding home service fee from environment");
                    self.pricing.home_service_fee_paise = paise;
                }
                Err(_) => warn!(value = %fee, "Ignoring non-numeric AURA_HOME_SERVICE_FEE_PAISE"),
            }
        }

        if let Some(bps) = var("AURA_COMMISSION_BPS") {
            if let Ok(bps) = bps.parse::<u32>() {
                self.payment.commission_bps = bps;
            }
        }

        if let Some(currency) = var("AURA_CURRENCY") {
            self.payment.currency = currency;
        }

        if let Some(secret) = var("AURA_PAYMENT_SIGNING_SECRET") {
            debug!("Overriding payment signing secret from environment");
            self.payment.signing_secret = Some(secret);
        }

        if let Some(path) = var("AURA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(attempts) = var("AURA_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse::<u32>() {
                self.retry.max_attempts = n;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "aura", "booking")
            .map(|dirs| dirs.config_dir().join("booking.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The configured database file, or `aura.db` in the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "aura", "booking")
                .map(|dirs| dirs.data_dir().join("aura.db"))
        })
    }
}
