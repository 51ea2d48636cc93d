//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::errors::{EngineError, Result};

/// Main application configuration
///
/// Built once at startup, validated, then shared read-only (behind an `Arc`)
/// with every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Exchange connection and credentials
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Live-score feed connection
    #[serde(default)]
    pub feed: FeedConfig,
    /// Eligibility thresholds, sizing and exit rules
    #[serde(default)]
    pub trading: TradingConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Reject configurations the engine must not start with
    pub fn validate(&self) -> Result<()> {
        self.exchange.credentials()?;
        if self.feed.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(EngineError::Configuration(
                "missing feed API key (set FEED_API_KEY or APP_FEED__API_KEY)".to_string(),
            ));
        }
        self.trading.validate()
    }
}

/// Exchange platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// API key sent in the ACCESS-KEY header
    #[serde(default)]
    pub api_key: Option<String>,
    /// Shared secret used to sign requests
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Base URL for the REST API
    #[serde(default = "default_exchange_rest_url")]
    pub rest_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Attempts per request before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First rate-limit backoff (doubles every attempt) and the fixed transport backoff
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            rest_url: default_exchange_rest_url(),
            request_timeout_seconds: default_request_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl ExchangeConfig {
    /// Credentials, or a configuration error naming what is missing
    pub fn credentials(&self) -> Result<ApiCredentials> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok(ApiCredentials::new(key.to_string(), secret.to_string()))
            }
            (None, _) | (Some(""), _) => Err(EngineError::Configuration(
                "missing exchange API key (set API_KEY or APP_EXCHANGE__API_KEY)".to_string(),
            )),
            _ => Err(EngineError::Configuration(
                "missing exchange API secret (set API_SECRET or APP_EXCHANGE__API_SECRET)"
                    .to_string(),
            )),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

fn default_exchange_rest_url() -> String {
    "https://demo-api.kalshi.co/trade-api/v2".to_string()
}

fn default_request_timeout() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

/// Live-score feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Provider API key, appended to the websocket URL
    #[serde(default)]
    pub api_key: Option<String>,
    /// WebSocket URL for live events
    #[serde(default = "default_feed_ws_url")]
    pub websocket_url: String,
    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            websocket_url: default_feed_ws_url(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl FeedConfig {
    /// Full connection URL including the API key and timezone query
    pub fn connection_url(&self) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.websocket_url)
            .map_err(|e| EngineError::Configuration(format!("invalid feed URL: {}", e)))?;
        if let Some(key) = &self.api_key {
            url.query_pairs_mut()
                .append_pair("APIkey", key)
                .append_pair("timezone", "+00:00");
        }
        Ok(url)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

fn default_feed_ws_url() -> String {
    "wss://wss.allsportsapi.com/live_events".to_string()
}

fn default_reconnect_delay() -> u64 {
    5000
}

/// Eligibility thresholds, sizing and position exit rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Account bankroll used for sizing
    #[serde(default = "default_bankroll")]
    pub bankroll: Decimal,
    /// Hard cap per trade
    #[serde(default = "default_max_per_trade")]
    pub max_per_trade: Decimal,
    /// Fraction of the bankroll risked per trade
    #[serde(default = "default_risk_fraction")]
    pub risk_fraction: Decimal,
    /// Goals before this minute are ignored
    #[serde(default = "default_min_goal_minute")]
    pub min_goal_minute: u32,
    /// Only buy below this price
    #[serde(default = "default_price_threshold")]
    pub price_threshold: Decimal,
    /// Minimum open interest
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: u64,
    /// Take-profit as a fraction above entry
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Time-based stop-loss in seconds
    #[serde(default = "default_hold_timeout_secs")]
    pub hold_timeout_secs: u64,
    /// Position polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Extra attempts for a failed exit order
    #[serde(default = "default_exit_retries")]
    pub exit_retries: u32,
    /// Start with trading halted
    #[serde(default)]
    pub start_halted: bool,
    /// Quote live prices but simulate fills
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            bankroll: default_bankroll(),
            max_per_trade: default_max_per_trade(),
            risk_fraction: default_risk_fraction(),
            min_goal_minute: default_min_goal_minute(),
            price_threshold: default_price_threshold(),
            min_liquidity: default_min_liquidity(),
            take_profit_pct: default_take_profit_pct(),
            hold_timeout_secs: default_hold_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            exit_retries: default_exit_retries(),
            start_halted: false,
            dry_run: false,
        }
    }
}

impl TradingConfig {
    pub fn hold_timeout(&self) -> Duration {
        Duration::from_secs(self.hold_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bankroll <= Decimal::ZERO {
            return Err(EngineError::Configuration("BANKROLL must be positive".to_string()));
        }
        if self.max_per_trade <= Decimal::ZERO {
            return Err(EngineError::Configuration(
                "MAX_PER_TRADE must be positive".to_string(),
            ));
        }
        if self.risk_fraction <= Decimal::ZERO || self.risk_fraction > Decimal::ONE {
            return Err(EngineError::Configuration(
                "RISK_FRACTION must be in (0, 1]".to_string(),
            ));
        }
        if self.price_threshold <= Decimal::ZERO || self.price_threshold > Decimal::ONE {
            return Err(EngineError::Configuration(
                "PRICE_THRESHOLD must be in (0, 1]".to_string(),
            ));
        }
        if self.take_profit_pct <= Decimal::ZERO {
            return Err(EngineError::Configuration(
                "TAKE_PROFIT_PCT must be positive".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(EngineError::Configuration(
                "POLL_INTERVAL_MS must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_bankroll() -> Decimal {
    dec!(10000.00)
}

fn default_max_per_trade() -> Decimal {
    dec!(100.00)
}

fn default_risk_fraction() -> Decimal {
    dec!(0.005)
}

fn default_min_goal_minute() -> u32 {
    30
}

fn default_price_threshold() -> Decimal {
    dec!(0.5)
}

fn default_min_liquidity() -> u64 {
    500
}

fn default_take_profit_pct() -> Decimal {
    dec!(0.15)
}

fn default_hold_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_exit_retries() -> u32 {
    1
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How often the latency summary is logged, in seconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            stats_interval_seconds: default_stats_interval(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_interval() -> u64 {
    60
}

/// API credentials for signed requests
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}
