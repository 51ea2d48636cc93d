//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;
use std::str::FromStr;

use super::types::{AppConfig, AppSettings, ExchangeConfig, FeedConfig, TradingConfig};
use crate::common::errors::{EngineError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_, sections separated by `__`,
///    e.g. `APP_TRADING__BANKROLL`)
/// 2. Configuration file (TOML format)
/// 3. Plain credential variables (`API_KEY`, `API_SECRET`, `FEED_API_KEY`)
/// 4. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    let mut config: AppConfig = config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    fill_missing_credentials(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Fill credentials the file and `APP_` variables left unset from the plain
/// variable names
pub fn fill_missing_credentials<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let first = |names: &[&str]| names.iter().find_map(|name| lookup(*name));
    let fill = |slot: &mut Option<String>, names: &[&str]| {
        if slot.as_deref().map_or(true, str::is_empty) {
            *slot = first(names);
        }
    };

    fill(&mut config.exchange.api_key, &["API_KEY", "KALSHI_API_KEY"]);
    fill(&mut config.exchange.api_secret, &["API_SECRET", "KALSHI_API_SECRET"]);
    fill(&mut config.feed.api_key, &["FEED_API_KEY", "ALLSPORTS_API_KEY"]);
}

/// Load configuration from plain environment variables
///
/// Reads `API_KEY`, `API_SECRET`, `FEED_API_KEY`, `BANKROLL`, `MAX_PER_TRADE`,
/// `MIN_GOAL_MINUTE` and the remaining thresholds. The `KALSHI_` and
/// `ALLSPORTS_` names are accepted as fallbacks for the credentials.
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();
    from_lookup(|name| std::env::var(name).ok())
}

/// Build a configuration from any variable lookup
///
/// Unset variables fall back to defaults; set but unparseable values are errors.
pub fn from_lookup<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let first = |names: &[&str]| names.iter().find_map(|name| lookup(*name));

    let exchange_defaults = ExchangeConfig::default();
    let exchange = ExchangeConfig {
        api_key: first(&["API_KEY", "KALSHI_API_KEY"]),
        api_secret: first(&["API_SECRET", "KALSHI_API_SECRET"]),
        rest_url: lookup("EXCHANGE_REST_URL").unwrap_or(exchange_defaults.rest_url),
        request_timeout_seconds: parse_or(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            exchange_defaults.request_timeout_seconds,
        )?,
        max_attempts: parse_or(&lookup, "MAX_ATTEMPTS", exchange_defaults.max_attempts)?,
        backoff_base_ms: parse_or(
            &lookup,
            "BACKOFF_BASE_MS",
            exchange_defaults.backoff_base_ms,
        )?,
    };

    let feed_defaults = FeedConfig::default();
    let feed = FeedConfig {
        api_key: first(&["FEED_API_KEY", "ALLSPORTS_API_KEY"]),
        websocket_url: lookup("FEED_WS_URL").unwrap_or(feed_defaults.websocket_url),
        reconnect_delay_ms: parse_or(
            &lookup,
            "RECONNECT_DELAY_MS",
            feed_defaults.reconnect_delay_ms,
        )?,
    };

    let d = TradingConfig::default();
    let trading = TradingConfig {
        bankroll: parse_or(&lookup, "BANKROLL", d.bankroll)?,
        max_per_trade: parse_or(&lookup, "MAX_PER_TRADE", d.max_per_trade)?,
        risk_fraction: parse_or(&lookup, "RISK_FRACTION", d.risk_fraction)?,
        min_goal_minute: parse_or(&lookup, "MIN_GOAL_MINUTE", d.min_goal_minute)?,
        price_threshold: parse_or(&lookup, "PRICE_THRESHOLD", d.price_threshold)?,
        min_liquidity: parse_or(&lookup, "MIN_LIQUIDITY", d.min_liquidity)?,
        take_profit_pct: parse_or(&lookup, "TAKE_PROFIT_PCT", d.take_profit_pct)?,
        hold_timeout_secs: parse_or(&lookup, "HOLD_TIMEOUT_SECS", d.hold_timeout_secs)?,
        poll_interval_ms: parse_or(&lookup, "POLL_INTERVAL_MS", d.poll_interval_ms)?,
        exit_retries: parse_or(&lookup, "EXIT_RETRIES", d.exit_retries)?,
        start_halted: parse_or(&lookup, "TRADING_HALTED", d.start_halted)?,
        dry_run: parse_or(&lookup, "DRY_RUN", d.dry_run)?,
    };

    let settings_defaults = AppSettings::default();
    let settings = AppSettings {
        log_level: lookup("LOG_LEVEL").unwrap_or(settings_defaults.log_level),
        stats_interval_seconds: parse_or(
            &lookup,
            "STATS_INTERVAL_SECS",
            settings_defaults.stats_interval_seconds,
        )?,
    };

    Ok(AppConfig {
        exchange,
        feed,
        trading,
        settings,
    })
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            EngineError::Configuration(format!("invalid value for {}: {:?} ({})", name, raw, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.trading.bankroll, dec!(10000.00));
        assert_eq!(config.trading.min_goal_minute, 30);
        assert!(config.exchange.api_key.is_none());
        assert_eq!(config.feed.reconnect_delay_ms, 5000);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = from_lookup(lookup_from(&[
            ("API_KEY", "k"),
            ("API_SECRET", "s"),
            ("FEED_API_KEY", "f"),
            ("BANKROLL", "2500.50"),
            ("MAX_PER_TRADE", "20"),
            ("MIN_GOAL_MINUTE", "60"),
            ("DRY_RUN", "true"),
        ]))
        .unwrap();

        assert_eq!(config.trading.bankroll, dec!(2500.50));
        assert_eq!(config.trading.max_per_trade, dec!(20));
        assert_eq!(config.trading.min_goal_minute, 60);
        assert!(config.trading.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_legacy_credential_names() {
        let config = from_lookup(lookup_from(&[
            ("KALSHI_API_KEY", "k"),
            ("KALSHI_API_SECRET", "s"),
            ("ALLSPORTS_API_KEY", "f"),
        ]))
        .unwrap();
        assert_eq!(config.exchange.api_key.as_deref(), Some("k"));
        assert_eq!(config.feed.api_key.as_deref(), Some("f"));
    }

    #[test]
    fn test_unparseable_number_is_error() {
        let result = from_lookup(lookup_from(&[("MIN_GOAL_MINUTE", "thirty")]));
        match result {
            Err(EngineError::Configuration(msg)) => assert!(msg.contains("MIN_GOAL_MINUTE")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_credentials_fill_file_config() {
        let mut config = from_lookup(lookup_from(&[])).unwrap();
        config.exchange.api_key = Some("from-file".to_string());

        fill_missing_credentials(
            &mut config,
            lookup_from(&[
                ("API_KEY", "plain-key"),
                ("API_SECRET", "plain-secret"),
                ("ALLSPORTS_API_KEY", "f"),
            ]),
        );

        assert_eq!(config.exchange.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.exchange.api_secret.as_deref(), Some("plain-secret"));
        assert_eq!(config.feed.api_key.as_deref(), Some("f"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_credentials_fail_validation() {
        let config = from_lookup(lookup_from(&[("FEED_API_KEY", "f")])).unwrap();
        assert!(config.validate().is_err());
    }
}
