//! Unified types shared by the feed, the decision pipeline and the exchange port

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which side of a match scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScoringSide {
    Home,
    Away,
}

impl std::fmt::Display for ScoringSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringSide::Home => write!(f, "HOME"),
            ScoringSide::Away => write!(f, "AWAY"),
        }
    }
}

/// Order action sent to the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "BUY"),
            OrderAction::Sell => write!(f, "SELL"),
        }
    }
}

/// A single observation of a live match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    /// Opaque match key from the feed
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    /// Raw status text, e.g. `67'`, `45+2'`, `Half Time`
    pub status: String,
    pub observed_at: DateTime<Utc>,
}

impl MatchState {
    pub fn score(&self) -> (u32, u32) {
        (self.home_score, self.away_score)
    }
}

/// A feed record before its score text has been parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMatchUpdate {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    /// Score text as sent by the provider, e.g. `2 - 1`
    pub score: String,
    pub status: String,
    pub observed_at: DateTime<Utc>,
}

/// A normalized goal detected by the signal detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalEvent {
    pub match_id: String,
    pub scoring_side: ScoringSide,
    /// Display name of the scoring team
    pub scorer: String,
    /// (home, away) after the goal
    pub score_after: (u32, u32),
    pub detected_at: DateTime<Utc>,
    /// Match minute derived from the status text, 0 when unknown
    pub minute: u32,
}

/// Where a market snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Quoted by the exchange
    Live,
    /// Safe sentinel substituted after a failed fetch
    Fallback,
}

/// Current price and liquidity of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Price in [0, 1]
    pub price: Decimal,
    /// Open interest, used as a liquidity proxy
    pub liquidity: u64,
    pub source: SnapshotSource,
}

impl MarketSnapshot {
    /// Price reported when a fetch fails
    pub const FALLBACK_PRICE: Decimal = dec!(0.50);

    pub fn live(price: Decimal, liquidity: u64) -> Self {
        Self {
            price,
            liquidity,
            source: SnapshotSource::Live,
        }
    }

    /// The 0.50 / 0 sentinel. Zero liquidity keeps it from passing any liquidity gate.
    pub fn fallback() -> Self {
        Self {
            price: Self::FALLBACK_PRICE,
            liquidity: 0,
            source: SnapshotSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == SnapshotSource::Fallback
    }
}

/// An order to submit through the market port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub market_id: String,
    pub action: OrderAction,
    pub price: Decimal,
    pub size: Decimal,
}

impl OrderRequest {
    pub fn buy(market_id: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self {
            market_id: market_id.into(),
            action: OrderAction::Buy,
            price,
            size,
        }
    }

    pub fn sell(market_id: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self {
            market_id: market_id.into(),
            action: OrderAction::Sell,
            price,
            size,
        }
    }
}

/// A filled order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub fill_price: Decimal,
}

/// Connection status for the score feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Successfully connected
    Connected,
    /// Disconnected (with optional reason)
    Disconnected(Option<String>),
    /// Waiting to reconnect
    Reconnecting { attempt: u32 },
    /// Connection error
    Error(String),
}

/// Event forwarded from the score feed to the engine loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeedEvent {
    /// A decoded match record
    Update(RawMatchUpdate),
    /// A feed record that could not be decoded
    Malformed { reason: String },
    /// Connection status change
    ConnectionStatus(ConnectionStatus),
}
