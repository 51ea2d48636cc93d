//! GoalShockEngine Library
//!
//! Watches live football scores, detects goals and trades the resulting price
//! shock on a prediction-market exchange, then supervises each position until
//! it takes profit or times out.

pub mod common;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod feed;
pub mod strategy;

// Re-export commonly used types
pub use common::errors::{EngineError, Result};
pub use common::latency::{LatencyStats, LatencyTracker};
pub use common::traits::{FixedUnderdogOracle, MarketPort, UnderdogOracle};
pub use common::types::{
    FeedEvent, GoalEvent, MarketSnapshot, MatchState, OrderAction, OrderRequest, OrderResult,
    RawMatchUpdate, ScoringSide,
};
pub use config::types::AppConfig;
pub use engine::{Engine, EngineStats, ReportTally};
pub use exchange::{ExchangeClient, ExchangeRestClient, PaperMarketPort, RetryPolicy};
pub use feed::ScoreFeedClient;

// Strategy types
pub use strategy::{
    Decision, Dispatcher, EligibilityEvaluator, EngineReport, ExitRules, GateFailure,
    PipelineOutcome, PositionManager, PositionReport, PositionStatus, SignalDetector,
    TradingHalt,
};
