//! Trade/no-trade decision for a detected goal

use std::sync::Arc;
use tracing::{debug, instrument};

use super::size_calculator::{FixedFractionSizer, SizeCalculator};
use super::types::{Decision, GateFailure};
use crate::common::traits::{MarketPort, UnderdogOracle};
use crate::common::types::{GoalEvent, MarketSnapshot};
use crate::config::types::TradingConfig;

/// Apply every gate to a goal and a market snapshot
///
/// Pure: the result depends only on the arguments. All failing gates are
/// collected, not just the first.
pub fn decide(
    config: &TradingConfig,
    sizer: &dyn SizeCalculator,
    event: &GoalEvent,
    snapshot: &MarketSnapshot,
    was_underdog: bool,
) -> Decision {
    let mut reasons = Vec::new();

    if event.minute < config.min_goal_minute {
        reasons.push(GateFailure::Minute {
            minute: event.minute,
            min_minute: config.min_goal_minute,
        });
    }
    if !was_underdog {
        reasons.push(GateFailure::Underdog);
    }
    if snapshot.price >= config.price_threshold {
        reasons.push(GateFailure::Price {
            price: snapshot.price,
            threshold: config.price_threshold,
        });
    }
    if snapshot.liquidity < config.min_liquidity {
        reasons.push(GateFailure::Liquidity {
            liquidity: snapshot.liquidity,
            min_liquidity: config.min_liquidity,
        });
    }

    if reasons.is_empty() {
        Decision::Trade {
            size: sizer.order_size(),
            price: snapshot.price,
        }
    } else {
        Decision::NoTrade { reasons }
    }
}

/// Evaluates goals against live market state
///
/// The only side effect is the market fetch. A failed fetch arrives as the
/// fallback snapshot, whose zero liquidity always fails the liquidity gate.
pub struct EligibilityEvaluator {
    config: Arc<TradingConfig>,
    sizer: FixedFractionSizer,
    port: Arc<dyn MarketPort>,
    oracle: Arc<dyn UnderdogOracle>,
}

impl EligibilityEvaluator {
    pub fn new(
        config: Arc<TradingConfig>,
        port: Arc<dyn MarketPort>,
        oracle: Arc<dyn UnderdogOracle>,
    ) -> Self {
        let sizer = FixedFractionSizer::from_config(&config);
        Self {
            config,
            sizer,
            port,
            oracle,
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Fetch market state for the goal's match and decide
    #[instrument(skip(self, event), fields(match_id = %event.match_id, minute = event.minute))]
    pub async fn evaluate(&self, event: &GoalEvent) -> Decision {
        let snapshot = self.port.fetch(&event.match_id).await;
        let was_underdog = self.oracle.was_underdog(&event.match_id).await;
        debug!(
            "Evaluating goal: snapshot {:?}, underdog {}",
            snapshot, was_underdog
        );

        decide(&self.config, &self.sizer, event, &snapshot, was_underdog)
    }
}
