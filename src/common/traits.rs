//! Trait definitions for the engine's outbound collaborators

use async_trait::async_trait;

use super::types::{MarketSnapshot, OrderRequest, OrderResult};

/// Uniform interface to a prediction-market exchange
///
/// Implementations hide their transport entirely: callers never see an error.
/// A failed fetch yields [`MarketSnapshot::fallback`], a failed submit yields `None`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketPort: Send + Sync {
    /// Current price and liquidity for a market
    async fn fetch(&self, market_id: &str) -> MarketSnapshot;

    /// Submit an order, returning the fill or `None` once the retry policy is exhausted
    async fn submit(&self, order: &OrderRequest) -> Option<OrderResult>;

    /// Name used in logs
    fn port_name(&self) -> &'static str;
}

/// Pre-event eligibility predicate: was the team that just scored the underdog?
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UnderdogOracle: Send + Sync {
    async fn was_underdog(&self, match_id: &str) -> bool;
}

/// Oracle that always gives the same answer
///
/// `FixedUnderdogOracle::default()` answers `false`, which keeps the engine from
/// trading until a real pre-event odds source is plugged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedUnderdogOracle(pub bool);

#[async_trait]
impl UnderdogOracle for FixedUnderdogOracle {
    async fn was_underdog(&self, _match_id: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_oracle_never_flags_underdog() {
        let oracle = FixedUnderdogOracle::default();
        assert!(!oracle.was_underdog("12345").await);
        assert!(FixedUnderdogOracle(true).was_underdog("12345").await);
    }
}
