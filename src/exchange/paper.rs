//! Dry-run market port: live quotes, simulated fills

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::common::traits::MarketPort;
use crate::common::types::{MarketSnapshot, OrderRequest, OrderResult};

/// Wraps a quoting port and fills every order at the requested price
///
/// Order ids look like `SIM_<unix seconds>_<sequence>` so they stay unique
/// even when several fills land in the same second.
pub struct PaperMarketPort {
    quotes: Arc<dyn MarketPort>,
    sequence: AtomicU64,
}

impl PaperMarketPort {
    pub fn new(quotes: Arc<dyn MarketPort>) -> Self {
        Self {
            quotes,
            sequence: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl MarketPort for PaperMarketPort {
    async fn fetch(&self, market_id: &str) -> MarketSnapshot {
        self.quotes.fetch(market_id).await
    }

    async fn submit(&self, order: &OrderRequest) -> Option<OrderResult> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let order_id = format!("SIM_{}_{}", chrono::Utc::now().timestamp(), seq);
        info!(
            "Simulated {} fill {} for {} at {} (size {})",
            order.action, order_id, order.market_id, order.price, order.size
        );
        Some(OrderResult {
            order_id,
            fill_price: order.price,
        })
    }

    fn port_name(&self) -> &'static str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::MockMarketPort;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_fills_at_requested_price_without_touching_exchange() {
        let mut quotes = MockMarketPort::new();
        quotes.expect_submit().never();
        let port = PaperMarketPort::new(Arc::new(quotes));

        let first = port
            .submit(&OrderRequest::buy("m1", dec!(0.45), dec!(50)))
            .await
            .unwrap();
        let second = port
            .submit(&OrderRequest::sell("m1", dec!(0.52), dec!(50)))
            .await
            .unwrap();

        assert!(first.order_id.starts_with("SIM_"));
        assert_eq!(first.fill_price, dec!(0.45));
        assert_ne!(first.order_id, second.order_id);
    }

    #[tokio::test]
    async fn test_quotes_are_delegated() {
        let mut quotes = MockMarketPort::new();
        quotes
            .expect_fetch()
            .returning(|_| MarketSnapshot::live(dec!(0.33), 900));
        let port = PaperMarketPort::new(Arc::new(quotes));

        assert_eq!(port.fetch("m1").await, MarketSnapshot::live(dec!(0.33), 900));
    }
}
