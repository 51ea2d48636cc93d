//! Market port backed by the exchange REST API

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use super::rest::ExchangeRestClient;
use crate::common::errors::Result;
use crate::common::traits::MarketPort;
use crate::common::types::{MarketSnapshot, OrderRequest, OrderResult};
use crate::config::types::ExchangeConfig;

/// Exchange client exposing the fail-safe [`MarketPort`] contract
///
/// Transport and protocol errors stop here: a failed quote becomes the
/// fallback snapshot and a failed order becomes `None`.
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    rest_client: ExchangeRestClient,
}

impl ExchangeClient {
    pub fn new(rest_client: ExchangeRestClient) -> Self {
        Self { rest_client }
    }

    /// Create a signed client from configuration
    pub fn from_config(config: &ExchangeConfig) -> Result<Self> {
        Ok(Self::new(ExchangeRestClient::from_config(config)?))
    }
}

#[async_trait]
impl MarketPort for ExchangeClient {
    #[instrument(skip(self))]
    async fn fetch(&self, market_id: &str) -> MarketSnapshot {
        match self.rest_client.get_market(market_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Market fetch for {} failed, using fallback snapshot: {}", market_id, e);
                MarketSnapshot::fallback()
            }
        }
    }

    #[instrument(skip(self), fields(market_id = %order.market_id))]
    async fn submit(&self, order: &OrderRequest) -> Option<OrderResult> {
        match self.rest_client.place_order(order).await {
            Ok(result) => {
                info!(
                    "Order {} {} filled at {} (size {})",
                    result.order_id, order.action, result.fill_price, order.size
                );
                Some(result)
            }
            Err(e) => {
                error!("Order submission for {} failed: {}", order.market_id, e);
                None
            }
        }
    }

    fn port_name(&self) -> &'static str {
        "exchange"
    }
}
