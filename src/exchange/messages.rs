//! Exchange wire types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{MarketSnapshot, OrderAction, OrderRequest};

/// Order type sent with every order: fill what is available now, cancel the rest
pub const ORDER_TYPE_IOC: &str = "IOC";

// ============================================================================
// REST API Response Types
// ============================================================================

/// Response from GET /markets/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEnvelope {
    pub market: MarketData,
}

/// Market quote as reported by the exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    /// Last price in cents (0..=100)
    pub price: i64,
    /// Outstanding contracts
    #[serde(default)]
    pub open_interest: i64,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl MarketData {
    /// Convert to a live snapshot with the price in [0, 1]
    ///
    /// Prices outside 0..=100 cents are rejected rather than clamped.
    pub fn to_snapshot(&self) -> Option<MarketSnapshot> {
        if !(0..=100).contains(&self.price) {
            return None;
        }
        let price = Decimal::new(self.price, 2);
        let liquidity = u64::try_from(self.open_interest).unwrap_or(0);
        Some(MarketSnapshot::live(price, liquidity))
    }
}

/// Response from POST /order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: OrderAck,
}

/// Exchange acknowledgement of an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub fill_price: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// REST API Request Types
// ============================================================================

/// Body of POST /order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBody {
    pub market_id: String,
    pub action: OrderAction,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub order_type: String,
}

impl From<&OrderRequest> for OrderBody {
    fn from(order: &OrderRequest) -> Self {
        Self {
            market_id: order.market_id.clone(),
            action: order.action,
            quantity: order.size,
            price: order.price,
            order_type: ORDER_TYPE_IOC.to_string(),
        }
    }
}
