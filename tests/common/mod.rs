//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use goal_shock_engine::common::types::{
    FeedEvent, GoalEvent, MarketSnapshot, OrderRequest, OrderResult, RawMatchUpdate, ScoringSide,
};
use goal_shock_engine::config::types::ApiCredentials;
use goal_shock_engine::MarketPort;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_API_SECRET: &str = "test-secret";

pub fn test_credentials() -> ApiCredentials {
    ApiCredentials::new(TEST_API_KEY.to_string(), TEST_API_SECRET.to_string())
}

/// A feed update for match `m1` between Home and Away
pub fn feed_update(match_id: &str, score: &str, status: &str) -> FeedEvent {
    FeedEvent::Update(RawMatchUpdate {
        match_id: match_id.to_string(),
        home_team: "Home".to_string(),
        away_team: "Away".to_string(),
        score: score.to_string(),
        status: status.to_string(),
        observed_at: Utc::now(),
    })
}

pub fn sample_goal(match_id: &str, score_after: (u32, u32), minute: u32) -> GoalEvent {
    GoalEvent {
        match_id: match_id.to_string(),
        scoring_side: ScoringSide::Away,
        scorer: "Away".to_string(),
        score_after,
        detected_at: Utc::now(),
        minute,
    }
}

/// Market port that replays scripted quotes and fills
///
/// Quotes are served in order; the last one repeats once the script runs out.
/// Submit answers come from a separate script and default to a fill at the
/// requested price. Every submitted order is recorded.
#[derive(Default)]
pub struct ScriptedPort {
    quotes: Mutex<VecDeque<MarketSnapshot>>,
    last_quote: Mutex<Option<MarketSnapshot>>,
    fills: Mutex<VecDeque<bool>>,
    orders: Mutex<Vec<OrderRequest>>,
    fetches: AtomicUsize,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quotes(self, quotes: impl IntoIterator<Item = MarketSnapshot>) -> Self {
        self.quotes.lock().unwrap().extend(quotes);
        self
    }

    /// Script submit answers: `true` fills, `false` fails
    pub fn with_fills(self, fills: impl IntoIterator<Item = bool>) -> Self {
        self.fills.lock().unwrap().extend(fills);
        self
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketPort for ScriptedPort {
    async fn fetch(&self, _market_id: &str) -> MarketSnapshot {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.quotes.lock().unwrap().pop_front();
        let mut last = self.last_quote.lock().unwrap();
        if let Some(quote) = next {
            *last = Some(quote);
        }
        (*last).unwrap_or_else(MarketSnapshot::fallback)
    }

    async fn submit(&self, order: &OrderRequest) -> Option<OrderResult> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        let filled = self.fills.lock().unwrap().pop_front().unwrap_or(true);

        filled.then(|| OrderResult {
            order_id: format!("{}-{}", order.action, orders.len()),
            fill_price: order.price,
        })
    }

    fn port_name(&self) -> &'static str {
        "scripted"
    }
}

/// Sample provider frames and exchange bodies
pub mod payloads {
    /// Two matches in one live-events push
    pub const LIVE_EVENTS: &str = r#"[
        {
            "event_key": 1001,
            "event_home_team": "Arsenal",
            "event_away_team": "Luton",
            "event_final_result": "0 - 0",
            "event_status": "31"
        },
        {
            "event_key": "1002",
            "event_home_team": "Everton",
            "event_away_team": "Fulham",
            "event_final_result": "1 - 1",
            "event_status": "Half Time"
        }
    ]"#;

    /// Away goal in match 1001
    pub const LIVE_EVENTS_GOAL: &str = r#"[
        {
            "event_key": 1001,
            "event_home_team": "Arsenal",
            "event_away_team": "Luton",
            "event_final_result": "0 - 1",
            "event_status": "34"
        }
    ]"#;

    /// Record without a match key
    pub const LIVE_EVENTS_MALFORMED: &str = r#"[{"event_final_result": "2 - 0"}]"#;

    pub fn market(price_cents: i64, open_interest: i64) -> serde_json::Value {
        serde_json::json!({
            "market": {
                "ticker": "m1",
                "price": price_cents,
                "open_interest": open_interest,
                "status": "active"
            }
        })
    }

    pub fn order_ack(order_id: &str, fill_price: f64) -> serde_json::Value {
        serde_json::json!({
            "order": {
                "order_id": order_id,
                "fill_price": fill_price,
                "status": "executed"
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_scripted_port_repeats_last_quote() {
        let port = ScriptedPort::new().with_quotes([MarketSnapshot::live(dec!(0.40), 900)]);
        assert_eq!(port.fetch("m1").await.price, dec!(0.40));
        assert_eq!(port.fetch("m1").await.price, dec!(0.40));
        assert_eq!(port.fetches(), 2);
    }

    #[tokio::test]
    async fn test_scripted_port_without_quotes_falls_back() {
        let port = ScriptedPort::new();
        assert!(port.fetch("m1").await.is_fallback());
    }
}
