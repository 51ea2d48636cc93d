//! Position Manager - supervises one filled entry until it is closed
//!
//! ```text
//!            price >= target, exit filled
//!   OPEN ──────────────────────────────────▶ CLOSED_TP
//!    │
//!    │  now > deadline, liquidation filled
//!    ├─────────────────────────────────────▶ CLOSED_TIMEOUT
//!    │
//!    │  exit order rejected on every attempt
//!    └─────────────────────────────────────▶ CLOSED_ERROR
//! ```
//!
//! Exactly one exit is ever attempted, so take-profit and timeout can never
//! both fire for the same position. Failed exit attempts are retried one
//! poll interval apart.

use chrono::Utc;
use futures_util::FutureExt;
use rust_decimal::Decimal;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::types::{Position, PositionReport, PositionStatus};
use crate::common::traits::MarketPort;
use crate::common::types::{OrderRequest, OrderResult};
use crate::config::types::TradingConfig;

/// Exit parameters shared by every position
#[derive(Debug, Clone, PartialEq)]
pub struct ExitRules {
    pub take_profit_pct: Decimal,
    pub hold_timeout: Duration,
    pub poll_interval: Duration,
    /// Extra exit attempts after the first one fails
    pub exit_retries: u32,
}

impl From<&TradingConfig> for ExitRules {
    fn from(config: &TradingConfig) -> Self {
        Self {
            take_profit_pct: config.take_profit_pct,
            hold_timeout: config.hold_timeout(),
            poll_interval: config.poll_interval(),
            exit_retries: config.exit_retries,
        }
    }
}

impl Default for ExitRules {
    fn default() -> Self {
        Self::from(&TradingConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitKind {
    TakeProfit,
    Timeout,
}

impl ExitKind {
    fn success_status(self) -> PositionStatus {
        match self {
            ExitKind::TakeProfit => PositionStatus::ClosedTakeProfit,
            ExitKind::Timeout => PositionStatus::ClosedTimeout,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ExitKind::TakeProfit => "take profit",
            ExitKind::Timeout => "timeout",
        }
    }
}

pub struct PositionManager {
    position: Position,
    target_price: Decimal,
    deadline: Instant,
    port: Arc<dyn MarketPort>,
    rules: ExitRules,
    last_live_price: Option<Decimal>,
    polls: u32,
}

impl PositionManager {
    /// Open a position from an entry fill
    pub fn open(
        fill: &OrderResult,
        market_id: impl Into<String>,
        size: Decimal,
        port: Arc<dyn MarketPort>,
        rules: ExitRules,
    ) -> Self {
        let target_price = fill.fill_price * (Decimal::ONE + rules.take_profit_pct);
        let deadline = Instant::now() + rules.hold_timeout;

        let position = Position {
            order_id: fill.order_id.clone(),
            market_id: market_id.into(),
            entry_price: fill.fill_price,
            size,
            opened_at: Utc::now(),
            status: PositionStatus::Open,
        };

        info!(
            "Opened position {} on {}: entry {}, target {}, hold {:?}",
            position.order_id,
            position.market_id,
            position.entry_price,
            target_price,
            rules.hold_timeout
        );

        Self {
            position,
            target_price,
            deadline,
            port,
            rules,
            last_live_price: None,
            polls: 0,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn target_price(&self) -> Decimal {
        self.target_price
    }

    /// Poll until the position closes
    ///
    /// The hold deadline bounds every fetch: a quote that is still in flight
    /// when it passes is dropped, and a quote that lands after it can no longer
    /// take profit.
    pub async fn run(mut self) -> PositionReport {
        let mut ticker = time::interval_at(
            Instant::now() + self.rules.poll_interval,
            self.rules.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if Instant::now() > self.deadline {
                return self.liquidate().await;
            }

            let fetched = tokio::select! {
                biased;
                snapshot = self.port.fetch(&self.position.market_id) => Some(snapshot),
                _ = time::sleep_until(self.deadline) => None,
            };
            let Some(snapshot) = fetched else {
                debug!(
                    "Position {}: quote still pending at deadline",
                    self.position.order_id
                );
                return self.liquidate().await;
            };
            self.polls += 1;

            if snapshot.is_fallback() {
                debug!(
                    "Position {}: fallback quote ignored",
                    self.position.order_id
                );
                continue;
            }

            self.last_live_price = Some(snapshot.price);
            if Instant::now() > self.deadline {
                return self.liquidate().await;
            }
            if snapshot.price >= self.target_price {
                return self.exit(ExitKind::TakeProfit, snapshot.price).await;
            }
        }
    }

    /// Close an entry that cannot be supervised with one sell at entry price
    pub async fn abandon(self, reason: impl Into<String>) -> PositionReport {
        emergency_exit(
            self.port,
            self.position,
            self.target_price,
            self.polls,
            reason.into(),
        )
        .await
    }

    async fn liquidate(self) -> PositionReport {
        // No live quote seen: liquidate at entry
        let price = self.last_live_price.unwrap_or(self.position.entry_price);
        self.exit(ExitKind::Timeout, price).await
    }

    async fn exit(mut self, kind: ExitKind, price: Decimal) -> PositionReport {
        let order = OrderRequest::sell(&self.position.market_id, price, self.position.size);
        let attempts = 1 + self.rules.exit_retries;

        let mut exit_order_id = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                time::sleep(self.rules.poll_interval).await;
            }
            match self.port.submit(&order).await {
                Some(result) => {
                    exit_order_id = Some(result.order_id);
                    break;
                }
                None => warn!(
                    "Position {}: {} exit attempt {}/{} failed",
                    self.position.order_id,
                    kind.label(),
                    attempt,
                    attempts
                ),
            }
        }

        let reason = match (&exit_order_id, kind) {
            (Some(_), ExitKind::TakeProfit) => {
                format!("price {} reached target {}", price, self.target_price)
            }
            (Some(_), ExitKind::Timeout) => format!(
                "held {:?} without reaching target, sold at {}",
                self.rules.hold_timeout, price
            ),
            (None, _) => format!("{} exit failed after {} attempts", kind.label(), attempts),
        };

        self.position.status = if exit_order_id.is_some() {
            kind.success_status()
        } else {
            PositionStatus::ClosedError
        };

        close_report(
            self.position,
            self.target_price,
            price,
            exit_order_id,
            reason,
            self.polls,
        )
    }
}

/// One best-effort sell at entry price for a position whose monitor is gone
///
/// Always ends in CLOSED_ERROR. A panic from the port is contained here.
pub async fn emergency_exit(
    port: Arc<dyn MarketPort>,
    mut position: Position,
    target_price: Decimal,
    polls: u32,
    reason: String,
) -> PositionReport {
    let price = position.entry_price;
    let order = OrderRequest::sell(&position.market_id, price, position.size);

    let exit_order_id = match AssertUnwindSafe(port.submit(&order)).catch_unwind().await {
        Ok(fill) => fill.map(|fill| fill.order_id),
        Err(_) => {
            error!("Position {}: emergency exit panicked", position.order_id);
            None
        }
    };

    let reason = match &exit_order_id {
        Some(_) => format!("{}; liquidated at entry {}", reason, price),
        None => format!("{}; liquidation failed, position left open", reason),
    };
    position.status = PositionStatus::ClosedError;

    close_report(position, target_price, price, exit_order_id, reason, polls)
}

fn close_report(
    position: Position,
    target_price: Decimal,
    exit_price: Decimal,
    exit_order_id: Option<String>,
    reason: String,
    polls: u32,
) -> PositionReport {
    info!(
        "Position {} {}: {}",
        position.order_id, position.status, reason
    );

    PositionReport {
        order_id: position.order_id,
        market_id: position.market_id,
        status: position.status,
        entry_price: position.entry_price,
        target_price,
        exit_price: Some(exit_price),
        exit_order_id,
        reason,
        opened_at: position.opened_at,
        closed_at: Utc::now(),
        polls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::MockMarketPort;
    use crate::common::types::{MarketSnapshot, OrderAction};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn rules(hold_ms: u64) -> ExitRules {
        ExitRules {
            take_profit_pct: dec!(0.15),
            hold_timeout: Duration::from_millis(hold_ms),
            poll_interval: Duration::from_millis(10),
            exit_retries: 1,
        }
    }

    fn fill(price: Decimal) -> OrderResult {
        OrderResult {
            order_id: "ord-1".to_string(),
            fill_price: price,
        }
    }

    fn exit_fill() -> Option<OrderResult> {
        Some(OrderResult {
            order_id: "exit-1".to_string(),
            fill_price: dec!(0.60),
        })
    }

    fn open(port: impl MarketPort + 'static, hold_ms: u64) -> PositionManager {
        PositionManager::open(
            &fill(dec!(0.40)),
            "m1",
            dec!(50),
            Arc::new(port),
            rules(hold_ms),
        )
    }

    /// Quotes arrive late and every sell fills
    struct SlowPort {
        delay: Duration,
        blocking: bool,
        sells: Mutex<Vec<OrderRequest>>,
    }

    impl SlowPort {
        fn new(delay: Duration, blocking: bool) -> Arc<Self> {
            Arc::new(Self {
                delay,
                blocking,
                sells: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl MarketPort for SlowPort {
        async fn fetch(&self, _market_id: &str) -> MarketSnapshot {
            if self.blocking {
                std::thread::sleep(self.delay);
            } else {
                time::sleep(self.delay).await;
            }
            MarketSnapshot::live(dec!(0.90), 900)
        }

        async fn submit(&self, order: &OrderRequest) -> Option<OrderResult> {
            self.sells.lock().unwrap().push(order.clone());
            exit_fill()
        }

        fn port_name(&self) -> &'static str {
            "slow"
        }
    }

    #[test]
    fn test_target_price() {
        let manager = open(MockMarketPort::new(), 1000);
        assert_eq!(manager.target_price(), dec!(0.46));
        assert_eq!(manager.position().status, PositionStatus::Open);
    }

    #[tokio::test]
    async fn test_take_profit_sells_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut port = MockMarketPort::new();
        port.expect_fetch().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                MarketSnapshot::live(dec!(0.42), 900)
            } else {
                MarketSnapshot::live(dec!(0.60), 900)
            }
        });
        port.expect_submit()
            .withf(|order: &OrderRequest| {
                order.action == OrderAction::Sell && order.price == dec!(0.60)
            })
            .times(1)
            .returning(|_| exit_fill());

        let report = open(port, 5_000).run().await;

        assert_eq!(report.status, PositionStatus::ClosedTakeProfit);
        assert_eq!(report.exit_price, Some(dec!(0.60)));
        assert_eq!(report.exit_order_id.as_deref(), Some("exit-1"));
        assert_eq!(report.polls, 3);
    }

    #[tokio::test]
    async fn test_timeout_liquidates_at_last_price() {
        let mut port = MockMarketPort::new();
        port.expect_fetch()
            .returning(|_| MarketSnapshot::live(dec!(0.41), 900));
        port.expect_submit()
            .withf(|order: &OrderRequest| {
                order.action == OrderAction::Sell && order.price == dec!(0.41)
            })
            .times(1)
            .returning(|_| exit_fill());

        let report = open(port, 50).run().await;

        assert_eq!(report.status, PositionStatus::ClosedTimeout);
        assert!(report.polls >= 1);
    }

    #[tokio::test]
    async fn test_pending_quote_cannot_outlive_deadline() {
        let port = SlowPort::new(Duration::from_millis(300), false);
        let manager = PositionManager::open(
            &fill(dec!(0.40)),
            "m1",
            dec!(50),
            port.clone(),
            rules(60),
        );

        let started = Instant::now();
        let report = manager.run().await;

        assert_eq!(report.status, PositionStatus::ClosedTimeout);
        // The 0.90 quote never arrived, so the sell goes out at entry
        assert_eq!(report.exit_price, Some(dec!(0.40)));
        assert_eq!(report.polls, 0);
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(port.sells.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quote_landing_after_deadline_times_out() {
        // Blocks inside poll so the quote is returned past the deadline
        let port = SlowPort::new(Duration::from_millis(100), true);
        let manager = PositionManager::open(
            &fill(dec!(0.40)),
            "m1",
            dec!(50),
            port.clone(),
            rules(60),
        );

        let report = manager.run().await;

        assert_eq!(report.status, PositionStatus::ClosedTimeout);
        assert_eq!(report.exit_price, Some(dec!(0.90)));
        assert_eq!(report.polls, 1);
        assert_eq!(port.sells.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_quote_never_takes_profit() {
        // Fallback price 0.50 is above the 0.46 target
        let mut port = MockMarketPort::new();
        port.expect_fetch().returning(|_| MarketSnapshot::fallback());
        port.expect_submit()
            .withf(|order: &OrderRequest| order.price == dec!(0.40))
            .times(1)
            .returning(|_| exit_fill());

        let report = open(port, 40).run().await;

        assert_eq!(report.status, PositionStatus::ClosedTimeout);
        assert_eq!(report.exit_price, Some(dec!(0.40)));
    }

    #[tokio::test]
    async fn test_failed_exit_closes_with_error() {
        let mut port = MockMarketPort::new();
        port.expect_fetch()
            .returning(|_| MarketSnapshot::live(dec!(0.90), 900));
        port.expect_submit().times(2).returning(|_| None);

        let report = open(port, 5_000).run().await;

        assert_eq!(report.status, PositionStatus::ClosedError);
        assert!(report.exit_order_id.is_none());
        assert!(report.reason.contains("take profit"));
    }

    #[tokio::test]
    async fn test_exit_retry_waits_one_poll_interval() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&attempts);

        let mut port = MockMarketPort::new();
        port.expect_fetch()
            .returning(|_| MarketSnapshot::live(dec!(0.90), 900));
        port.expect_submit().times(2).returning(move |_| {
            recorder.lock().unwrap().push(Instant::now());
            None
        });

        open(port, 5_000).run().await;

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[1] - attempts[0] >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_failed_liquidation_closes_with_error() {
        let mut port = MockMarketPort::new();
        port.expect_fetch()
            .returning(|_| MarketSnapshot::live(dec!(0.30), 900));
        port.expect_submit().times(2).returning(|_| None);

        let report = open(port, 30).run().await;

        assert_eq!(report.status, PositionStatus::ClosedError);
        assert!(report.reason.contains("timeout"));
    }

    #[tokio::test]
    async fn test_abandon_sells_at_entry() {
        let mut port = MockMarketPort::new();
        port.expect_fetch().never();
        port.expect_submit()
            .withf(|order: &OrderRequest| {
                order.action == OrderAction::Sell && order.price == dec!(0.40)
            })
            .times(1)
            .returning(|_| exit_fill());

        let report = open(port, 5_000).abandon("order ord-1 already supervised").await;

        assert_eq!(report.status, PositionStatus::ClosedError);
        assert_eq!(report.exit_order_id.as_deref(), Some("exit-1"));
        assert!(report.reason.contains("liquidated at entry 0.40"));
    }
}
