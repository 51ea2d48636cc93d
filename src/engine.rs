//! Engine loop and report sink
//!
//! The engine owns the [`SignalDetector`] and consumes feed events strictly in
//! arrival order. It never awaits network I/O: every goal is handed to the
//! [`Dispatcher`], which spawns and returns immediately.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::common::types::{ConnectionStatus, FeedEvent};
use crate::strategy::{
    Dispatcher, EngineReport, PipelineOutcome, PositionStatus, SignalDetector, SkipReason,
};

/// Counters for what the engine loop has seen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub updates: u64,
    pub malformed: u64,
    pub goals: u64,
    pub dispatched: u64,
}

pub struct Engine {
    detector: SignalDetector,
    dispatcher: Dispatcher,
    stats: EngineStats,
}

impl Engine {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            detector: SignalDetector::new(),
            dispatcher,
            stats: EngineStats::default(),
        }
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Handle one feed event, returning the pipeline handle if a goal was dispatched
    pub fn handle(&mut self, event: FeedEvent) -> Option<JoinHandle<PipelineOutcome>> {
        match event {
            FeedEvent::Update(update) => {
                self.stats.updates += 1;
                let goal = self.detector.process_raw(&update)?;
                self.stats.goals += 1;
                info!(
                    "GOAL {} in match {} ({} vs {}), score now {}-{}",
                    goal.scorer,
                    goal.match_id,
                    update.home_team,
                    update.away_team,
                    goal.score_after.0,
                    goal.score_after.1
                );

                let handle = self.dispatcher.dispatch(goal)?;
                self.stats.dispatched += 1;
                Some(handle)
            }
            FeedEvent::Malformed { reason } => {
                self.stats.malformed += 1;
                debug!("Dropped malformed feed record: {}", reason);
                None
            }
            FeedEvent::ConnectionStatus(status) => {
                match status {
                    ConnectionStatus::Connected => info!("Score feed connected"),
                    ConnectionStatus::Disconnected(reason) => {
                        warn!("Score feed disconnected: {:?}", reason)
                    }
                    ConnectionStatus::Reconnecting { attempt } => {
                        info!("Score feed reconnecting (attempt {})", attempt)
                    }
                    ConnectionStatus::Error(e) => error!("Score feed error: {}", e),
                }
                None
            }
        }
    }

    /// Consume feed events until every sender is dropped
    pub async fn run(mut self, mut events: mpsc::Receiver<FeedEvent>) -> EngineStats {
        while let Some(event) = events.recv().await {
            // Pipelines report through the report channel; the handle is not awaited here
            let _ = self.handle(event);
        }

        info!("Feed channel closed, engine loop stopping: {:?}", self.stats);
        self.stats
    }
}

/// Running totals over every [`EngineReport`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTally {
    pub trades: u64,
    pub no_trades: u64,
    pub skipped_halted: u64,
    pub skipped_duplicate: u64,
    pub orders_submitted: u64,
    pub orders_failed: u64,
    pub closed_take_profit: u64,
    pub closed_timeout: u64,
    pub closed_error: u64,
    pub faults: u64,
}

impl ReportTally {
    /// Log a report and count it
    pub fn record(&mut self, report: &EngineReport) {
        match report {
            EngineReport::Skipped { match_id, reason } => {
                debug!("Skipped goal in match {}: {:?}", match_id, reason);
                match reason {
                    SkipReason::Halted | SkipReason::HaltedBeforeSubmit => {
                        self.skipped_halted += 1
                    }
                    SkipReason::Duplicate => self.skipped_duplicate += 1,
                }
            }
            EngineReport::Decided { event, decision } => {
                if decision.is_trade() {
                    self.trades += 1;
                } else {
                    self.no_trades += 1;
                    info!(
                        "NO TRADE for match {}: {}",
                        event.match_id,
                        decision.describe()
                    );
                }
            }
            EngineReport::OrderSubmitted {
                match_id,
                order_id,
                latency,
                ..
            } => {
                self.orders_submitted += 1;
                debug!(
                    "Order {} for match {} submitted {:?} after goal",
                    order_id, match_id, latency
                );
            }
            EngineReport::OrderFailed { match_id, .. } => {
                self.orders_failed += 1;
                warn!("Entry order for match {} was not filled", match_id);
            }
            EngineReport::PositionClosed(closed) => match closed.status {
                PositionStatus::ClosedTakeProfit => self.closed_take_profit += 1,
                PositionStatus::ClosedTimeout => self.closed_timeout += 1,
                PositionStatus::ClosedError => self.closed_error += 1,
                PositionStatus::Open => {
                    error!("Position {} reported closed while OPEN", closed.order_id)
                }
            },
            EngineReport::PipelineFault { .. } => self.faults += 1,
        }
    }

    /// Consume reports until the channel closes
    pub async fn run(mut self, mut reports: mpsc::Receiver<EngineReport>) -> Self {
        while let Some(report) = reports.recv().await {
            self.record(&report);
        }
        self
    }
}
