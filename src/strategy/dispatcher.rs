//! Dispatcher - one independent task per goal
//!
//! Each goal runs evaluate → submit → monitor on its own tokio task. A slow
//! exchange call or a panic inside one pipeline never stalls the engine loop
//! or another match.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::evaluator::EligibilityEvaluator;
use super::position::{emergency_exit, ExitRules, PositionManager};
use super::types::{Decision, EngineReport, PositionReport, SkipReason};
use crate::common::latency::{since_detection, LatencyTracker};
use crate::common::traits::MarketPort;
use crate::common::types::{GoalEvent, OrderRequest};

/// Process-wide kill switch for new entries
///
/// Halting stops new pipelines and any pipeline that has not yet submitted.
/// Positions already open keep being supervised until they close.
#[derive(Debug, Clone, Default)]
pub struct TradingHalt(Arc<AtomicBool>);

impl TradingHalt {
    pub fn new(halted: bool) -> Self {
        Self(Arc::new(AtomicBool::new(halted)))
    }

    pub fn halt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a goal pipeline ended
#[derive(Debug)]
pub enum PipelineOutcome {
    /// At least one gate failed
    Rejected(Decision),
    /// Halt was raised between evaluation and submission
    HaltedBeforeSubmit,
    /// The market port returned no fill
    SubmitFailed { latency: Duration },
    /// Entry filled and a position monitor is running
    Traded {
        order_id: String,
        latency: Duration,
        monitor: JoinHandle<PositionReport>,
    },
    /// A panic escaped the pipeline
    Faulted(String),
}

struct DispatcherInner {
    evaluator: EligibilityEvaluator,
    port: Arc<dyn MarketPort>,
    rules: ExitRules,
    halt: TradingHalt,
    in_flight: DashSet<(String, (u32, u32))>,
    positions: DashMap<String, String>,
    latency: Arc<LatencyTracker>,
    reports: Option<mpsc::Sender<EngineReport>>,
}

/// Spawns goal pipelines and tracks what is running
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(
        evaluator: EligibilityEvaluator,
        port: Arc<dyn MarketPort>,
        rules: ExitRules,
        halt: TradingHalt,
        reports: Option<mpsc::Sender<EngineReport>>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                evaluator,
                port,
                rules,
                halt,
                in_flight: DashSet::new(),
                positions: DashMap::new(),
                latency: Arc::new(LatencyTracker::new()),
                reports,
            }),
        }
    }

    pub fn halt(&self) -> &TradingHalt {
        &self.inner.halt
    }

    pub fn latency(&self) -> Arc<LatencyTracker> {
        Arc::clone(&self.inner.latency)
    }

    /// Pipelines currently between detection and fill
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Positions currently supervised
    pub fn open_positions(&self) -> usize {
        self.inner.positions.len()
    }

    /// Start the pipeline for a goal
    ///
    /// Returns `None` without spawning when trading is halted or the same
    /// goal (match and resulting score) is already being handled.
    pub fn dispatch(&self, event: GoalEvent) -> Option<JoinHandle<PipelineOutcome>> {
        let inner = &self.inner;

        if inner.halt.is_halted() {
            info!("Trading halted, ignoring goal in match {}", event.match_id);
            inner.report(EngineReport::Skipped {
                match_id: event.match_id,
                reason: SkipReason::Halted,
            });
            return None;
        }

        let key = (event.match_id.clone(), event.score_after);
        if !inner.in_flight.insert(key.clone()) {
            debug!(
                "Goal {:?} in match {} already in flight",
                event.score_after, event.match_id
            );
            inner.report(EngineReport::Skipped {
                match_id: event.match_id,
                reason: SkipReason::Duplicate,
            });
            return None;
        }

        let inner = Arc::clone(inner);
        Some(tokio::spawn(async move {
            let match_id = event.match_id.clone();
            let pipeline = Arc::clone(&inner).run_pipeline(event);

            let outcome = match AssertUnwindSafe(pipeline).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => inner.fault(&match_id, panic_message(panic.as_ref())),
            };

            inner.in_flight.remove(&key);
            outcome
        }))
    }
}

impl DispatcherInner {
    async fn run_pipeline(self: Arc<Self>, event: GoalEvent) -> PipelineOutcome {
        let decision = self.evaluator.evaluate(&event).await;
        info!(
            "Goal by {} in match {} at {}': {}",
            event.scorer,
            event.match_id,
            event.minute,
            decision.describe()
        );
        self.report(EngineReport::Decided {
            event: event.clone(),
            decision: decision.clone(),
        });

        let (size, price) = match decision {
            Decision::Trade { size, price } => (size, price),
            rejected => return PipelineOutcome::Rejected(rejected),
        };

        if self.halt.is_halted() {
            warn!("Trading halted before submit for match {}", event.match_id);
            self.report(EngineReport::Skipped {
                match_id: event.match_id,
                reason: SkipReason::HaltedBeforeSubmit,
            });
            return PipelineOutcome::HaltedBeforeSubmit;
        }

        let order = OrderRequest::buy(&event.match_id, price, size);
        let latency = since_detection(event.detected_at);
        self.latency.record(latency);

        let fill = match self.port.submit(&order).await {
            Some(fill) => fill,
            None => {
                warn!(
                    "Entry order for match {} failed ({:?} after goal)",
                    event.match_id, latency
                );
                self.report(EngineReport::OrderFailed {
                    match_id: event.match_id,
                    latency,
                });
                return PipelineOutcome::SubmitFailed { latency };
            }
        };

        let supervised = match self.positions.entry(fill.order_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(event.match_id.clone());
                true
            }
        };

        info!(
            "Entry filled for match {}: order {} at {} x {} ({:?} after goal)",
            event.match_id, fill.order_id, fill.fill_price, size, latency
        );
        self.report(EngineReport::OrderSubmitted {
            match_id: event.match_id.clone(),
            order_id: fill.order_id.clone(),
            fill_price: fill.fill_price,
            size,
            latency,
        });

        let manager = PositionManager::open(
            &fill,
            &event.match_id,
            size,
            Arc::clone(&self.port),
            self.rules.clone(),
        );
        let monitor = if supervised {
            tokio::spawn(Arc::clone(&self).supervise(manager))
        } else {
            error!(
                "Order {} for match {} is already supervised, liquidating the new fill",
                fill.order_id, event.match_id
            );
            let reason = format!("order id {} already supervised", fill.order_id);
            let inner = Arc::clone(&self);
            tokio::spawn(async move {
                let report = manager.abandon(reason).await;
                inner.report(EngineReport::PositionClosed(report.clone()));
                report
            })
        };

        PipelineOutcome::Traded {
            order_id: fill.order_id,
            latency,
            monitor,
        }
    }

    /// Run a position to its close, then release and report it
    ///
    /// A panic inside the monitor still closes the position: one sell at entry
    /// is attempted and the report carries CLOSED_ERROR.
    async fn supervise(self: Arc<Self>, manager: PositionManager) -> PositionReport {
        let position = manager.position().clone();
        let target_price = manager.target_price();

        let report = match AssertUnwindSafe(manager.run()).catch_unwind().await {
            Ok(report) => report,
            Err(panic) => {
                let reason = format!("monitor {}", panic_message(panic.as_ref()));
                error!("Position {} lost its monitor: {}", position.order_id, reason);
                emergency_exit(Arc::clone(&self.port), position, target_price, 0, reason).await
            }
        };

        self.positions.remove(&report.order_id);
        self.report(EngineReport::PositionClosed(report.clone()));
        report
    }

    fn fault(&self, match_id: &str, error: String) -> PipelineOutcome {
        error!("Pipeline for match {} faulted: {}", match_id, error);
        self.report(EngineReport::PipelineFault {
            match_id: match_id.to_string(),
            error: error.clone(),
        });
        PipelineOutcome::Faulted(error)
    }

    fn report(&self, report: EngineReport) {
        let Some(sender) = &self.reports else {
            return;
        };
        match sender.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(report)) => {
                warn!("Report channel full, dropping {:?}", report)
            }
            Err(TrySendError::Closed(_)) => debug!("Report channel closed"),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic: unknown payload".to_string()
    }
}
