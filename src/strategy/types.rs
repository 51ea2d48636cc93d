use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::common::types::GoalEvent;

/// Eligibility gates, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Minute,
    Underdog,
    Price,
    Liquidity,
}

/// Why a single gate rejected a goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum GateFailure {
    /// Goal came before the minimum minute
    Minute { minute: u32, min_minute: u32 },
    /// Scoring team was not the pre-event underdog
    Underdog,
    /// Market already prices the scorer at or above the threshold
    Price { price: Decimal, threshold: Decimal },
    /// Not enough open interest
    Liquidity { liquidity: u64, min_liquidity: u64 },
}

impl GateFailure {
    pub fn gate(&self) -> Gate {
        match self {
            GateFailure::Minute { .. } => Gate::Minute,
            GateFailure::Underdog => Gate::Underdog,
            GateFailure::Price { .. } => Gate::Price,
            GateFailure::Liquidity { .. } => Gate::Liquidity,
        }
    }
}

impl fmt::Display for GateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateFailure::Minute { minute, min_minute } => {
                write!(f, "time < {} min ({} min)", min_minute, minute)
            }
            GateFailure::Underdog => write!(f, "scorer was not the underdog"),
            GateFailure::Price { price, threshold } => {
                write!(f, "price {} >= threshold {}", price, threshold)
            }
            GateFailure::Liquidity {
                liquidity,
                min_liquidity,
            } => write!(f, "low liquidity ({} < {})", liquidity, min_liquidity),
        }
    }
}

/// Outcome of evaluating a goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Buy `size` at `price`
    Trade { size: Decimal, price: Decimal },
    /// Every failing gate, one entry per gate, in gate order
    NoTrade { reasons: Vec<GateFailure> },
}

impl Decision {
    /// Returns true if this is a Trade decision
    pub fn is_trade(&self) -> bool {
        matches!(self, Self::Trade { .. })
    }

    /// Gates that failed, empty for a trade
    pub fn failed_gates(&self) -> Vec<Gate> {
        match self {
            Decision::Trade { .. } => Vec::new(),
            Decision::NoTrade { reasons } => reasons.iter().map(GateFailure::gate).collect(),
        }
    }

    /// Human-readable reason list
    pub fn describe(&self) -> String {
        match self {
            Decision::Trade { size, price } => format!("trade {} at {}", size, price),
            Decision::NoTrade { reasons } => reasons
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Position lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    #[serde(rename = "CLOSED_TP")]
    ClosedTakeProfit,
    ClosedTimeout,
    ClosedError,
}

impl PositionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PositionStatus::Open)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "OPEN"),
            PositionStatus::ClosedTakeProfit => write!(f, "CLOSED_TP"),
            PositionStatus::ClosedTimeout => write!(f, "CLOSED_TIMEOUT"),
            PositionStatus::ClosedError => write!(f, "CLOSED_ERROR"),
        }
    }
}

/// A filled entry order under supervision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub order_id: String,
    pub market_id: String,
    pub entry_price: Decimal,
    pub size: Decimal,
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
}

/// Final record of a position, produced once it leaves OPEN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionReport {
    pub order_id: String,
    pub market_id: String,
    pub status: PositionStatus,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    /// Price the exit order was sent at
    pub exit_price: Option<Decimal>,
    pub exit_order_id: Option<String>,
    pub reason: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    /// Number of market polls made while open
    pub polls: u32,
}

/// Why a goal never reached evaluation or submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Trading was halted when the goal arrived
    Halted,
    /// Trading was halted after evaluation, before submission
    HaltedBeforeSubmit,
    /// A pipeline for the same goal is already running
    Duplicate,
}

/// Everything the engine reports to its observability sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineReport {
    Skipped {
        match_id: String,
        reason: SkipReason,
    },
    Decided {
        event: GoalEvent,
        decision: Decision,
    },
    OrderSubmitted {
        match_id: String,
        order_id: String,
        fill_price: Decimal,
        size: Decimal,
        latency: Duration,
    },
    OrderFailed {
        match_id: String,
        latency: Duration,
    },
    PositionClosed(PositionReport),
    PipelineFault {
        match_id: String,
        error: String,
    },
}
