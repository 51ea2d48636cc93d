//! Strategy module - from goal detection to closed position
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                ENGINE LOOP (single task)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Feed snapshot arrives                                      │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  SignalDetector.process() → Option<GoalEvent>               │
//! │       │                                                     │
//! │       ▼ (if goal)                                           │
//! │  Dispatcher.dispatch() → spawn, return immediately          │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                PIPELINE (one task per goal)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EligibilityEvaluator.evaluate() → Trade / NoTrade          │
//! │       │                                                     │
//! │       ▼ (if Trade, not halted)                              │
//! │  MarketPort.submit(BUY)                                     │
//! │       │                                                     │
//! │       ▼ (if filled)                                         │
//! │  PositionManager.run() on its own task                      │
//! │    - take profit at entry × (1 + pct)                       │
//! │    - liquidate after the hold timeout                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`SignalDetector`]: Score-change detection per match
//! - [`EligibilityEvaluator`]: Minute, underdog, price and liquidity gates
//! - [`SizeCalculator`]: Order sizing from bankroll settings
//! - [`PositionManager`]: Exit supervision for one filled entry
//! - [`Dispatcher`]: Task-per-goal execution with halt and dedupe

mod detector;
mod dispatcher;
mod evaluator;
mod position;
mod size_calculator;
pub mod types;

pub use detector::{parse_minute, parse_score, SignalDetector};

pub use dispatcher::{Dispatcher, PipelineOutcome, TradingHalt};

pub use evaluator::{decide, EligibilityEvaluator};

pub use position::{ExitRules, PositionManager};

pub use size_calculator::{FixedFractionSizer, SizeCalculator, SIZE_DECIMALS};

pub use types::{
    Decision, EngineReport, Gate, GateFailure, Position, PositionReport, PositionStatus,
    SkipReason,
};
