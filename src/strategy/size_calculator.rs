use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::types::TradingConfig;

/// Currency precision for order sizes
pub const SIZE_DECIMALS: u32 = 2;

/// SizeCalculator trait
///
/// Turns the account's risk settings into an order size. Implementations must
/// be pure: the same configuration always yields the same size.
pub trait SizeCalculator: Send + Sync {
    /// Size for the next entry order, rounded to currency precision
    fn order_size(&self) -> Decimal;
}

/// Risk a fixed fraction of the bankroll, capped per trade
///
/// `size = round2(min(max_per_trade, bankroll * risk_fraction))`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedFractionSizer {
    pub bankroll: Decimal,
    pub max_per_trade: Decimal,
    pub risk_fraction: Decimal,
}

impl FixedFractionSizer {
    pub fn new(bankroll: Decimal, max_per_trade: Decimal, risk_fraction: Decimal) -> Self {
        Self {
            bankroll,
            max_per_trade,
            risk_fraction,
        }
    }

    pub fn from_config(config: &TradingConfig) -> Self {
        Self::new(config.bankroll, config.max_per_trade, config.risk_fraction)
    }
}

impl SizeCalculator for FixedFractionSizer {
    fn order_size(&self) -> Decimal {
        self.max_per_trade
            .min(self.bankroll * self.risk_fraction)
            .round_dp_with_strategy(SIZE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
    }
}
