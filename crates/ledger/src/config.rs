pub const DEFAULT_STARTING_CASH_USD: f64 = 2_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerConfig {
    pub starting_cash_usd: f64,
}

impl LedgerConfig {
    pub fn with_starting_cash(starting_cash_usd: f64) -> Self {
        assert!(
            starting_cash_usd.is_finite() && starting_cash_usd >= 0.0,
            "starting_cash_usd must be finite and non-negative"
        );

        Self { starting_cash_usd }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_cash_usd: DEFAULT_STARTING_CASH_USD,
        }
    }
}
