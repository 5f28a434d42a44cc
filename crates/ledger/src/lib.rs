mod aggregate;
mod config;
mod state;
mod trade;
mod valuation;

pub use config::{LedgerConfig, DEFAULT_STARTING_CASH_USD};
pub use state::{Position, WalletState};
pub use trade::{apply_trade, Side, TradeError, TradeFill, TradeOutcome, TradeRequest};
pub use valuation::{format_usd, valuate, PositionValuation, Valuation};

#[cfg(test)]
mod tests {
    use super::{LedgerConfig, WalletState};

    #[test]
    fn ledger_config_defaults_to_two_thousand_usd() {
        let config = LedgerConfig::default();
        assert_eq!(config.starting_cash_usd, 2_000.0);
    }

    #[test]
    fn fresh_wallet_starts_with_configured_cash_and_no_positions() {
        let state = WalletState::fresh(&LedgerConfig::with_starting_cash(500.0));
        assert_eq!(state.cash_usd, 500.0);
        assert!(state.positions.is_empty());
    }

    #[test]
    #[should_panic(expected = "starting_cash_usd must be finite and non-negative")]
    fn ledger_config_rejects_invalid_starting_cash() {
        let _ = LedgerConfig::with_starting_cash(f64::NAN);
    }
}
