use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{merge_buy, reduce_sell},
    state::WalletState,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Side {
    Buy,
    Sell,
    /// Anything that is not buy or sell. Kept so validation can reject it in order.
    Unknown(String),
}

impl Side {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("buy") {
            Self::Buy
        } else if trimmed.eq_ignore_ascii_case("sell") {
            Self::Sell
        } else {
            Self::Unknown(trimmed.to_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for Side {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for Side {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<Side> for String {
    fn from(side: Side) -> Self {
        side.as_str().to_owned()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub side: Side,
    #[serde(alias = "eventId")]
    pub instrument_id: String,
    #[serde(default, alias = "eventName")]
    pub label: String,
    pub qty: f64,
    pub price_usd: f64,
}

impl TradeRequest {
    pub fn buy(instrument_id: impl Into<String>, qty: f64, price_usd: f64) -> Self {
        Self {
            side: Side::Buy,
            instrument_id: instrument_id.into(),
            label: String::new(),
            qty,
            price_usd,
        }
    }

    pub fn sell(instrument_id: impl Into<String>, qty: f64, price_usd: f64) -> Self {
        Self {
            side: Side::Sell,
            ..Self::buy(instrument_id, qty, price_usd)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("Invalid trade data")]
    InvalidTradeData,
    #[error("Insufficient cash")]
    InsufficientFunds,
    #[error("Sell qty exceeds position")]
    InsufficientHoldings,
    #[error("Unknown side")]
    UnknownSide,
}

impl TradeError {
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidTradeData => "invalid_trade_data",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InsufficientHoldings => "insufficient_holdings",
            Self::UnknownSide => "unknown_side",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFill {
    pub side: Side,
    pub instrument_id: String,
    pub qty: f64,
    /// Price the trade actually executed at. Sells ignore the requested price.
    pub exec_price_usd: f64,
    pub cash_delta_usd: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub result: Result<TradeFill, TradeError>,
    pub state: WalletState,
}

impl TradeOutcome {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn message(&self) -> String {
        match &self.result {
            Ok(_) => "Done".to_owned(),
            Err(err) => err.to_string(),
        }
    }
}

/// Validates `request` against `state` and returns the resulting wallet.
///
/// Works on a copy: a rejected trade hands back `state` unchanged, so callers
/// can persist `outcome.state` only when `outcome.success()`.
pub fn apply_trade(state: &WalletState, request: &TradeRequest) -> TradeOutcome {
    match execute(state, request) {
        Ok((next, fill)) => TradeOutcome {
            result: Ok(fill),
            state: next,
        },
        Err(err) => TradeOutcome {
            result: Err(err),
            state: state.clone(),
        },
    }
}

fn execute(state: &WalletState, request: &TradeRequest) -> Result<(WalletState, TradeFill), TradeError> {
    let instrument_id = validate_inputs(request)?;
    let qty = request.qty;
    let price_usd = request.price_usd;

    match &request.side {
        Side::Buy => {
            let notional = qty * price_usd;
            if notional > state.cash_usd {
                return Err(TradeError::InsufficientFunds);
            }

            let mut next = state.clone();
            next.cash_usd -= notional;
            merge_buy(&mut next, instrument_id, &request.label, qty, price_usd);

            Ok((
                next,
                TradeFill {
                    side: Side::Buy,
                    instrument_id: instrument_id.to_owned(),
                    qty,
                    exec_price_usd: price_usd,
                    cash_delta_usd: -notional,
                },
            ))
        }
        Side::Sell => {
            let index = match state.position_index(instrument_id) {
                Some(index) if qty <= state.positions[index].qty => index,
                _ => return Err(TradeError::InsufficientHoldings),
            };

            let mut next = state.clone();
            let exec_price_usd = next.positions[index].max_price_usd;
            let proceeds = reduce_sell(&mut next, index, qty);
            next.cash_usd += proceeds;

            Ok((
                next,
                TradeFill {
                    side: Side::Sell,
                    instrument_id: instrument_id.to_owned(),
                    qty,
                    exec_price_usd,
                    cash_delta_usd: proceeds,
                },
            ))
        }
        Side::Unknown(_) => Err(TradeError::UnknownSide),
    }
}

fn validate_inputs(request: &TradeRequest) -> Result<&str, TradeError> {
    let instrument_id = request.instrument_id.trim();
    if instrument_id.is_empty() {
        return Err(TradeError::InvalidTradeData);
    }
    if !request.qty.is_finite() || request.qty <= 0.0 {
        return Err(TradeError::InvalidTradeData);
    }
    if !request.price_usd.is_finite() || request.price_usd <= 0.0 {
        return Err(TradeError::InvalidTradeData);
    }

    Ok(instrument_id)
}
