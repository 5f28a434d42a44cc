use serde::Serialize;

use crate::state::WalletState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionValuation {
    pub instrument_id: String,
    pub label: String,
    pub qty: f64,
    pub market_value: f64,
    pub avg_cost: f64,
    pub max_price_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub per_position: Vec<PositionValuation>,
    pub cash_usd: f64,
    pub total_value: f64,
}

/// Marks every position at its historical high; there is no live quote feed.
pub fn valuate(state: &WalletState) -> Valuation {
    let per_position: Vec<PositionValuation> = state
        .positions
        .iter()
        .map(|position| PositionValuation {
            instrument_id: position.instrument_id.clone(),
            label: position.display_name().to_owned(),
            qty: position.qty,
            market_value: position.max_price_usd * position.qty,
            avg_cost: position.avg_cost_usd(),
            max_price_usd: position.max_price_usd,
        })
        .collect();

    let total_value = per_position
        .iter()
        .fold(state.cash_usd, |total, position| total + position.market_value);

    Valuation {
        per_position,
        cash_usd: state.cash_usd,
        total_value,
    }
}

pub fn format_usd(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${amount:.2}")
    }
}
