use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(alias = "eventId")]
    pub instrument_id: String,
    #[serde(default, alias = "eventName")]
    pub label: String,
    pub qty: f64,
    pub total_cost_usd: f64,
    pub min_price_usd: f64,
    pub max_price_usd: f64,
}

impl Position {
    pub fn opened(instrument_id: impl Into<String>, label: impl Into<String>, qty: f64, price_usd: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            label: label.into(),
            qty,
            total_cost_usd: qty * price_usd,
            min_price_usd: price_usd,
            max_price_usd: price_usd,
        }
    }

    /// Average cost per held unit, zero for an empty position.
    pub fn avg_cost_usd(&self) -> f64 {
        if self.qty > 0.0 {
            self.total_cost_usd / self.qty
        } else {
            0.0
        }
    }

    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.instrument_id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub cash_usd: f64,
    #[serde(default)]
    pub positions: Vec<Position>,
}

impl WalletState {
    pub fn fresh(config: &LedgerConfig) -> Self {
        Self {
            cash_usd: config.starting_cash_usd,
            positions: Vec::new(),
        }
    }

    pub fn position(&self, instrument_id: &str) -> Option<&Position> {
        self.positions
            .iter()
            .find(|position| position.instrument_id == instrument_id)
    }

    pub fn held_qty(&self, instrument_id: &str) -> f64 {
        self.position(instrument_id)
            .map(|position| position.qty)
            .unwrap_or(0.0)
    }

    pub(crate) fn position_index(&self, instrument_id: &str) -> Option<usize> {
        self.positions
            .iter()
            .position(|position| position.instrument_id == instrument_id)
    }
}

impl Default for WalletState {
    fn default() -> Self {
        Self::fresh(&LedgerConfig::default())
    }
}
