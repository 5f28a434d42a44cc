use ledger::{LedgerConfig, Position, WalletState};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::kv::{wallet_key, SharedStore, StoreError};

/// Storage adapter for wallet records. Reads never fail: anything missing or
/// malformed degrades to a fresh or coerced wallet.
#[derive(Clone)]
pub struct WalletStore {
    store: SharedStore,
    config: LedgerConfig,
}

impl WalletStore {
    pub fn new(store: SharedStore, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn load(&self, user_id: &str) -> WalletState {
        let raw = match self.store.get(&wallet_key(user_id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return WalletState::fresh(&self.config),
            Err(err) => {
                warn!(user_id, error = %err, "wallet read failed, using fresh wallet");
                return WalletState::fresh(&self.config);
            }
        };

        decode_wallet(&raw, &self.config).unwrap_or_else(|| {
            debug!(user_id, "stored wallet is malformed, using fresh wallet");
            WalletState::fresh(&self.config)
        })
    }

    /// Best-effort persistence: failures are logged and swallowed.
    pub fn save(&self, user_id: &str, state: &WalletState) {
        if let Err(err) = self.try_save(user_id, state) {
            warn!(user_id, error = %err, "wallet persistence failed");
        }
    }

    pub fn try_save(&self, user_id: &str, state: &WalletState) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(state)?;
        self.store.set(&wallet_key(user_id), encoded)
    }
}

/// Parses a stored wallet record, coercing bad fields. Returns `None` when the
/// record is not a JSON object at all.
pub fn decode_wallet(raw: &str, config: &LedgerConfig) -> Option<WalletState> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let record = value.as_object()?;

    let cash_usd = field_amount(record, &["cashUsd"]).unwrap_or(config.starting_cash_usd);
    let positions = match record.get("positions") {
        Some(Value::Array(items)) => decode_positions(items),
        _ => Vec::new(),
    };

    Some(WalletState {
        cash_usd,
        positions,
    })
}

/// Coerces a list of position records, dropping unusable entries and merging
/// duplicates into their first occurrence.
pub fn decode_positions(items: &[Value]) -> Vec<Position> {
    let mut positions: Vec<Position> = Vec::with_capacity(items.len());

    for position in items.iter().filter_map(decode_position) {
        match positions
            .iter_mut()
            .find(|existing| existing.instrument_id == position.instrument_id)
        {
            Some(existing) => {
                existing.qty += position.qty;
                existing.total_cost_usd += position.total_cost_usd;
                existing.min_price_usd = existing.min_price_usd.min(position.min_price_usd);
                existing.max_price_usd = existing.max_price_usd.max(position.max_price_usd);
            }
            None => positions.push(position),
        }
    }

    positions
}

fn decode_position(value: &Value) -> Option<Position> {
    let record = value.as_object()?;

    let instrument_id = field_text(record, &["instrumentId", "eventId"])?;
    if instrument_id.is_empty() {
        return None;
    }
    let qty = field_amount(record, &["qty"]).filter(|qty| *qty > 0.0)?;
    let label = field_text(record, &["label", "eventName"]).unwrap_or_default();

    let total_cost_usd = field_amount(record, &["totalCostUsd"])
        .or_else(|| field_amount(record, &["avgCostUsd"]).map(|avg| avg * qty))
        .unwrap_or(0.0);
    let min_price = field_amount(record, &["minPriceUsd"]);
    let max_price = field_amount(record, &["maxPriceUsd"]);

    Some(Position {
        instrument_id,
        label,
        qty,
        total_cost_usd,
        min_price_usd: min_price.or(max_price).unwrap_or(0.0),
        max_price_usd: max_price.or(min_price).unwrap_or(0.0),
    })
}

/// First finite, non-negative number under any of `keys`. Numeric strings count.
fn field_amount(record: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .filter_map(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        })
        .find(|amount| amount.is_finite() && *amount >= 0.0)
}

fn field_text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(|value| match value {
            Value::String(text) => Some(text.trim().to_owned()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
}
