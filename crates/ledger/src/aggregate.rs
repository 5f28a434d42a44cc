use crate::state::{Position, WalletState};

/// Folds a buy into the instrument's position, opening one if none is held.
/// Min/max track every price the position has traded at.
pub(crate) fn merge_buy(state: &mut WalletState, instrument_id: &str, label: &str, qty: f64, price_usd: f64) {
    match state.position_index(instrument_id) {
        Some(index) => {
            let position = &mut state.positions[index];
            position.qty += qty;
            position.total_cost_usd += qty * price_usd;
            position.min_price_usd = position.min_price_usd.min(price_usd);
            position.max_price_usd = position.max_price_usd.max(price_usd);
            if position.label.trim().is_empty() && !label.trim().is_empty() {
                position.label = label.to_owned();
            }
        }
        None => state
            .positions
            .push(Position::opened(instrument_id, label, qty, price_usd)),
    }
}

/// Removes `qty` units at average cost and returns the proceeds, priced at the
/// position's historical high. Caller guarantees `qty <= held`.
pub(crate) fn reduce_sell(state: &mut WalletState, index: usize, qty: f64) -> f64 {
    let position = &mut state.positions[index];
    let proceeds = qty * position.max_price_usd;
    let avg_cost = position.avg_cost_usd();

    position.total_cost_usd = (position.total_cost_usd - avg_cost * qty).max(0.0);
    position.qty -= qty;

    if position.qty <= 0.0 {
        state.positions.remove(index);
    }

    proceeds
}
