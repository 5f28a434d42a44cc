use std::sync::{Arc, Mutex};

use ledger::{apply_trade, valuate, TradeOutcome, TradeRequest, Valuation, WalletState};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    journal::{JournalEntry, TradeJournal},
    store::WalletStore,
};

pub type SharedJournal = Arc<Mutex<dyn TradeJournal + Send>>;

/// Everything a wallet operation needs, passed explicitly: who the user is,
/// where their wallet lives, and where trade attempts are journaled.
#[derive(Clone)]
pub struct WalletSession {
    user_id: String,
    wallets: WalletStore,
    journal: Option<SharedJournal>,
}

impl WalletSession {
    pub fn new(user_id: impl Into<String>, wallets: WalletStore) -> Self {
        Self {
            user_id: user_id.into(),
            wallets,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: SharedJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn wallet(&self) -> WalletState {
        self.wallets.load(&self.user_id)
    }

    pub fn valuation(&self) -> Valuation {
        valuate(&self.wallet())
    }

    /// Load, apply, and persist on success. The returned state is what was
    /// saved, or the untouched wallet when the trade was rejected.
    pub fn trade(&self, request: &TradeRequest) -> TradeOutcome {
        let current = self.wallet();
        let outcome = apply_trade(&current, request);

        match &outcome.result {
            Ok(fill) => {
                self.wallets.save(&self.user_id, &outcome.state);
                info!(
                    user_id = %self.user_id,
                    side = %fill.side,
                    instrument_id = %fill.instrument_id,
                    qty = fill.qty,
                    exec_price_usd = fill.exec_price_usd,
                    cash_usd = outcome.state.cash_usd,
                    "trade applied"
                );
            }
            Err(err) => {
                info!(
                    user_id = %self.user_id,
                    side = %request.side,
                    instrument_id = %request.instrument_id,
                    reason = err.code(),
                    "trade rejected"
                );
            }
        }

        self.journal_outcome(request, &outcome);
        outcome
    }

    /// Overwrites the local wallet, e.g. with a copy pulled from the mirror.
    pub fn replace(&self, state: &WalletState) {
        self.wallets.save(&self.user_id, state);
    }

    fn journal_outcome(&self, request: &TradeRequest, outcome: &TradeOutcome) {
        let Some(journal) = &self.journal else {
            return;
        };

        let entry = JournalEntry::from_outcome(&self.user_id, request, outcome, OffsetDateTime::now_utc());
        match journal.lock() {
            Ok(mut journal) => journal.record(entry),
            Err(_) => warn!(user_id = %self.user_id, "trade journal lock poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use ledger::{LedgerConfig, TradeError, TradeRequest, WalletState};

    use super::{SharedJournal, WalletSession};
    use crate::{
        journal::InMemoryTradeJournal,
        kv::{MemoryStore, SharedStore},
        store::WalletStore,
    };

    fn session_on(store: SharedStore, user_id: &str) -> WalletSession {
        WalletSession::new(user_id, WalletStore::new(store, LedgerConfig::default()))
    }

    #[test]
    fn successful_trade_is_persisted() {
        let store = MemoryStore::shared();
        let session = session_on(store.clone(), "1");

        let outcome = session.trade(&TradeRequest::buy("evt1", 5.0, 10.0));

        assert!(outcome.success());
        let reloaded = session_on(store, "1").wallet();
        assert_eq!(reloaded.cash_usd, 1_950.0);
        assert_eq!(reloaded.held_qty("evt1"), 5.0);
    }

    #[test]
    fn rejected_trade_leaves_stored_wallet_untouched() {
        let store = MemoryStore::shared();
        let session = session_on(store, "1");
        session.trade(&TradeRequest::buy("evt1", 2.0, 10.0));
        let before = session.wallet();

        let outcome = session.trade(&TradeRequest::sell("evt1", 5.0, 10.0));

        assert_eq!(outcome.result, Err(TradeError::InsufficientHoldings));
        assert_eq!(outcome.state, before);
        assert_eq!(session.wallet(), before);
    }

    #[test]
    fn sessions_for_different_users_are_isolated() {
        let store = MemoryStore::shared();
        let alice = session_on(store.clone(), "alice");
        let bob = session_on(store, "bob");

        alice.trade(&TradeRequest::buy("evt1", 1.0, 100.0));

        assert_eq!(alice.wallet().cash_usd, 1_900.0);
        assert_eq!(bob.wallet(), WalletState::default());
    }

    #[test]
    fn every_attempt_is_journaled() {
        let journal = Arc::new(Mutex::new(InMemoryTradeJournal::new()));
        let shared: SharedJournal = journal.clone();
        let session = session_on(MemoryStore::shared(), "1").with_journal(shared);

        session.trade(&TradeRequest::buy("evt1", 1.0, 10.0));
        session.trade(&TradeRequest::buy("evt1", 1_000.0, 10.0));

        let journal = journal.lock().unwrap();
        let outcomes: Vec<&str> = journal
            .entries()
            .iter()
            .map(|entry| entry.outcome_label())
            .collect();
        assert_eq!(outcomes, vec!["applied", "insufficient_funds"]);
    }

    #[test]
    fn valuation_reflects_persisted_wallet() {
        let session = session_on(MemoryStore::shared(), "1");
        session.trade(&TradeRequest::buy("evt1", 5.0, 10.0));
        session.trade(&TradeRequest::buy("evt1", 5.0, 20.0));

        let valuation = session.valuation();

        assert_eq!(valuation.per_position[0].market_value, 200.0);
        assert_eq!(valuation.total_value, 2_050.0);
    }
}
