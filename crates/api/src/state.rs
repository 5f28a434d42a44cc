use std::sync::{Arc, Mutex, MutexGuard};

use ledger::{LedgerConfig, Side, TradeOutcome, TradeRequest};
use tokio::sync::broadcast;
use wallet::{
    Favorite, FavoriteRemoval, FavoritesStore, MemoryStore, SharedJournal, SharedStore, StoreError,
    WalletSession, WalletStore,
};

use crate::search::EventCatalog;

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum WalletEvent {
    Connected,
    TradeApplied {
        user_id: String,
        side: Side,
        instrument_id: String,
        qty: f64,
        exec_price_usd: f64,
        cash_usd: f64,
    },
    TradeRejected {
        user_id: String,
        instrument_id: String,
        reason: String,
    },
    FavoriteAdded {
        user_id: String,
        instrument_id: String,
    },
    FavoriteRemoved {
        user_id: String,
        instrument_id: String,
    },
}

impl WalletEvent {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Connected => None,
            Self::TradeApplied { user_id, .. }
            | Self::TradeRejected { user_id, .. }
            | Self::FavoriteAdded { user_id, .. }
            | Self::FavoriteRemoved { user_id, .. } => Some(user_id),
        }
    }

    pub fn from_trade(user_id: &str, request: &TradeRequest, outcome: &TradeOutcome) -> Self {
        match &outcome.result {
            Ok(fill) => Self::TradeApplied {
                user_id: user_id.to_owned(),
                side: fill.side.clone(),
                instrument_id: fill.instrument_id.clone(),
                qty: fill.qty,
                exec_price_usd: fill.exec_price_usd,
                cash_usd: outcome.state.cash_usd,
            },
            Err(err) => Self::TradeRejected {
                user_id: user_id.to_owned(),
                instrument_id: request.instrument_id.clone(),
                reason: err.code().to_owned(),
            },
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    wallets: WalletStore,
    favorites: FavoritesStore,
    catalog: Arc<EventCatalog>,
    journal: Option<SharedJournal>,
    events_tx: broadcast::Sender<WalletEvent>,
    write_lock: Arc<Mutex<()>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(MemoryStore::shared(), LedgerConfig::default())
    }
}

impl AppState {
    pub fn new(store: SharedStore, config: LedgerConfig) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            wallets: WalletStore::new(store.clone(), config),
            favorites: FavoritesStore::new(store),
            catalog: Arc::new(EventCatalog::builtin()),
            journal: None,
            events_tx,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_catalog(mut self, catalog: EventCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_journal(mut self, journal: SharedJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn session(&self, user_id: &str) -> WalletSession {
        let session = WalletSession::new(user_id, self.wallets.clone());
        match &self.journal {
            Some(journal) => session.with_journal(Arc::clone(journal)),
            None => session,
        }
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    /// Runs one trade under the process-wide write lock so concurrent
    /// requests for the same wallet cannot interleave load and save.
    /// Blocks on store I/O; async callers go through `spawn_blocking`.
    pub fn execute_trade(&self, user_id: &str, request: &TradeRequest) -> TradeOutcome {
        let outcome = {
            let _guard = self.lock_writes();
            self.session(user_id).trade(request)
        };

        let _ = self.publish_event(WalletEvent::from_trade(user_id, request, &outcome));
        outcome
    }

    pub fn add_favorite(&self, user_id: &str, favorite: Favorite) -> Result<Vec<Favorite>, StoreError> {
        let instrument_id = favorite.instrument_id.clone();
        let favorites = {
            let _guard = self.lock_writes();
            self.favorites.add(user_id, favorite)?
        };

        let _ = self.publish_event(WalletEvent::FavoriteAdded {
            user_id: user_id.to_owned(),
            instrument_id,
        });
        Ok(favorites)
    }

    /// Publishes `FavoriteRemoved` only when the list actually shrank.
    pub fn remove_favorite(&self, user_id: &str, instrument_id: &str) -> Result<FavoriteRemoval, StoreError> {
        let removal = {
            let _guard = self.lock_writes();
            self.favorites.remove(user_id, instrument_id)?
        };

        if removal.removed {
            let _ = self.publish_event(WalletEvent::FavoriteRemoved {
                user_id: user_id.to_owned(),
                instrument_id: instrument_id.to_owned(),
            });
        }
        Ok(removal)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events_tx.subscribe()
    }

    pub fn publish_event(
        &self,
        event: WalletEvent,
    ) -> Result<usize, broadcast::error::SendError<WalletEvent>> {
        self.events_tx.send(event)
    }
}
