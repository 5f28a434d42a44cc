pub mod favorites;
pub mod journal;
pub mod kv;
pub mod mirror;
pub mod session;
pub mod store;

pub use favorites::{Favorite, FavoriteRemoval, FavoritesStore};
pub use journal::{CsvTradeJournal, InMemoryTradeJournal, JournalEntry, TradeJournal};
pub use kv::{FileStore, KvStore, MemoryStore, SharedStore, StoreError};
pub use mirror::{ApiEnvelope, MirrorClient, MirrorError, MirroredTrade, MirroredWallet, RefreshReport, RemoteSync};
pub use session::{SharedJournal, WalletSession};
pub use store::WalletStore;

/// Wallet ops without a user id act on the seeded demo account.
pub const DEMO_USER_ID: &str = "1";
