use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::kv::{favorites_key, SharedStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(alias = "eventId")]
    pub instrument_id: String,
    #[serde(default, alias = "eventName")]
    pub label: String,
}

impl Favorite {
    pub fn new(instrument_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteRemoval {
    pub favorites: Vec<Favorite>,
    pub removed: bool,
}

/// Per-user favorites, newest first.
#[derive(Clone)]
pub struct FavoritesStore {
    store: SharedStore,
}

impl FavoritesStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn list(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let Some(raw) = self.store.get(&favorites_key(user_id))? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<Favorite>>(&raw) {
            Ok(favorites) => Ok(favorites
                .into_iter()
                .filter(|favorite| !favorite.instrument_id.trim().is_empty())
                .collect()),
            Err(err) => {
                warn!(user_id, error = %err, "discarding malformed favorites record");
                Ok(Vec::new())
            }
        }
    }

    /// Adds `favorite` at the front, or relabels it in place when already present.
    pub fn add(&self, user_id: &str, favorite: Favorite) -> Result<Vec<Favorite>, StoreError> {
        let mut favorites = self.list(user_id)?;
        match favorites
            .iter_mut()
            .find(|existing| existing.instrument_id == favorite.instrument_id)
        {
            Some(existing) => existing.label = favorite.label,
            None => favorites.insert(0, favorite),
        }

        self.write(user_id, &favorites)?;
        Ok(favorites)
    }

    /// Removing an id that is not listed leaves the record untouched.
    pub fn remove(&self, user_id: &str, instrument_id: &str) -> Result<FavoriteRemoval, StoreError> {
        let mut favorites = self.list(user_id)?;
        let before = favorites.len();
        favorites.retain(|favorite| favorite.instrument_id != instrument_id);

        let removed = favorites.len() != before;
        if removed {
            self.write(user_id, &favorites)?;
        }
        Ok(FavoriteRemoval { favorites, removed })
    }

    fn write(&self, user_id: &str, favorites: &[Favorite]) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(favorites)?;
        self.store.set(&favorites_key(user_id), encoded)
    }
}
