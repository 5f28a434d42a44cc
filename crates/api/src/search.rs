use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEvent {
    #[serde(alias = "eventId")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default, alias = "date")]
    pub local_date: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("event catalog could not be read: {0}")]
    Io(#[from] io::Error),
    #[error("event catalog is not a JSON list of events: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCatalog {
    events: Vec<CatalogEvent>,
}

impl EventCatalog {
    pub fn new(events: Vec<CatalogEvent>) -> Self {
        Self { events }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            event("E1", "Taylor Swift | The Eras Tour", "SoFi Stadium", "2025-12-20"),
            event(
                "E2",
                "Los Angeles Lakers vs Boston Celtics",
                "Crypto.com Arena",
                "2025-12-25",
            ),
        ])
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let events: Option<Vec<CatalogEvent>> = serde_json::from_str(raw)?;
        Ok(Self::new(events.unwrap_or_default()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn events(&self) -> &[CatalogEvent] {
        &self.events
    }

    /// Case-insensitive search. `keyword` hits name or venue, `city` hits
    /// venue; blank criteria match everything.
    pub fn search(&self, keyword: &str, city: &str) -> Vec<CatalogEvent> {
        let keyword = keyword.trim().to_lowercase();
        let city = city.trim().to_lowercase();

        self.events
            .iter()
            .filter(|event| {
                let name = event.name.to_lowercase();
                let venue = event.venue.to_lowercase();
                let keyword_ok = keyword.is_empty() || name.contains(&keyword) || venue.contains(&keyword);
                let city_ok = city.is_empty() || venue.contains(&city);
                keyword_ok && city_ok
            })
            .cloned()
            .collect()
    }
}

fn event(id: &str, name: &str, venue: &str, local_date: &str) -> CatalogEvent {
    CatalogEvent {
        id: id.to_owned(),
        name: name.to_owned(),
        venue: venue.to_owned(),
        local_date: local_date.to_owned(),
        image: String::new(),
    }
}
