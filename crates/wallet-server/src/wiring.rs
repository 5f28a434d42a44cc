use std::{
    fs::{self, OpenOptions},
    io,
    path::Path,
    sync::{Arc, Mutex},
};

use api::{AppState, CatalogError, EventCatalog};
use axum::{routing::get, Router};
use ledger::LedgerConfig;
use tracing::info;
use wallet::{CsvTradeJournal, FileStore, MemoryStore, SharedJournal, SharedStore, StoreError};

use crate::config::{Config, StoreBackend};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("wallet store could not be opened: {0}")]
    Store(#[from] StoreError),
    #[error("trade journal could not be initialized: {0}")]
    Journal(#[source] io::Error),
    #[error("event catalog could not be loaded: {0}")]
    Catalog(#[from] CatalogError),
}

pub fn build_app(state: AppState) -> Router {
    api::app(state).route("/health", get(healthcheck))
}

pub fn build_state(config: &Config) -> Result<AppState, StartupError> {
    let store: SharedStore = match &config.store {
        StoreBackend::Memory => {
            info!("using in-memory wallet store");
            MemoryStore::shared()
        }
        StoreBackend::File(path) => {
            info!(path = %path.display(), "using file wallet store");
            Arc::new(FileStore::open(path)?)
        }
    };

    let journal = open_journal(&config.journal_path).map_err(StartupError::Journal)?;
    let mut state = AppState::new(store, LedgerConfig::with_starting_cash(config.starting_cash_usd))
        .with_journal(journal);

    if let Some(path) = &config.events_path {
        let catalog = EventCatalog::from_path(path)?;
        info!(path = %path.display(), events = catalog.events().len(), "loaded event catalog");
        state = state.with_catalog(catalog);
    }

    Ok(state)
}

/// Opens the journal for appending, writing the CSV header only when the
/// file is new or empty.
pub fn open_journal(path: &Path) -> io::Result<SharedJournal> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let needs_header = file.metadata()?.len() == 0;
    let mut journal = CsvTradeJournal::new(file);
    if needs_header {
        journal.write_header()?;
    }

    Ok(Arc::new(Mutex::new(journal)))
}

async fn healthcheck() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::fs;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use wallet::journal::JOURNAL_CSV_HEADER;

    use super::{build_app, build_state, open_journal};
    use crate::config::{Config, StoreBackend};

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            store: StoreBackend::File(root.join("wallets.json")),
            starting_cash_usd: 750.0,
            journal_path: root.join("nested").join("trades.csv"),
            events_path: None,
        }
    }

    #[tokio::test]
    async fn server_healthcheck_responds_ok() {
        let app = build_app(api::AppState::default());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn open_journal_creates_parent_dir_and_writes_header_once() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("nested").join("trades.csv");

        open_journal(&path).expect("first open should create the journal");
        open_journal(&path).expect("reopen should keep the journal");

        let actual = fs::read_to_string(&path).expect("journal file should exist");
        assert_eq!(actual, JOURNAL_CSV_HEADER);
    }

    #[tokio::test]
    async fn built_state_uses_configured_cash_store_and_journal() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let app = build_app(build_state(&config).unwrap());

        let response = app
            .oneshot(
                Request::post("/trade")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"userId":"7","side":"BUY","eventId":"evt1","qty":2,"priceUsd":25}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap())
                .unwrap();

        assert_eq!(body["success"], true);
        let stored = fs::read_to_string(root.path().join("wallets.json")).unwrap();
        assert!(stored.contains("wallet:7"));
        let journal = fs::read_to_string(&config.journal_path).unwrap();
        assert_eq!(journal.lines().count(), 2);
        assert!(journal.ends_with(",7,BUY,evt1,2,25,25,applied\n"));
    }

    #[test]
    fn missing_catalog_file_is_a_startup_error() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.events_path = Some(root.path().join("absent.json"));

        let err = build_state(&config).err().expect("catalog load should fail");

        assert!(err.to_string().starts_with("event catalog could not be loaded"));
    }
}
