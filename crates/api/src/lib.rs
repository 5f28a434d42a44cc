pub mod routes;
pub mod search;
pub mod state;
mod ws;

use axum::Router;

pub use search::{CatalogError, CatalogEvent, EventCatalog};
pub use state::{AppState, WalletEvent};

pub fn app(state: AppState) -> Router {
    routes::router(state)
}
