use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger::{valuate, Position, TradeRequest, Valuation, WalletState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use wallet::{ApiEnvelope, Favorite, StoreError, DEMO_USER_ID};

use crate::{
    search::CatalogEvent,
    state::AppState,
    ws,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/wallet", get(wallet))
        .route("/wallet/summary", get(wallet_summary))
        .route("/wallet/view", get(wallet_view))
        .route("/trade", post(trade))
        .route(
            "/favorites",
            get(list_favorites).post(add_favorite).delete(remove_favorite),
        )
        .route("/search", get(search))
        .route("/ws/events", get(ws::events_socket))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteQuery {
    user_id: Option<String>,
    #[serde(alias = "instrumentId")]
    event_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    city: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CashView {
    cash_usd: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionView {
    instrument_id: String,
    label: String,
    qty: f64,
    total_cost_usd: f64,
    avg_cost_usd: f64,
    min_price_usd: f64,
    max_price_usd: f64,
    market_value_usd: f64,
}

impl From<&Position> for PositionView {
    fn from(position: &Position) -> Self {
        Self {
            instrument_id: position.instrument_id.clone(),
            label: position.label.clone(),
            qty: position.qty,
            total_cost_usd: position.total_cost_usd,
            avg_cost_usd: position.avg_cost_usd(),
            min_price_usd: position.min_price_usd,
            max_price_usd: position.max_price_usd,
            market_value_usd: position.max_price_usd * position.qty,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeBody {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(flatten)]
    request: TradeRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteBody {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(alias = "eventId")]
    instrument_id: String,
    #[serde(default, alias = "eventName")]
    label: String,
}

fn user_or_demo(user_id: Option<&str>) -> String {
    user_id
        .map(str::trim)
        .filter(|user_id| !user_id.is_empty())
        .unwrap_or(DEMO_USER_ID)
        .to_owned()
}

/// Body user ids arrive as strings or as numbers.
fn body_user(user_id: Option<&Value>) -> String {
    match user_id {
        Some(Value::String(text)) => user_or_demo(Some(text)),
        Some(Value::Number(number)) => number.to_string(),
        _ => DEMO_USER_ID.to_owned(),
    }
}

fn envelope<T: Serialize>(envelope: ApiEnvelope<T>) -> Response {
    Json(envelope).into_response()
}

/// Store mutations do blocking file I/O under a std mutex, so they run on
/// the blocking pool rather than a runtime worker.
async fn off_runtime<T, F>(work: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "blocking store task failed");
            None
        }
    }
}

fn storage_failure(err: StoreError) -> Response {
    warn!(error = %err, "favorites storage failed");
    envelope(ApiEnvelope::<()>::error(format!("Storage error: {err}")))
}

async fn wallet(State(state): State<AppState>, Query(query): Query<WalletQuery>) -> Response {
    let user_id = user_or_demo(query.user_id.as_deref());
    let Some(kind) = query.kind else {
        return envelope(ApiEnvelope::<()>::error("Missing parameters"));
    };

    let wallet: WalletState = state.session(&user_id).wallet();
    if kind.eq_ignore_ascii_case("cash") {
        envelope(ApiEnvelope::ok(
            "OK",
            CashView {
                cash_usd: wallet.cash_usd,
            },
        ))
    } else if kind.eq_ignore_ascii_case("positions") {
        let positions: Vec<PositionView> = wallet.positions.iter().map(PositionView::from).collect();
        envelope(ApiEnvelope::ok("OK", positions))
    } else {
        envelope(ApiEnvelope::<()>::error("Unknown type"))
    }
}

async fn wallet_summary(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<ApiEnvelope<Valuation>> {
    let user_id = user_or_demo(query.user_id.as_deref());
    Json(ApiEnvelope::ok("OK", state.session(&user_id).valuation()))
}

async fn wallet_view(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Html<String> {
    let user_id = user_or_demo(query.user_id.as_deref());
    let valuation = valuate(&state.session(&user_id).wallet());
    Html(ui::render_wallet_page(&user_id, &valuation))
}

async fn trade(State(state): State<AppState>, Json(body): Json<Value>) -> Json<ApiEnvelope<WalletState>> {
    let body: TradeBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(_) => return Json(ApiEnvelope::error("Invalid trade data")),
    };
    let user_id = body_user(body.user_id.as_ref());

    let Some(outcome) = off_runtime(move || state.execute_trade(&user_id, &body.request)).await else {
        return Json(ApiEnvelope::error("Internal error"));
    };
    Json(ApiEnvelope {
        success: outcome.success(),
        message: Some(outcome.message()),
        data: Some(outcome.state),
    })
}

async fn list_favorites(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    let Some(user_id) = query.user_id.filter(|user_id| !user_id.trim().is_empty()) else {
        return envelope(ApiEnvelope::<()>::error("Missing userId"));
    };

    match state.favorites().list(user_id.trim()) {
        Ok(favorites) => envelope(ApiEnvelope::ok("OK", favorites)),
        Err(err) => storage_failure(err),
    }
}

async fn add_favorite(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let body = match serde_json::from_value::<FavoriteBody>(body) {
        Ok(body) if !body.instrument_id.trim().is_empty() => body,
        _ => return envelope(ApiEnvelope::<()>::error("Missing params")),
    };
    let user_id = body_user(body.user_id.as_ref());
    let favorite = Favorite::new(body.instrument_id.trim(), body.label);

    match off_runtime(move || state.add_favorite(&user_id, favorite)).await {
        Some(Ok(favorites)) => envelope(ApiEnvelope::ok("Favorited", favorites)),
        Some(Err(err)) => storage_failure(err),
        None => envelope(ApiEnvelope::<()>::error("Internal error")),
    }
}

async fn remove_favorite(State(state): State<AppState>, Query(query): Query<FavoriteQuery>) -> Response {
    let user_id = query.user_id.as_deref().map(str::trim).unwrap_or_default().to_owned();
    let instrument_id = query.event_id.as_deref().map(str::trim).unwrap_or_default().to_owned();
    if user_id.is_empty() || instrument_id.is_empty() {
        return envelope(ApiEnvelope::<()>::error("Missing params"));
    }

    match off_runtime(move || state.remove_favorite(&user_id, &instrument_id)).await {
        Some(Ok(removal)) => envelope(ApiEnvelope::ok("Removed", removal.favorites)),
        Some(Err(err)) => storage_failure(err),
        None => envelope(ApiEnvelope::<()>::error("Internal error")),
    }
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Json<ApiEnvelope<Vec<CatalogEvent>>> {
    Json(ApiEnvelope::ok(
        "OK",
        state.catalog().search(&query.keyword, &query.city),
    ))
}
