use std::time::Duration;

use ledger::{Position, TradeOutcome, TradeRequest, WalletState};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{session::WalletSession, store::decode_positions};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("mirror request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mirror returned HTTP {0}")]
    Status(StatusCode),
    #[error("mirror rejected request: {0}")]
    Rejected(String),
    #[error("mirror payload malformed: {0}")]
    Decode(&'static str),
}

/// `{success, message?, data?}` envelope shared by every wallet endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteTradeBody<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    request: &'a TradeRequest,
}

#[derive(Debug, Clone)]
pub struct MirrorClient {
    http: Client,
    base_url: String,
}

impl MirrorClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, MirrorError> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_cash(&self, user_id: &str) -> Result<f64, MirrorError> {
        let data = self.get_wallet_data("cash", user_id).await?;
        data.get("cashUsd")
            .and_then(|cash| match cash {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            })
            .filter(|cash| cash.is_finite() && *cash >= 0.0)
            .ok_or(MirrorError::Decode("cashUsd missing or invalid"))
    }

    pub async fn fetch_positions(&self, user_id: &str) -> Result<Vec<Position>, MirrorError> {
        match self.get_wallet_data("positions", user_id).await? {
            Value::Array(items) => Ok(decode_positions(&items)),
            _ => Err(MirrorError::Decode("positions is not a list")),
        }
    }

    pub async fn fetch_wallet(&self, user_id: &str) -> Result<WalletState, MirrorError> {
        let cash_usd = self.fetch_cash(user_id).await?;
        let positions = self.fetch_positions(user_id).await?;
        Ok(WalletState {
            cash_usd,
            positions,
        })
    }

    pub async fn post_trade(&self, user_id: &str, request: &TradeRequest) -> Result<(), MirrorError> {
        let response = self
            .http
            .post(format!("{}/trade", self.base_url))
            .json(&RemoteTradeBody { user_id, request })
            .send()
            .await?;
        let envelope: ApiEnvelope<Value> = decode_envelope(response).await?;
        if !envelope.success {
            return Err(MirrorError::Rejected(
                envelope.message.unwrap_or_else(|| "trade rejected".to_owned()),
            ));
        }
        Ok(())
    }

    async fn get_wallet_data(&self, kind: &str, user_id: &str) -> Result<Value, MirrorError> {
        let response = self
            .http
            .get(format!("{}/wallet", self.base_url))
            .query(&[("type", kind), ("userId", user_id)])
            .send()
            .await?;
        let envelope: ApiEnvelope<Value> = decode_envelope(response).await?;
        if !envelope.success {
            return Err(MirrorError::Rejected(
                envelope.message.unwrap_or_else(|| format!("{kind} fetch failed")),
            ));
        }
        envelope
            .data
            .ok_or(MirrorError::Decode("envelope has no data"))
    }
}

async fn decode_envelope(response: reqwest::Response) -> Result<ApiEnvelope<Value>, MirrorError> {
    let status = response.status();
    if !status.is_success() {
        return Err(MirrorError::Status(status));
    }
    response
        .json::<ApiEnvelope<Value>>()
        .await
        .map_err(|_| MirrorError::Decode("response is not a JSON envelope"))
}

#[derive(Debug)]
pub enum RemoteSync {
    Synced,
    /// Local state stayed authoritative because the mirror call failed.
    Fallback(MirrorError),
    /// Nothing was sent, e.g. the trade was rejected locally.
    Skipped,
}

impl RemoteSync {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

#[derive(Debug)]
pub struct RefreshReport {
    pub state: WalletState,
    pub remote: RemoteSync,
}

#[derive(Debug)]
pub struct MirroredTrade {
    pub outcome: TradeOutcome,
    pub remote: RemoteSync,
}

/// A session whose wallet is opportunistically mirrored over HTTP. Local
/// storage stays the system of record whenever the mirror is unreachable.
#[derive(Clone)]
pub struct MirroredWallet {
    session: WalletSession,
    mirror: MirrorClient,
}

impl MirroredWallet {
    pub fn new(session: WalletSession, mirror: MirrorClient) -> Self {
        Self { session, mirror }
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub async fn refresh(&self) -> RefreshReport {
        match self.mirror.fetch_wallet(self.session.user_id()).await {
            Ok(state) => {
                debug!(user_id = %self.session.user_id(), "wallet refreshed from mirror");
                self.session.replace(&state);
                RefreshReport {
                    state,
                    remote: RemoteSync::Synced,
                }
            }
            Err(err) => {
                warn!(user_id = %self.session.user_id(), error = %err, "mirror refresh failed, using local wallet");
                RefreshReport {
                    state: self.session.wallet(),
                    remote: RemoteSync::Fallback(err),
                }
            }
        }
    }

    pub async fn submit_trade(&self, request: &TradeRequest) -> MirroredTrade {
        let outcome = self.session.trade(request);
        if !outcome.success() {
            return MirroredTrade {
                outcome,
                remote: RemoteSync::Skipped,
            };
        }

        let remote = match self.mirror.post_trade(self.session.user_id(), request).await {
            Ok(()) => RemoteSync::Synced,
            Err(err) => {
                warn!(user_id = %self.session.user_id(), error = %err, "mirror trade forward failed");
                RemoteSync::Fallback(err)
            }
        };

        MirroredTrade { outcome, remote }
    }
}
