use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{debug, warn};

use crate::state::{AppState, WalletEvent};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    user_id: Option<String>,
}

impl EventFilter {
    /// Events that belong to no user (e.g. `Connected`) always pass.
    fn admits(&self, event: &WalletEvent) -> bool {
        match (self.user_id.as_deref().map(str::trim), event.user_id()) {
            (Some(wanted), Some(owner)) if !wanted.is_empty() => wanted == owner,
            _ => true,
        }
    }
}

pub async fn events_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Response {
    let events = state.subscribe_events();
    ws.on_upgrade(move |socket| stream_events(socket, events, filter))
}

async fn stream_events(mut socket: WebSocket, mut events: Receiver<WalletEvent>, filter: EventFilter) {
    if forward(&mut socket, &WalletEvent::Connected).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            event = events.recv() => match event {
                Ok(event) if filter.admits(&event) => {
                    if forward(&mut socket, &event).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "wallet event subscriber lagged"),
                Err(RecvError::Closed) => return,
            },
        }
    }
}

async fn forward(socket: &mut WebSocket, event: &WalletEvent) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "wallet event could not be encoded");
            return Ok(());
        }
    };
    socket.send(Message::Text(payload)).await
}

#[cfg(test)]
mod tests {
    use super::EventFilter;
    use crate::state::WalletEvent;

    fn favorite(user_id: &str) -> WalletEvent {
        WalletEvent::FavoriteAdded {
            user_id: user_id.to_owned(),
            instrument_id: "evt1".to_owned(),
        }
    }

    #[test]
    fn unfiltered_socket_sees_every_user() {
        let filter = EventFilter::default();

        assert!(filter.admits(&favorite("1")));
        assert!(filter.admits(&favorite("2")));
    }

    #[test]
    fn user_filter_drops_other_users_but_keeps_connected() {
        let filter = EventFilter {
            user_id: Some(" 2 ".to_owned()),
        };

        assert!(!filter.admits(&favorite("1")));
        assert!(filter.admits(&favorite("2")));
        assert!(filter.admits(&WalletEvent::Connected));
    }
}
