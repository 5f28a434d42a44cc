use api::AppState;
use ledger::{LedgerConfig, TradeRequest, WalletState};
use tokio::net::TcpListener;
use wallet::{MemoryStore, MirrorClient, MirrorError, MirroredWallet, RemoteSync, WalletSession, WalletStore};

async fn spawn_server(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::app(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn local_session(user_id: &str) -> WalletSession {
    WalletSession::new(
        user_id,
        WalletStore::new(MemoryStore::shared(), LedgerConfig::default()),
    )
}

#[tokio::test]
async fn refresh_adopts_the_server_wallet() {
    let server = AppState::default();
    server.execute_trade("5", &TradeRequest::buy("evt1", 4.0, 10.0).with_label("Eras"));
    let base_url = spawn_server(server.clone()).await;

    let mirrored = MirroredWallet::new(local_session("5"), MirrorClient::new(base_url).unwrap());
    let report = mirrored.refresh().await;

    assert!(report.remote.is_synced());
    assert_eq!(report.state, server.session("5").wallet());
    assert_eq!(mirrored.session().wallet(), report.state);
    assert_eq!(report.state.cash_usd, 1_960.0);
}

#[tokio::test]
async fn submitted_trades_land_on_both_sides() {
    let server = AppState::default();
    server.execute_trade("5", &TradeRequest::buy("evt1", 4.0, 10.0));
    let base_url = spawn_server(server.clone()).await;
    let mirrored = MirroredWallet::new(local_session("5"), MirrorClient::new(base_url).unwrap());
    mirrored.refresh().await;

    let trade = mirrored.submit_trade(&TradeRequest::sell("evt1", 1.0, 3.0)).await;

    assert!(trade.outcome.success());
    assert!(trade.remote.is_synced());
    let local: WalletState = mirrored.session().wallet();
    assert_eq!(local.cash_usd, 1_970.0);
    assert_eq!(local.held_qty("evt1"), 3.0);
    assert_eq!(server.session("5").wallet(), local);
}

#[tokio::test]
async fn locally_rejected_trade_is_never_forwarded() {
    let server = AppState::default();
    let base_url = spawn_server(server.clone()).await;
    let mirrored = MirroredWallet::new(local_session("5"), MirrorClient::new(base_url).unwrap());
    let mut events = server.subscribe_events();

    let trade = mirrored.submit_trade(&TradeRequest::sell("evt1", 1.0, 3.0)).await;

    assert!(!trade.outcome.success());
    assert!(matches!(trade.remote, RemoteSync::Skipped));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn unreachable_server_falls_back_to_local_wallet() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let mirrored = MirroredWallet::new(local_session("5"), MirrorClient::new(base_url).unwrap());

    let report = mirrored.refresh().await;
    assert!(matches!(report.remote, RemoteSync::Fallback(MirrorError::Http(_))));
    assert_eq!(report.state, WalletState::default());

    let trade = mirrored.submit_trade(&TradeRequest::buy("evt1", 1.0, 50.0)).await;
    assert!(trade.outcome.success());
    assert!(matches!(trade.remote, RemoteSync::Fallback(_)));
    assert_eq!(mirrored.session().wallet().cash_usd, 1_950.0);
}
