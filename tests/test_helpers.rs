//! Shared harness for spinning up a real relay instance bound to an
//! ephemeral port, the way `e2e_tests.rs` does it in this relay's reference
//! corpus.

use std::net::SocketAddr;

use relay::app::AppState;
use relay::config::Config;
use relay::websocket::create_router;
use tokio::net::TcpListener;

/// Bind a relay instance with the default config and return its address and
/// the `AppState` backing it, so tests can assert on counters/registries
/// after driving traffic through the listener.
#[allow(dead_code)]
pub async fn start_test_server() -> (SocketAddr, AppState) {
    start_test_server_with_config(Config::default()).await
}

#[allow(dead_code)]
pub async fn start_test_server_with_config(config: Config) -> (SocketAddr, AppState) {
    let state = AppState::new(config).expect("valid test config");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let router = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    // Give the listener a moment to start accepting before the first
    // connect, mirroring the sleep-after-spawn pattern this relay's test
    // corpus uses for the same reason.
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    (addr, state)
}
