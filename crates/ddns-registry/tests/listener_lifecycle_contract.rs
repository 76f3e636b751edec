//! Contract Test: Listener Lifecycle
//!
//! Verifies which listeners a service binds and that shutdown releases them.
//!
//! Constraints verified:
//! - The local channel is always bound
//! - The TCP listener is bound only when RUN_REST_SERVER is exactly YES
//! - A leftover socket file does not block startup
//! - After shutdown no listener accepts connections
//! - A bind conflict fails startup

#![cfg(unix)]

mod common;

use common::*;
use ddns_registry::{Endpoint, Error, ListenerState};
use std::time::Duration;

#[tokio::test]
async fn tcp_listener_absent_without_flag() {
    let test = TestStore::new().await;
    let service = test.start().await;

    assert_eq!(service.listeners().len(), 1);
    assert_eq!(
        service.listeners()[0].endpoint(),
        &Endpoint::UnixSocket(test.socket_path())
    );
    assert!(service.tcp_addr().is_none());
    assert_eq!(
        service.grace(),
        Duration::from_secs(2),
        "grace period comes from the configuration"
    );

    service.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn tcp_listener_absent_unless_flag_is_yes() {
    for value in ["NO", "yes", ""] {
        let test = TestStore::new().await;
        test.set_flag("RUN_REST_SERVER", value).await;

        let service = test.start().await;
        assert!(service.tcp_addr().is_none(), "flag value {:?}", value);

        service.shutdown().await.expect("clean shutdown");
    }
}

#[tokio::test]
async fn both_listeners_serve_with_flag() {
    let test = TestStore::new().await;
    test.set_flag("RUN_REST_SERVER", "YES").await;
    let service = test.start().await;

    assert_eq!(service.listeners().len(), 2);
    for listener in service.listeners() {
        let mut state = listener.subscribe();
        state
            .wait_for(|s| *s == ListenerState::Serving)
            .await
            .expect("listener reaches Serving");
    }

    let addr = service.tcp_addr().expect("TCP listener bound");
    assert!(addr.ip().is_loopback());
    assert_ne!(addr.port(), 0, "real port is reported");

    let response = reqwest::get(format!("http://{}/providers", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "{}");

    let local = get_over_socket(&test.socket_path(), "/providers").await;
    assert_eq!(local.status, 200);

    service.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let test = TestStore::new().await;
    test.set_flag("RUN_REST_SERVER", "YES").await;
    let service = test.start().await;

    let addr = service.tcp_addr().unwrap();
    let states: Vec<_> = service.listeners().iter().map(|l| l.subscribe()).collect();

    service.shutdown().await.expect("clean shutdown");

    for state in &states {
        assert_eq!(*state.borrow(), ListenerState::Closed);
    }
    assert!(
        tokio::net::TcpStream::connect(addr).await.is_err(),
        "TCP listener must be closed"
    );
    assert!(
        request_over_socket(&test.socket_path(), "GET", "/providers", None)
            .await
            .is_err(),
        "local channel must be closed"
    );
    assert!(!test.socket_path().exists(), "socket file removed on close");
}

#[tokio::test]
async fn stale_socket_file_is_replaced() {
    let test = TestStore::new().await;
    std::fs::write(test.socket_path(), b"left over from a crash").unwrap();

    let service = test.start().await;

    let response = get_over_socket(&test.socket_path(), "/osuuid").await;
    assert_eq!(response.status, 200);

    service.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn tcp_port_conflict_fails_startup() {
    let test = TestStore::new().await;
    test.set_flag("RUN_REST_SERVER", "YES").await;

    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = test.config();
    config.transport.tcp_addr = occupied.local_addr().unwrap();

    let result = test.start_with(config).await;

    assert!(
        matches!(result, Err(Error::Bind { .. })),
        "bind conflict must be fatal"
    );
    assert!(
        !test.socket_path().exists(),
        "local listener started before the conflict is torn down"
    );
}

#[tokio::test]
async fn restart_after_shutdown_reuses_the_socket_path() {
    let test = TestStore::new().await;

    let first = test.start().await;
    first.shutdown().await.expect("clean shutdown");

    let second = test.start().await;
    let response = get_over_socket(&test.socket_path(), "/providers").await;
    assert_eq!(response.status, 200);

    second.shutdown().await.expect("clean shutdown");
}
