//! Readiness failure and socket hygiene specs.

use crate::prelude::*;
use std::time::{Duration, Instant};

#[tokio::test]
async fn readiness_timeout_terminates_the_backend() {
    let port = unused_port();
    let config = tcp_config(&format!("127.0.0.1:{port}"));
    let timeouts = Timeouts { readiness: Duration::from_millis(500), ..short_timeouts() };
    let handler = OnDemand::provision(config).unwrap().with_timeouts(timeouts);

    let start = Instant::now();
    let err = handler.upstreams(&Verbatim).await.unwrap_err();
    assert!(matches!(err, SupervisorError::ReadinessTimeout { .. }), "got: {err}");
    assert!(start.elapsed() < Duration::from_secs(2));

    // The failed launch recorded no child; the attempt still counts.
    let snapshot = handler.snapshot("").await.unwrap();
    assert_eq!(snapshot.pid, None);
    assert_eq!(snapshot.starts, 1);
}

#[tokio::test]
async fn backend_exit_beats_the_readiness_deadline() {
    let port = unused_port();
    let config = HandlerConfig {
        executable: vec!["/bin/sh".to_string(), "-c".to_string(), "exit 0".to_string()],
        ..tcp_config(&format!("127.0.0.1:{port}"))
    };
    let handler = OnDemand::provision(config).unwrap().with_timeouts(short_timeouts());

    let start = Instant::now();
    let err = handler.upstreams(&Verbatim).await.unwrap_err();
    assert!(matches!(err, SupervisorError::BackendExitedDuringReadiness { .. }), "got: {err}");
    assert!(start.elapsed() < Duration::from_secs(2), "exit did not short-circuit the wait");
}

#[tokio::test]
async fn stale_socket_file_is_removed_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("app.sock");
    // Leftover from a crashed earlier life of the backend.
    std::fs::write(&socket, b"stale").unwrap();

    let handler =
        OnDemand::provision(uds_config(&socket)).unwrap().with_timeouts(short_timeouts());
    // The delayed bind only succeeds because the stale entry is gone.
    let binder = bind_socket_later(&socket, Duration::from_millis(200));

    handler.upstreams(&Verbatim).await.unwrap();
    assert!(rbin_proc::readiness::socket_file_ready(&socket));

    drop(binder.await.unwrap());
    handler.shutdown().await;
}

#[tokio::test]
async fn missing_socket_fails_dispatch_even_with_a_live_child() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("app.sock");
    let handler =
        OnDemand::provision(uds_config(&socket)).unwrap().with_timeouts(short_timeouts());

    let binder = bind_socket_later(&socket, Duration::from_millis(200));
    handler.upstreams(&Verbatim).await.unwrap();
    let listener = binder.await.unwrap();

    // The child is still alive but its socket vanished.
    drop(listener);
    std::fs::remove_file(&socket).unwrap();

    let err = handler.upstreams(&Verbatim).await.unwrap_err();
    assert!(matches!(err, SupervisorError::SocketNotReady { .. }), "got: {err}");

    handler.shutdown().await;
}
