//! Crash recovery specs.

use crate::prelude::*;
use rbin_proc::liveness;
use std::time::Duration;

#[tokio::test]
async fn externally_killed_backend_is_respawned_on_the_next_request() {
    let (host_port, _responder) = http_responder(204).await;
    let handler =
        OnDemand::provision(tcp_config(&host_port)).unwrap().with_timeouts(short_timeouts());

    handler.upstreams(&Verbatim).await.unwrap();
    let first = handler.snapshot("").await.unwrap().pid.unwrap();

    // Simulate an external crash.
    rbin_proc::child::kill_group(first);
    let dead =
        eventually(40, Duration::from_millis(25), move || async move { !liveness::is_alive(first) })
            .await;
    assert!(dead, "killed backend still reported alive");

    let dial = handler.upstreams(&Verbatim).await.unwrap();
    assert_eq!(dial, host_port);
    let second = handler.snapshot("").await.unwrap().pid.unwrap();
    assert_ne!(second, first, "respawn reused the dead pid");
    assert_eq!(handler.snapshot("").await.unwrap().starts, 2);

    handler.shutdown().await;
}

#[tokio::test]
async fn request_landing_on_a_freshly_reaped_slot_cold_starts() {
    let (host_port, _responder) = http_responder(204).await;
    let handler =
        OnDemand::provision(tcp_config(&host_port)).unwrap().with_timeouts(short_timeouts());

    handler.upstreams(&Verbatim).await.unwrap();
    let first = handler.snapshot("").await.unwrap().pid.unwrap();
    drop(handler.begin(&Verbatim));

    // Arrive right around the idle timer firing. Whether the exit watcher
    // has finalized the slot yet or not, the request must come back with a
    // live backend.
    tokio::time::sleep(Duration::from_millis(110)).await;
    handler.upstreams(&Verbatim).await.unwrap();
    let current = handler.snapshot("").await.unwrap().pid.unwrap();
    assert!(liveness::is_alive(current));
    if current != first {
        assert_eq!(handler.snapshot("").await.unwrap().starts, 2);
    }

    handler.shutdown().await;
}
