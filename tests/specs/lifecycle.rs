//! Cold start, readiness, and idle reclamation specs.

use crate::prelude::*;
use rbin_proc::liveness;
use std::time::Duration;

#[tokio::test]
async fn cold_start_serves_a_ready_backend() {
    let (host_port, _responder) = http_responder(204).await;
    let handler =
        OnDemand::provision(tcp_config(&host_port)).unwrap().with_timeouts(short_timeouts());

    let dial = handler.upstreams(&Verbatim).await.unwrap();
    assert_eq!(dial, host_port);

    let snapshot = handler.snapshot("").await.unwrap();
    assert_eq!(snapshot.starts, 1);
    let pid = snapshot.pid.expect("backend pid recorded");
    assert!(liveness::is_alive(pid));

    handler.shutdown().await;
}

#[tokio::test]
async fn idle_backend_is_reaped_after_the_timeout() {
    let (host_port, _responder) = http_responder(200).await;
    let handler =
        OnDemand::provision(tcp_config(&host_port)).unwrap().with_timeouts(short_timeouts());

    handler.upstreams(&Verbatim).await.unwrap();
    let pid = handler.snapshot("").await.unwrap().pid.unwrap();

    {
        let _guard = handler.begin(&Verbatim);
        // In flight: the idle timer must not fire.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(liveness::is_alive(pid));
    }

    let h = &handler;
    let reaped = eventually(40, Duration::from_millis(50), move || async move {
        h.snapshot("").await.is_some_and(|s| s.pid.is_none())
    })
    .await;
    assert!(reaped, "backend survived the idle timeout");
    assert!(!liveness::is_alive(pid));
    assert_eq!(handler.snapshot("").await.unwrap().active, 0);
}

#[tokio::test]
async fn repeated_activation_cycles_use_fresh_processes() {
    let (host_port, _responder) = http_responder(204).await;
    let handler =
        OnDemand::provision(tcp_config(&host_port)).unwrap().with_timeouts(short_timeouts());

    let mut pids = Vec::new();
    for cycle in 1..=3u64 {
        handler.upstreams(&Verbatim).await.unwrap();
        let snapshot = handler.snapshot("").await.unwrap();
        assert_eq!(snapshot.starts, cycle);
        pids.push(snapshot.pid.unwrap());

        drop(handler.begin(&Verbatim));
        let h = &handler;
        let reaped = eventually(40, Duration::from_millis(50), move || async move {
            h.snapshot("").await.is_some_and(|s| s.pid.is_none())
        })
        .await;
        assert!(reaped, "cycle {cycle} never idled out");
    }

    pids.sort_unstable();
    pids.dedup();
    assert_eq!(pids.len(), 3, "expected three distinct process identities");
    assert_eq!(handler.snapshot("").await.unwrap().active, 0);
}

#[tokio::test]
async fn unix_backend_is_ready_once_its_socket_appears() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("app.sock");
    let handler =
        OnDemand::provision(uds_config(&socket)).unwrap().with_timeouts(short_timeouts());

    let binder = bind_socket_later(&socket, Duration::from_millis(200));
    let dial = handler.upstreams(&Verbatim).await.unwrap();
    assert_eq!(dial, format!("unix/{}", socket.display()));

    drop(binder.await.unwrap());
    handler.shutdown().await;
}

#[tokio::test]
async fn concurrent_first_requests_spawn_exactly_one_backend() {
    let (host_port, _responder) = http_responder(204).await;
    let handler =
        OnDemand::provision(tcp_config(&host_port)).unwrap().with_timeouts(short_timeouts());

    let (a, b) = tokio::join!(handler.upstreams(&Verbatim), handler.upstreams(&Verbatim));
    assert_eq!(a.unwrap(), host_port);
    assert_eq!(b.unwrap(), host_port);
    assert_eq!(handler.snapshot("").await.unwrap().starts, 1);

    handler.shutdown().await;
}

#[tokio::test]
async fn two_routes_supervise_two_processes() {
    let (port_a, _ra) = http_responder(204).await;
    let (port_b, _rb) = http_responder(204).await;
    let route_a = OnDemand::provision(tcp_config(&port_a)).unwrap().with_timeouts(short_timeouts());
    let route_b = OnDemand::provision(tcp_config(&port_b)).unwrap().with_timeouts(short_timeouts());

    let (a, b) = tokio::join!(route_a.upstreams(&Verbatim), route_b.upstreams(&Verbatim));
    a.unwrap();
    b.unwrap();

    let pid_a = route_a.snapshot("").await.unwrap().pid.unwrap();
    let pid_b = route_b.snapshot("").await.unwrap().pid.unwrap();
    assert_ne!(pid_a, pid_b);
    assert!(liveness::is_alive(pid_a));
    assert!(liveness::is_alive(pid_b));

    route_a.shutdown().await;
    route_b.shutdown().await;
}
