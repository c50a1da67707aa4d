//! Host-shutdown specs.

use crate::prelude::*;
use rbin_proc::liveness;
use std::time::Duration;

#[tokio::test]
async fn shutdown_terminates_every_supervised_backend() {
    let (port_a, _ra) = http_responder(204).await;
    let (port_b, _rb) = http_responder(204).await;
    let dir = tempfile::tempdir().unwrap();
    let detect = script(dir.path(), "detect", r#"printf '{"reverse_proxy_to": "%s"}\n' "$1""#);
    let config = HandlerConfig {
        detector: vec![detect, "{port}".to_string()],
        ..tcp_config(&port_a)
    };
    let handler = OnDemand::provision(config).unwrap().with_timeouts(short_timeouts());

    struct PortExpander(String);
    impl Expander for PortExpander {
        fn expand(&self, template: &str) -> String {
            template.replace("{port}", &self.0)
        }
    }

    let a = PortExpander(port_a.clone());
    let b = PortExpander(port_b.clone());
    handler.upstreams(&a).await.unwrap();
    handler.upstreams(&b).await.unwrap();
    let pid_a = handler.snapshot(&handler.key(&a)).await.unwrap().pid.unwrap();
    let pid_b = handler.snapshot(&handler.key(&b)).await.unwrap().pid.unwrap();
    assert_ne!(pid_a, pid_b);

    handler.shutdown().await;

    let all_dead = eventually(40, Duration::from_millis(25), move || async move {
        !liveness::is_alive(pid_a) && !liveness::is_alive(pid_b)
    })
    .await;
    assert!(all_dead, "backends survived shutdown");
}

#[tokio::test]
async fn shutdown_twice_is_a_noop() {
    let (host_port, _responder) = http_responder(204).await;
    let handler =
        OnDemand::provision(tcp_config(&host_port)).unwrap().with_timeouts(short_timeouts());

    handler.upstreams(&Verbatim).await.unwrap();
    let pid = handler.snapshot("").await.unwrap().pid.unwrap();

    handler.shutdown().await;
    let dead =
        eventually(40, Duration::from_millis(25), move || async move { !liveness::is_alive(pid) })
            .await;
    assert!(dead);

    // Second teardown finds nothing to do and must not fail.
    handler.shutdown().await;
    assert!(handler.snapshot("").await.unwrap().pid.is_none());
}

#[tokio::test]
async fn shutdown_disarms_pending_idle_timers() {
    let (host_port, _responder) = http_responder(204).await;
    let handler =
        OnDemand::provision(tcp_config(&host_port)).unwrap().with_timeouts(short_timeouts());

    handler.upstreams(&Verbatim).await.unwrap();
    drop(handler.begin(&Verbatim));
    handler.shutdown().await;

    // The armed timer fires into an already-terminated slot without effect.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(handler.snapshot("").await.unwrap().pid.is_none());
}
