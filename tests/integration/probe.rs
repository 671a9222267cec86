use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use tokio::net::TcpListener;

use dapscout_discovery::scan_range;

async fn hold_open(listener: TcpListener) {
    while listener.accept().await.is_ok() {}
}

#[tokio::test]
async fn test_probe_reports_exactly_the_listening_ports() {
    let mut ports = BTreeSet::new();
    let mut holders = Vec::new();
    for _ in 0..3 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        ports.insert(listener.local_addr().unwrap().port());
        holders.push(tokio::spawn(hold_open(listener)));
    }

    for &port in &ports {
        let open = scan_range(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            port,
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(open, BTreeSet::from([port]));
    }

    for h in holders {
        h.abort();
    }
}

#[tokio::test]
async fn test_probe_of_closed_port_is_fast_and_empty() {
    // Bind then drop to find a port that is almost certainly closed.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let begin = Instant::now();
    let open = scan_range(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        port,
        port,
        Duration::from_secs(2),
    )
    .await;

    assert!(open.is_empty());
    assert!(begin.elapsed() < Duration::from_secs(2), "refusal should not wait for the timeout");
}

#[tokio::test]
async fn test_probe_full_debug_range_finishes_within_attempt_timeout() {
    let begin = Instant::now();
    let open = scan_range(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        56000,
        56999,
        Duration::from_millis(300),
    )
    .await;

    assert!(open.iter().all(|p| (56000..=56999).contains(p)));
    assert!(begin.elapsed() < Duration::from_secs(10));
}
