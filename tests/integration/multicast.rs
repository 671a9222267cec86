use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use dapscout_core::{Candidate, Role};
use dapscout_discovery::{resolve_with, ListenerPool};

use crate::*;

#[tokio::test]
async fn test_player_resolves_from_loopback_announcement() {
    if !multicast_loopback_available() {
        eprintln!("SKIP: loopback multicast is not delivered on this host");
        return;
    }

    let port = free_udp_port();
    let config = loopback_config(port, 3000);
    let pool = ListenerPool::with_addresses(config.clone(), vec![Ipv4Addr::LOCALHOST]);

    let announcer = spawn_announcer(
        announcement_line(Ipv4Addr::new(10, 0, 0, 5), 1234, "Game"),
        port,
        Duration::from_millis(100),
    );

    let candidates = vec![
        Candidate::new(4321, "Unity", Role::Editor).unwrap(),
        Candidate::new(0, "Game", Role::Player).unwrap(),
    ];
    let resolution = resolve_with(candidates, pool, config.timeout()).await;
    announcer.abort();

    assert!(!resolution.timed_out, "announcement was never correlated");
    let game = &resolution.candidates[1];
    assert_eq!(game.address, Some(Ipv4Addr::new(10, 0, 0, 5)));
    assert_eq!(game.debug_port, Some(56234));
    assert_eq!(game.message_port, Some(56236));
    assert!(resolution.unmatched.is_empty());
}

#[tokio::test]
async fn test_silent_network_times_out_and_frees_ports() {
    if !multicast_loopback_available() {
        eprintln!("SKIP: loopback multicast is not delivered on this host");
        return;
    }

    let port = free_udp_port();
    let config = loopback_config(port, 300);
    let pool = ListenerPool::with_addresses(config.clone(), vec![Ipv4Addr::LOCALHOST]);

    let begin = Instant::now();
    let resolution = resolve_with(
        vec![Candidate::new(9, "Nobody", Role::Player).unwrap()],
        pool,
        config.timeout(),
    )
    .await;

    assert!(resolution.timed_out);
    assert!(begin.elapsed() >= Duration::from_millis(300));
    assert!(!resolution.candidates[0].is_resolved());

    // Every listener released its socket before resolve_with returned.
    std::net::UdpSocket::bind(("0.0.0.0", port)).expect("listener port should be free");
}
