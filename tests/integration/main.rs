//! dapscout integration test harness.
//!
//! These tests use real sockets on the loopback interface. Hosts that do
//! not deliver multicast over loopback skip the multicast tests with a
//! `SKIP:` line instead of failing.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};

use dapscout_core::wire::MULTICAST_GROUP;
use dapscout_core::DiscoveryConfig;

mod multicast;
mod probe;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Does a datagram sent to the announcement group on loopback come back?
///
/// Joining alone is not enough: some sandboxes accept the membership but
/// never loop multicast traffic back.
pub fn multicast_loopback_available() -> bool {
    match multicast_round_trip() {
        Ok(()) => true,
        Err(e) => {
            eprintln!("multicast self-check failed: {e:#}");
            false
        }
    }
}

fn multicast_round_trip() -> Result<()> {
    let port = free_udp_port();
    let receiver = UdpSocket::bind(("0.0.0.0", port)).context("bind()")?;
    receiver
        .join_multicast_v4(&MULTICAST_GROUP, &Ipv4Addr::LOCALHOST)
        .context("IP_ADD_MEMBERSHIP")?;
    receiver
        .set_read_timeout(Some(Duration::from_millis(500)))
        .context("SO_RCVTIMEO")?;

    announcer()?
        .send_to(b"self-check", SocketAddrV4::new(MULTICAST_GROUP, port))
        .context("send_to()")?;

    let mut buf = [0u8; 32];
    let (len, _) = receiver.recv_from(&mut buf).context("recv_from()")?;
    anyhow::ensure!(&buf[..len] == b"self-check", "unexpected datagram");
    Ok(())
}

/// A UDP port nothing is bound to right now.
pub fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .and_then(|s| s.local_addr())
        .map(|a| a.port())
        .expect("ephemeral UDP port")
}

/// Discovery settings for one loopback port with a short timeout.
pub fn loopback_config(port: u16, timeout_ms: u64) -> DiscoveryConfig {
    DiscoveryConfig {
        ports: vec![port],
        timeout_ms,
        ..DiscoveryConfig::default()
    }
}

/// A socket that multicasts to the announcement group over loopback.
pub fn announcer() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;
    socket
        .set_multicast_if_v4(&Ipv4Addr::LOCALHOST)
        .context("IP_MULTICAST_IF")?;
    socket.set_multicast_loop_v4(true).context("IP_MULTICAST_LOOP")?;
    socket.set_multicast_ttl_v4(1).context("IP_MULTICAST_TTL")?;
    Ok(socket.into())
}

/// Announcement line in the wire format players use.
pub fn announcement_line(ip: Ipv4Addr, guid: u64, project: &str) -> String {
    format!(
        "[IP] {ip} [Port] 54997 [Flags] 0 [Guid] {guid} [EditorId] 0 [Version] 0 \
         [Id] WindowsPlayer(test) [Debug] 1 [PackageName] WindowsPlayer [ProjectName] {project}"
    )
}

/// Send `payload` to the group on `port` every `every` until the task is aborted.
pub fn spawn_announcer(payload: String, port: u16, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let socket = match announcer() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("announcer unavailable: {e:#}");
                return;
            }
        };
        let dest = SocketAddrV4::new(MULTICAST_GROUP, port);
        loop {
            let _ = socket.send_to(payload.as_bytes(), dest);
            tokio::time::sleep(every).await;
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_loopback_ports_are_distinct() {
    let a = free_udp_port();
    let b = free_udp_port();
    assert!(a > 0 && b > 0);
}
