//! TCP port probe — the fallback when nothing resolved over multicast.
//!
//! Flat fan-out: one connect attempt per port, each racing its own timeout.
//! Knows nothing about candidates; the operator reads the open ports.

use std::collections::BTreeSet;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinSet;

/// Connect to every port in `start_port..=end_port` and return those that
/// accepted within `attempt_timeout`. An empty range yields an empty set.
pub async fn scan_range(
    address: IpAddr,
    start_port: u16,
    end_port: u16,
    attempt_timeout: Duration,
) -> BTreeSet<u16> {
    let mut attempts = JoinSet::new();
    for port in start_port..=end_port {
        attempts.spawn(probe_port(SocketAddr::new(address, port), attempt_timeout));
    }

    let mut open = BTreeSet::new();
    while let Some(joined) = attempts.join_next().await {
        match joined {
            Ok(Some(port)) => {
                open.insert(port);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, %address, "probe task failed"),
        }
    }

    tracing::debug!(%address, start_port, end_port, open = open.len(), "port scan finished");
    open
}

/// One attempt. `Some(port)` when the connection completed in time.
async fn probe_port(addr: SocketAddr, attempt_timeout: Duration) -> Option<u16> {
    match tokio::time::timeout(attempt_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Some(addr.port()),
        Ok(Err(e)) if is_closed(&e) => None,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, %addr, "unexpected connect failure");
            None
        }
        Err(_elapsed) => None,
    }
}

/// Connect errors that just mean "nothing listening there".
fn is_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
    )
}
