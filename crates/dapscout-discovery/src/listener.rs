//! Announcement listener pool.
//!
//! One UDP socket per (local IPv4 address × announce port). Every socket
//! binds the wildcard address on its port with SO_REUSEADDR (plus
//! SO_REUSEPORT on Unix), joins the announcement group on its own
//! interface, and runs its own receive loop.
//! Loops forward raw datagrams to the correlation engine over a channel and
//! stop when the shared cancellation token fires, their socket fails, or
//! the engine hangs up.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use anyhow::{Context, Result};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use dapscout_core::DiscoveryConfig;

use crate::interfaces;

/// A raw datagram as received by one listener.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Bytes,
    /// Sender of the datagram.
    pub from: SocketAddr,
    /// Local interface address of the listener that received it.
    pub local: Ipv4Addr,
    /// Port of the listener that received it.
    pub port: u16,
}

/// Something that can feed datagrams to the correlation engine.
///
/// Implementations spawn their receive loops onto `tasks`. Every loop must
/// return once `cancel` fires or `tx` is closed.
pub trait DatagramSource {
    fn start(self, tx: mpsc::Sender<Datagram>, cancel: CancellationToken, tasks: &mut JoinSet<()>);
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// One bound, group-joined socket.
///
/// Owned by exactly one receive loop. `release` leaves the group and closes
/// the socket; calling it again is a no-op. Dropping releases too.
pub struct ListenerEndpoint {
    local: Ipv4Addr,
    group: Ipv4Addr,
    port: u16,
    ttl: u32,
    socket: Option<UdpSocket>,
}

impl ListenerEndpoint {
    /// Bind and join. Must be called from inside a tokio runtime.
    pub fn open(local: Ipv4Addr, group: Ipv4Addr, port: u16, ttl: u32) -> Result<Self> {
        let socket = make_listener_socket(local, group, port, ttl)
            .with_context(|| format!("failed to open listener on {local} port {port}"))?;
        let socket = UdpSocket::from_std(socket).context("failed to convert to tokio UdpSocket")?;

        Ok(Self {
            local,
            group,
            port,
            ttl,
            socket: Some(socket),
        })
    }

    pub fn local(&self) -> Ipv4Addr {
        self.local
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn is_released(&self) -> bool {
        self.socket.is_none()
    }

    /// Wait for the next datagram.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        match &self.socket {
            Some(socket) => socket.recv_from(buf).await,
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "listener released")),
        }
    }

    /// Leave the group and close the socket.
    pub fn release(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };
        if let Err(e) = socket.leave_multicast_v4(self.group, self.local) {
            tracing::trace!(
                error = %e,
                local = %self.local,
                port = self.port,
                "IP_DROP_MEMBERSHIP failed"
            );
        }
        drop(socket);
        tracing::debug!(local = %self.local, port = self.port, "listener released");
    }
}

impl Drop for ListenerEndpoint {
    fn drop(&mut self) {
        self.release();
    }
}

/// Create a UDP socket bound to `0.0.0.0:port` and joined to `group` on `local`.
fn make_listener_socket(
    local: Ipv4Addr,
    group: Ipv4Addr,
    port: u16,
    ttl: u32,
) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    // BSD-derived stacks refuse a second wildcard bind of the port without it.
    #[cfg(unix)]
    socket.set_reuse_port(true).context("SO_REUSEPORT")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&bind_addr.into()).context("bind()")?;

    socket
        .join_multicast_v4(&group, &local)
        .context("IP_ADD_MEMBERSHIP")?;
    socket.set_multicast_ttl_v4(ttl).context("IP_MULTICAST_TTL")?;

    Ok(socket.into())
}

// ── Receive loop ──────────────────────────────────────────────────────────────

/// Forward datagrams from one endpoint until cancelled, errored, or the
/// engine stops listening. The endpoint is released on every exit path.
pub async fn receive_loop(
    mut endpoint: ListenerEndpoint,
    buf_size: usize,
    tx: mpsc::Sender<Datagram>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; buf_size.max(1)];
    let (local, port) = (endpoint.local(), endpoint.port());

    tracing::debug!(%local, port, "listener starting");

    loop {
        let (len, from) = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = endpoint.recv_from(&mut buf) => match result {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, %local, port, "recv_from failed, listener exiting");
                    break;
                }
            },
        };

        let datagram = Datagram {
            payload: Bytes::copy_from_slice(&buf[..len]),
            from,
            local,
            port,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(datagram) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    endpoint.release();
}

// ── Pool ──────────────────────────────────────────────────────────────────────

/// The real multicast listener pool.
pub struct ListenerPool {
    config: DiscoveryConfig,
    addresses: Option<Vec<Ipv4Addr>>,
}

impl ListenerPool {
    /// Listen on every eligible local interface. Interfaces are enumerated
    /// when the pool starts, not here.
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            addresses: None,
        }
    }

    /// Listen on an explicit set of local addresses.
    pub fn with_addresses(config: DiscoveryConfig, addresses: Vec<Ipv4Addr>) -> Self {
        Self {
            config,
            addresses: Some(addresses),
        }
    }
}

impl DatagramSource for ListenerPool {
    fn start(self, tx: mpsc::Sender<Datagram>, cancel: CancellationToken, tasks: &mut JoinSet<()>) {
        let addresses = match self.addresses {
            Some(addresses) => addresses,
            None => interfaces::local_addresses().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to list local interfaces");
                Vec::new()
            }),
        };

        if addresses.is_empty() {
            tracing::warn!("no multicast-capable interfaces, nothing to listen on");
            return;
        }

        let mut opened = 0usize;
        for local in &addresses {
            for &port in &self.config.ports {
                match ListenerEndpoint::open(*local, self.config.group, port, self.config.ttl) {
                    Ok(endpoint) => {
                        tasks.spawn(receive_loop(
                            endpoint,
                            self.config.recv_buffer,
                            tx.clone(),
                            cancel.clone(),
                        ));
                        opened += 1;
                    }
                    Err(e) => tracing::warn!(
                        error = %format!("{e:#}"),
                        %local,
                        port,
                        "listener unavailable"
                    ),
                }
            }
        }

        tracing::info!(
            listeners = opened,
            interfaces = addresses.len(),
            group = %self.config.group,
            "listening for announcements"
        );
    }
}
