//! Local interface enumeration.
//!
//! Produces the deduplicated list of IPv4 addresses a listener can join the
//! announcement group on: interfaces that are up, not loopback, and
//! multicast-capable.

use std::net::Ipv4Addr;

use anyhow::Result;

/// One (interface, address) pair as reported by the OS.
#[derive(Debug, Clone)]
pub struct InterfaceEntry {
    pub name: String,
    pub up: bool,
    pub loopback: bool,
    pub multicast: bool,
    pub addr: Option<Ipv4Addr>,
}

/// Keep eligible IPv4 addresses, first occurrence wins.
pub fn eligible_addresses(entries: impl IntoIterator<Item = InterfaceEntry>) -> Vec<Ipv4Addr> {
    let mut out: Vec<Ipv4Addr> = Vec::new();
    for entry in entries {
        if !entry.up || entry.loopback || !entry.multicast {
            continue;
        }
        let Some(addr) = entry.addr else { continue };
        if addr.is_loopback() || out.contains(&addr) {
            continue;
        }
        tracing::debug!(interface = %entry.name, %addr, "eligible interface");
        out.push(addr);
    }
    out
}

/// Addresses of every eligible local interface.
pub fn local_addresses() -> Result<Vec<Ipv4Addr>> {
    let addrs = eligible_addresses(interface_entries()?);
    tracing::debug!(count = addrs.len(), "eligible multicast addresses");
    Ok(addrs)
}

#[cfg(unix)]
fn interface_entries() -> Result<Vec<InterfaceEntry>> {
    use anyhow::Context;
    use nix::net::if_::InterfaceFlags;

    let entries = nix::ifaddrs::getifaddrs()
        .context("getifaddrs()")?
        .map(|ifa| InterfaceEntry {
            addr: ifa
                .address
                .as_ref()
                .and_then(|a| a.as_sockaddr_in())
                .map(|sin| sin.ip()),
            up: ifa.flags.contains(InterfaceFlags::IFF_UP),
            loopback: ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK),
            multicast: ifa.flags.contains(InterfaceFlags::IFF_MULTICAST),
            name: ifa.interface_name,
        })
        .collect();
    Ok(entries)
}

#[cfg(not(unix))]
fn interface_entries() -> Result<Vec<InterfaceEntry>> {
    tracing::warn!("interface enumeration is not supported on this platform");
    Ok(Vec::new())
}
