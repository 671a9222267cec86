//! dapscout wire format — the player announcement datagram.
//!
//! A running player periodically multicasts a single UTF-8 line to
//! 225.0.0.222 on a handful of well-known ports:
//!
//! ```text
//! [IP] 10.0.0.5 [Port] 54997 [Flags] 0 [Guid] 1234 [EditorId] 0 [Version] 0
//! [Id] x [Debug] 0 [PackageName] p [ProjectName] Game
//! ```
//!
//! (one line on the wire). Every bracketed key must be present and in this
//! order. Only IP, Guid and ProjectName drive correlation; the rest are
//! checked for shape and otherwise carried along for reporting.

use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;

// ── Multicast parameters ─────────────────────────────────────────────────────

/// Group every player announces to.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(225, 0, 0, 222);

/// Ports a player may announce on. One listener is bound per
/// (local address × port).
pub const ANNOUNCE_PORTS: [u16; 4] = [54997, 34997, 57997, 58997];

/// Multicast TTL — enough for the local segment plus a router hop or two.
pub const MULTICAST_TTL: u32 = 4;

/// Wall-clock ceiling for one discovery round, in milliseconds.
pub const DISCOVERY_TIMEOUT_MS: u64 = 5000;

// ── Port derivation ──────────────────────────────────────────────────────────

/// First port of the debugger range.
pub const DEBUG_PORT_BASE: u16 = 56000;

/// Width of the debugger range.
pub const DEBUG_PORT_SPAN: u64 = 1000;

/// Distance from the debug port to the companion message port.
pub const MESSAGE_PORT_OFFSET: u16 = 2;

/// Debugger port for an identifier: a process id for editors, the
/// announced guid for players. Always in `56000..=56999`.
pub fn debug_port(identifier: u64) -> u16 {
    DEBUG_PORT_BASE + (identifier % DEBUG_PORT_SPAN) as u16
}

/// Message port paired with a debug port.
pub fn message_port(debug_port: u16) -> u16 {
    debug_port + MESSAGE_PORT_OFFSET
}

// ── Announcement ─────────────────────────────────────────────────────────────

/// A parsed player announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Address the player says it is reachable on.
    pub ip: Ipv4Addr,
    /// Opaque numeric identifier; the debug port is derived from it.
    pub guid: u64,
    /// Project name — the correlation key against local candidates.
    pub project_name: String,
    /// Application package name, for reporting only.
    pub package_name: String,
    /// Whether the player was built with script debugging enabled.
    pub debug: bool,
}

impl Announcement {
    pub fn debug_port(&self) -> u16 {
        debug_port(self.guid)
    }

    pub fn message_port(&self) -> u16 {
        message_port(self.debug_port())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnnouncementError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    #[error("payload does not match the announcement grammar")]
    Malformed,
    #[error("announced address {0:?} is not an IPv4 address")]
    BadAddress(String),
    #[error("guid {0:?} is not a valid integer")]
    BadGuid(String),
}

static ANNOUNCEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\[IP\]\s(?P<ip>\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
        r"\s\[Port\]\s\d+",
        r"\s\[Flags\]\s\d+",
        r"\s\[Guid\]\s(?P<guid>\d+)",
        r"\s\[EditorId\]\s\d+",
        r"\s\[Version\]\s\d+",
        r"\s\[Id\]\s.*?",
        r"\s\[Debug\]\s(?P<debug>\d+)",
        r"\s\[PackageName\]\s(?P<package>.*?)",
        r"\s\[ProjectName\]\s(?P<project>.*)",
    ))
    .expect("announcement pattern is valid")
});

/// Dotted quad with each octet read as a decimal number, so zero-padded
/// octets such as `192.168.001.005` are accepted.
fn parse_octets(text: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = text.split('.');
    for octet in &mut octets {
        *octet = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

/// Decode one datagram. Either every required field parses or the whole
/// datagram is rejected.
pub fn parse_announcement(payload: &[u8]) -> Result<Announcement, AnnouncementError> {
    let text = std::str::from_utf8(payload).map_err(|_| AnnouncementError::NotUtf8)?;
    let caps = ANNOUNCEMENT
        .captures(text)
        .ok_or(AnnouncementError::Malformed)?;

    let ip_text = &caps["ip"];
    let ip = parse_octets(ip_text)
        .ok_or_else(|| AnnouncementError::BadAddress(ip_text.to_string()))?;

    let guid_text = &caps["guid"];
    let guid: u64 = guid_text
        .parse()
        .map_err(|_| AnnouncementError::BadGuid(guid_text.to_string()))?;

    // Players terminate the string with NUL on some platforms.
    let project_name = caps["project"].trim_end_matches(['\0', '\r']).to_string();

    Ok(Announcement {
        ip,
        guid,
        project_name,
        package_name: caps["package"].to_string(),
        debug: &caps["debug"] != "0",
    })
}
