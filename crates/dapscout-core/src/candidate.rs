//! Candidates — local processes that look like runtime instances.

use std::fmt;
use std::net::Ipv4Addr;

use crate::wire::{debug_port, message_port, Announcement};

/// What kind of runtime instance a process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The authoring editor. Always attached over loopback.
    Editor,
    /// A built player. Its address comes from a multicast announcement.
    Player,
    /// Not a runtime instance. Never enters a candidate list.
    None,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Editor => f.write_str("Editor"),
            Role::Player => f.write_str("Player"),
            Role::None => f.write_str("None"),
        }
    }
}

/// One locally observed runtime instance.
///
/// `pid`, `name` and `role` are fixed at creation. A player is resolved at
/// most once; after that its address and ports never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub pid: u32,
    /// Display name; matched against an announcement's project name.
    pub name: String,
    pub role: Role,
    pub address: Option<Ipv4Addr>,
    pub debug_port: Option<u16>,
    pub message_port: Option<u16>,
    /// Guid of the instance that resolved this player.
    pub guid: Option<u64>,
}

impl Candidate {
    /// Build a candidate. Returns `None` for `Role::None`.
    ///
    /// Editors resolve to loopback immediately with ports derived from the
    /// pid. Players start unresolved.
    pub fn new(pid: u32, name: impl Into<String>, role: Role) -> Option<Self> {
        let name = name.into();
        match role {
            Role::None => None,
            Role::Editor => {
                let debug = debug_port(u64::from(pid));
                Some(Self {
                    pid,
                    name,
                    role,
                    address: Some(Ipv4Addr::LOCALHOST),
                    debug_port: Some(debug),
                    message_port: Some(message_port(debug)),
                    guid: None,
                })
            }
            Role::Player => Some(Self {
                pid,
                name,
                role,
                address: None,
                debug_port: None,
                message_port: None,
                guid: None,
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.address.is_some()
    }

    /// Resolved to something other than loopback.
    pub fn is_network_resolved(&self) -> bool {
        self.address.is_some_and(|a| !a.is_loopback())
    }

    /// Can this announcement resolve this candidate?
    pub fn accepts(&self, ann: &Announcement) -> bool {
        self.role == Role::Player && !self.is_resolved() && self.name == ann.project_name
    }

    /// Was this candidate resolved by the instance behind `ann`?
    ///
    /// An instance is its (project name, guid). A player announces once per
    /// interface, so the address may differ between its announcements.
    pub fn resolved_by(&self, ann: &Announcement) -> bool {
        self.role == Role::Player && self.name == ann.project_name && self.guid == Some(ann.guid)
    }

    /// Take the address and ports from an announcement.
    pub fn resolve(&mut self, ann: &Announcement) {
        let debug = ann.debug_port();
        self.address = Some(ann.ip);
        self.debug_port = Some(debug);
        self.message_port = Some(message_port(debug));
        self.guid = Some(ann.guid);
    }
}
