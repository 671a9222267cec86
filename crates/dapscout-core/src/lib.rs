//! dapscout-core — wire format, candidate model, and configuration.
//! The discovery runtime and the binary both depend on this crate.

pub mod candidate;
pub mod config;
pub mod wire;

pub use candidate::{Candidate, Role};
pub use config::{ClassifyConfig, DapscoutConfig, DiscoveryConfig, ProbeConfig};
pub use wire::{parse_announcement, Announcement, AnnouncementError};
