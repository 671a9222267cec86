//! dapscout-discovery — finds local runtime instances and their debug
//! endpoints.
//!
//! `process` lists candidates, `engine` resolves players from multicast
//! announcements received by the `listener` pool, and `probe` is the plain
//! TCP fallback.

pub mod engine;
pub mod interfaces;
pub mod listener;
pub mod probe;
pub mod process;

pub use engine::{resolve, resolve_with, Correlation, Correlator, Resolution};
pub use listener::{Datagram, DatagramSource, ListenerEndpoint, ListenerPool};
pub use probe::scan_range;
pub use process::{CandidateSource, SystemCandidates};
