//! Correlation engine — resolves player candidates from announcements.
//!
//! The engine owns the candidate list outright. Receive loops never touch
//! it: they send raw datagrams over one channel and the engine consumes
//! them, so "match, mutate, check all resolved" runs on a single task.
//!
//! A round ends when every candidate has an address, when the timeout
//! fires, or when every receive loop has gone away. The engine then cancels
//! the shared token and waits for every loop to release its socket before
//! returning.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use dapscout_core::{parse_announcement, Announcement, Candidate, DiscoveryConfig};

use crate::listener::{DatagramSource, ListenerPool};

/// Datagrams buffered between the receive loops and the engine.
const CHANNEL_CAPACITY: usize = 64;

/// Outcome of one discovery round.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The input candidates, with zero or more players resolved.
    pub candidates: Vec<Candidate>,
    /// Announcements that matched no local candidate, deduplicated.
    pub unmatched: Vec<Announcement>,
    /// The round ended because the timeout fired.
    pub timed_out: bool,
}

/// What happened to one announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// Resolved the candidate at this index.
    Resolved(usize),
    /// Already accounted for; nothing changed.
    Duplicate,
    /// No candidate wants it. Recorded in `unmatched`.
    Unmatched,
}

/// The candidate list plus everything learned from the wire so far.
#[derive(Debug, Default)]
pub struct Correlator {
    candidates: Vec<Candidate>,
    unmatched: Vec<Announcement>,
}

impl Correlator {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            unmatched: Vec::new(),
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Every candidate has an address.
    pub fn is_complete(&self) -> bool {
        self.candidates.iter().all(Candidate::is_resolved)
    }

    /// Feed one announcement.
    ///
    /// The first unresolved player whose name matches wins. Any further
    /// announcement from an instance that already resolved a candidate is a
    /// no-op, whichever interface it arrived from, so one instance never
    /// claims a second candidate that happens to share the name.
    pub fn apply(&mut self, ann: &Announcement) -> Correlation {
        if self.candidates.iter().any(|c| c.resolved_by(ann)) {
            return Correlation::Duplicate;
        }

        if let Some(index) = self.candidates.iter().position(|c| c.accepts(ann)) {
            self.candidates[index].resolve(ann);
            return Correlation::Resolved(index);
        }

        if self.unmatched.iter().any(|u| same_instance(u, ann)) {
            return Correlation::Duplicate;
        }
        self.unmatched.push(ann.clone());
        Correlation::Unmatched
    }

    pub fn finish(self, timed_out: bool) -> Resolution {
        Resolution {
            candidates: self.candidates,
            unmatched: self.unmatched,
            timed_out,
        }
    }
}

fn same_instance(a: &Announcement, b: &Announcement) -> bool {
    a.project_name == b.project_name && a.guid == b.guid
}

/// Resolve candidates against live multicast announcements.
pub async fn resolve(candidates: Vec<Candidate>, config: &DiscoveryConfig) -> Resolution {
    let pool = ListenerPool::new(config.clone());
    resolve_with(candidates, pool, config.timeout()).await
}

/// Resolve candidates against announcements from `source`.
///
/// Returns at once, without starting `source`, when there is nothing to
/// resolve.
pub async fn resolve_with<S: DatagramSource>(
    candidates: Vec<Candidate>,
    source: S,
    timeout: Duration,
) -> Resolution {
    let mut correlator = Correlator::new(candidates);
    if correlator.is_complete() {
        tracing::debug!(
            candidates = correlator.candidates().len(),
            "nothing to resolve, skipping discovery"
        );
        return correlator.finish(false);
    }

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let mut loops = JoinSet::new();
    source.start(tx, cancel.clone(), &mut loops);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut timed_out = false;
    loop {
        tokio::select! {
            _ = &mut deadline => {
                timed_out = true;
                tracing::info!(timeout_ms = timeout.as_millis() as u64, "discovery timed out");
                break;
            }
            datagram = rx.recv() => {
                let Some(datagram) = datagram else {
                    tracing::debug!("all listeners exited");
                    break;
                };

                tracing::debug!(
                    from = %datagram.from,
                    local = %datagram.local,
                    port = datagram.port,
                    text = %String::from_utf8_lossy(&datagram.payload),
                    "datagram received"
                );

                let ann = match parse_announcement(&datagram.payload) {
                    Ok(ann) => ann,
                    Err(e) => {
                        tracing::trace!(error = %e, from = %datagram.from, "ignoring datagram");
                        continue;
                    }
                };

                if let Correlation::Resolved(index) = correlator.apply(&ann) {
                    let c = &correlator.candidates()[index];
                    tracing::info!(
                        name = %c.name,
                        pid = c.pid,
                        addr = %ann.ip,
                        debug_port = ann.debug_port(),
                        "player resolved"
                    );
                    if correlator.is_complete() {
                        tracing::debug!("all candidates resolved");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    drop(rx);
    while let Some(joined) = loops.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "listener task failed");
        }
    }

    correlator.finish(timed_out)
}
