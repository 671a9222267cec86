//! Human-readable report on stdout.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

use dapscout_core::{Announcement, Candidate};
use dapscout_discovery::Resolution;

/// Open ports found by the fallback probe, per address.
pub type ProbeResults = Vec<(Ipv4Addr, BTreeSet<u16>)>;

fn or_dash<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn write_candidate(out: &mut String, c: &Candidate) {
    let _ = writeln!(out, "  ┌─ {} (pid {})", c.name, c.pid);
    let _ = writeln!(out, "  │  address      : {}", or_dash(c.address));
    let _ = writeln!(out, "  │  debug port   : {}", or_dash(c.debug_port));
    let _ = writeln!(out, "  │  message port : {}", or_dash(c.message_port));
    let _ = writeln!(out, "  └─ role         : {}", c.role);
}

fn write_unmatched(out: &mut String, a: &Announcement) {
    let _ = writeln!(out, "  ┌─ {} ({})", a.project_name, a.package_name);
    let _ = writeln!(out, "  │  address      : {}", a.ip);
    let _ = writeln!(out, "  │  debug port   : {}", a.debug_port());
    let _ = writeln!(out, "  └─ message port : {}", a.message_port());
}

/// Render the full report.
pub fn render(resolution: &Resolution, timeout_ms: u64, probes: &ProbeResults) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "═══════════════════════════════════════");
    let _ = writeln!(out, "  Runtime Instances ({})", resolution.candidates.len());
    let _ = writeln!(out, "═══════════════════════════════════════");

    if resolution.candidates.is_empty() {
        let _ = writeln!(out, "  No runtime instances found.");
    }
    for c in &resolution.candidates {
        write_candidate(&mut out, c);
    }

    if resolution.timed_out {
        let unresolved = resolution
            .candidates
            .iter()
            .filter(|c| !c.is_resolved())
            .count();
        let _ = writeln!(
            out,
            "\n  Discovery timed out after {timeout_ms}ms ({unresolved} unresolved)."
        );
    }

    if !resolution.unmatched.is_empty() {
        let _ = writeln!(out, "\n  Other announcements on the network:");
        for a in &resolution.unmatched {
            write_unmatched(&mut out, a);
        }
    }

    for (addr, open) in probes {
        if open.is_empty() {
            let _ = writeln!(out, "\n  Port probe {addr}: no open ports.");
        } else {
            let ports: Vec<String> = open.iter().map(u16::to_string).collect();
            let _ = writeln!(out, "\n  Port probe {addr}: {}", ports.join(", "));
        }
    }

    out
}
