//! dapscout — find local runtime instances and the endpoints to attach a
//! debugger to.
//!
//! One shot: list candidate processes, resolve players from multicast
//! announcements, fall back to a TCP probe when nothing resolved over the
//! network, print the report. Always exits 0; failures are logged.

use std::io::Write;
use std::net::IpAddr;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use dapscout_core::{DapscoutConfig, ProbeConfig};
use dapscout_discovery::{resolve, scan_range, CandidateSource, Resolution, SystemCandidates};

mod report;

use report::ProbeResults;

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let ignored: Vec<String> = std::env::args().skip(1).collect();
    if !ignored.is_empty() {
        tracing::debug!(?ignored, "dapscout takes no arguments");
    }

    if let Err(e) = run().await {
        tracing::error!(error = %format!("{e:#}"), "scan failed");
    }
}

async fn run() -> Result<()> {
    let config = DapscoutConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        DapscoutConfig::default()
    });

    let candidates = SystemCandidates::new(config.classify.clone()).list_candidates();
    let resolution = resolve(candidates, &config.discovery).await;

    let probes = fallback_probe(&resolution, &config).await;

    let text = report::render(&resolution, config.discovery.timeout_ms, &probes);
    std::io::stdout()
        .lock()
        .write_all(text.as_bytes())
        .context("failed to write report")?;
    Ok(())
}

/// The fallback runs only when enabled and no candidate has a non-loopback
/// address.
fn needs_fallback(resolution: &Resolution, probe: &ProbeConfig) -> bool {
    probe.enabled && !resolution.candidates.iter().any(|c| c.is_network_resolved())
}

/// Probe the configured addresses when no candidate resolved to a network
/// address.
async fn fallback_probe(resolution: &Resolution, config: &DapscoutConfig) -> ProbeResults {
    let probe = &config.probe;
    if !needs_fallback(resolution, probe) {
        return Vec::new();
    }

    tracing::info!(
        addresses = probe.addresses.len(),
        start_port = probe.start_port,
        end_port = probe.end_port,
        "nothing resolved over the network, probing ports"
    );

    let mut results = Vec::new();
    for &addr in &probe.addresses {
        let open = scan_range(
            IpAddr::V4(addr),
            probe.start_port,
            probe.end_port,
            probe.attempt_timeout(),
        )
        .await;
        results.push((addr, open));
    }
    results
}
