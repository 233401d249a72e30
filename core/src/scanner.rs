//! # Probe Execution
//!
//! The engine only needs two questions answered: which hosts of a target are
//! up, and what runs on the hosts listed in a batch file. [`Scanner`] is that
//! seam. [`nmap`] answers both by driving the `nmap` binary.
//!
//! High-level code depends on the trait only, so tests can feed canned
//! results without a scanner installed.

use std::net::Ipv4Addr;
use std::path::Path;

use async_trait::async_trait;
use tracing::{error, info, trace, warn};

use netsift_common::models::HostPorts;
use netsift_common::network::cidr::CidrBlock;

use crate::error::Result;

pub mod nmap;

pub use nmap::NmapScanner;

/// Summary line a scanner reports for every invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    pub command_line: String,
    /// Seconds.
    pub elapsed: f64,
    pub up_hosts: u32,
    pub total_hosts: u32,
}

impl ScanStats {
    pub fn log(&self) {
        info!("Command line: {}", self.command_line);
        warn!(
            "elapsed: {:.2}s  up: {}  total: {}",
            self.elapsed, self.up_hosts, self.total_hosts
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LivenessReport {
    pub alive: Vec<Ipv4Addr>,
    pub stats: ScanStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceReport {
    pub hosts: HostPorts,
    pub stats: ScanStats,
}

#[async_trait]
pub trait Scanner: Send + Sync {
    /// Host discovery against a single address or block.
    async fn liveness(&self, target: &str) -> Result<LivenessReport>;

    /// Service detection against every host listed in `batch`, one per line.
    async fn services(&self, batch: &Path) -> Result<ServiceReport>;
}

/// Runs a liveness probe per target. A failing target is logged and
/// skipped. Returns every live address once, in ascending order.
pub async fn sweep_alive<S>(scanner: &S, targets: &[CidrBlock]) -> Vec<Ipv4Addr>
where
    S: Scanner + ?Sized,
{
    info!("Host liveness sweep started");

    let mut alive = Vec::new();
    for (i, target) in targets.iter().enumerate() {
        trace!("Target: {target}");
        info!("{} targets left", targets.len() - i);

        match scanner.liveness(&target.to_string()).await {
            Ok(report) => {
                report.stats.log();
                alive.extend(report.alive);
            }
            Err(e) => error!("Liveness probe of {target} failed: {e}"),
        }
    }

    alive.sort_unstable();
    alive.dedup();
    info!("Host liveness sweep finished, {} hosts up", alive.len());
    alive
}
