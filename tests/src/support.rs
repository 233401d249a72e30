//! Scripted scanner and fetcher.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use netsift_common::config::Config;
use netsift_common::models::{HostPorts, ServiceObservation};
use netsift_common::network::cidr::CidrBlock;
use netsift_core::error::{Error, Result};
use netsift_core::fetch::{FetchResult, FetchTask, Fetcher};
use netsift_core::scanner::{LivenessReport, ScanStats, Scanner, ServiceReport};

/// Answers liveness from a fixed host list and services from a fixed port
/// table. Every probe it receives is recorded.
#[derive(Clone, Default)]
pub struct ScriptedScanner {
    pub alive: Vec<Ipv4Addr>,
    pub services: HostPorts,
    /// Batches containing any of these hosts fail.
    pub failing: Vec<Ipv4Addr>,
    pub probed: Arc<Mutex<Vec<String>>>,
    pub batches: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptedScanner {
    pub fn new(alive: Vec<Ipv4Addr>) -> Self {
        Self {
            alive,
            ..Default::default()
        }
    }

    pub fn with_service(mut self, ip: Ipv4Addr, port: u16, name: &str) -> Self {
        self.services.entry(ip).or_default().insert(port, ServiceObservation {
            state: "open".into(),
            name: Some(name.into()),
            ..Default::default()
        });
        self
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn batches(&self) -> Vec<PathBuf> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Scanner for ScriptedScanner {
    async fn liveness(&self, target: &str) -> Result<LivenessReport> {
        if let Ok(mut probed) = self.probed.lock() {
            probed.push(target.to_string());
        }

        let block: CidrBlock = target.parse()?;
        let alive: Vec<Ipv4Addr> = self
            .alive
            .iter()
            .copied()
            .filter(|ip| block.contains(*ip))
            .collect();

        Ok(LivenessReport {
            stats: ScanStats {
                command_line: format!("scripted {target}"),
                up_hosts: alive.len() as u32,
                total_hosts: block.size() as u32,
                ..Default::default()
            },
            alive,
        })
    }

    async fn services(&self, batch: &Path) -> Result<ServiceReport> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch.to_path_buf());
        }

        let text = std::fs::read_to_string(batch)?;
        let mut hosts = HostPorts::new();
        for line in text.lines() {
            let ip: Ipv4Addr = line
                .parse()
                .map_err(|_| Error::Scanner(format!("bad host line {line:?}")))?;
            if self.failing.contains(&ip) {
                return Err(Error::Scanner(format!("probe of {ip} timed out")));
            }
            if let Some(ports) = self.services.get(&ip) {
                hosts.insert(ip, ports.clone());
            }
        }

        Ok(ServiceReport {
            hosts,
            ..Default::default()
        })
    }
}

/// Titles every page `"<url> title"` with status 200, plus any extra
/// results it was told to invent.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    pub extra: Vec<FetchResult>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFetcher {
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_all(&self, tasks: Vec<FetchTask>) -> Vec<FetchResult> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.extend(tasks.iter().map(|t| t.url.clone()));
        }

        let mut results: Vec<FetchResult> = tasks
            .into_iter()
            .map(|t| {
                let title = format!("{} title", t.url);
                FetchResult::page(t, 200, title)
            })
            .collect();
        results.extend(self.extra.iter().cloned());
        results
    }
}

/// Defaults redirected into `dir`, with the record filter off.
pub fn config_in(dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.scan.temp_dir = dir.join("batches");
    cfg.export.dir = dir.join("results");
    cfg.store.path = dir.join("netsift.sqlite3");
    cfg.analysis.enable_record_filter = false;
    cfg
}
