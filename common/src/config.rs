//! Run configuration.
//!
//! Every component receives the section it needs by reference; nothing reads
//! configuration from global state. Values can come from a TOML file where
//! any omitted key falls back to its default.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::network::cidr::CidrBlock;
use crate::predicate::{Condition, Operator, Predicate};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stop after reduction; no scanning, no enrichment.
    pub analysis_only: bool,
    pub analysis: AnalysisConfig,
    pub scan: ScanConfig,
    pub store: StoreConfig,
    pub request: RequestConfig,
    pub export: ExportConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enable_cut_mask: bool,
    /// Blocks with a shorter prefix are split into /24 fragments. 0 disables.
    pub min_mask: u8,
    pub enable_filter: bool,
    pub top: usize,
    pub min_count: usize,
    pub ip_field: Option<String>,
    pub cidr_field: Option<String>,
    pub domain_field: Option<String>,
    pub enable_record_filter: bool,
    pub record_filter: Predicate,
    /// Addresses inside these blocks are dropped before reduction.
    pub cdn_ranges: Vec<CidrBlock>,
    /// JSON array of additional CDN blocks.
    pub cdn_file: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enable_cut_mask: true,
            min_mask: 21,
            enable_filter: true,
            top: 5,
            min_count: 2,
            ip_field: Some("ip".into()),
            cidr_field: Some("cidr".into()),
            domain_field: Some("subdomain".into()),
            enable_record_filter: true,
            record_filter: Predicate::new(vec![
                Condition::new("cdn", Operator::Eq, "0"),
                Condition::new("level", Operator::Le, "2"),
                Condition::new("alive", Operator::Eq, "1"),
            ]),
            cdn_ranges: Vec::new(),
            cdn_file: None,
        }
    }
}

const DEFAULT_PORTS: &[u16] = &[
    21, 22, 23, 25, 42, 43, 53, 80, 81, 107, 135, 280, 300, 443, 445, 520, 591, 593, 832, 888,
    901, 981, 1010, 1080, 1100, 1241, 1311, 1352, 1433, 1434, 1521, 1527, 1582, 1583, 1944, 2082,
    2086, 2087, 2095, 2096, 2222, 2301, 2480, 3000, 3128, 3306, 3333, 3389, 3443, 4000, 4001,
    4002, 4100, 4125, 4243, 4443, 4444, 4567, 4711, 4712, 4848, 4849, 4993, 5000, 5104, 5108,
    5432, 5555, 5800, 5801, 5802, 5984, 5985, 5986, 6082, 6225, 6346, 6347, 6443, 6480, 6543,
    6789, 7000, 7001, 7002, 7396, 7474, 7674, 7675, 7777, 7778, 8000, 8001, 8002, 8003, 8004,
    8005, 8006, 8008, 8009, 8010, 8014, 8016, 8042, 8069, 8075, 8080, 8081, 8083, 8088, 8090,
    8091, 8092, 8093, 8118, 8123, 8172, 8181, 8200, 8222, 8243, 8280, 8281, 8333, 8384, 8403,
    8443, 8500, 8530, 8531, 8800, 8806, 8834, 8880, 8887, 8888, 8910, 8983, 8989, 8990, 8991,
    9000, 9043, 9060, 9080, 9090, 9091, 9200, 9294, 9295, 9443, 9444, 9800, 9981, 9988, 9990,
    9999, 10000, 10880, 11371, 12043, 12046, 12443, 13443, 15672, 16080, 16225, 18091, 18092,
    18834,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub nmap_path: PathBuf,
    pub alive_args: String,
    pub port_args: String,
    pub ports: Vec<u16>,
    /// Pass `ports` with `-p`; otherwise `port_args` decides the port set.
    pub custom_ports: bool,
    /// Prefix probes with sudo when not already running as root.
    pub sudo: bool,
    /// Opaque value handed to `--proxies`.
    pub proxies: Option<String>,
    pub batch_size: usize,
    pub temp_dir: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            nmap_path: PathBuf::from("nmap"),
            alive_args: "-T4 -sn -n --min-parallelism 256".into(),
            port_args: "-T4 -sV -n --min-hostgroup 256 --min-parallelism 512".into(),
            ports: DEFAULT_PORTS.to_vec(),
            custom_ports: true,
            sudo: true,
            proxies: None,
            batch_size: 256,
            temp_dir: std::env::temp_dir().join("netsift"),
        }
    }
}

impl ScanConfig {
    /// Comma-separated port list, or `None` when custom ports are disabled.
    pub fn port_spec(&self) -> Option<String> {
        if !self.custom_ports || self.ports.is_empty() {
            return None;
        }

        let mut ports = self.ports.clone();
        ports.sort_unstable();
        ports.dedup();

        Some(
            ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub table: String,
    pub staging_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("results").join("netsift.sqlite3"),
            table: "RESULTS".into(),
            staging_table: "STAGING".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub enabled: bool,
    /// Worker count. Anything below 16 is raised to 16.
    pub threads: Option<usize>,
    /// Seconds.
    pub connect_timeout: f64,
    /// Seconds.
    pub read_timeout: f64,
    pub verify_tls: bool,
    pub follow_redirects: bool,
    pub redirect_limit: usize,
    pub headers: BTreeMap<String, String>,
    /// Proxy URLs; one is picked at random per client.
    pub proxies: Vec<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        let headers = [
            ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Cache-Control", "max-age=0"),
            ("DNT", "1"),
            (
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/76.0.3809.100 Safari/537.36",
            ),
            ("Upgrade-Insecure-Requests", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            enabled: true,
            threads: None,
            connect_timeout: 3.05,
            read_timeout: 27.0,
            verify_tls: false,
            follow_redirects: true,
            redirect_limit: 10,
            headers,
            proxies: Vec::new(),
        }
    }
}

impl RequestConfig {
    pub const MIN_WORKERS: usize = 16;
    pub const DEFAULT_WORKERS: usize = 32;

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout.max(0.0))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout.max(0.0))
    }

    /// Configured worker count floored at [`Self::MIN_WORKERS`].
    pub fn workers(&self) -> usize {
        self.threads
            .unwrap_or(Self::DEFAULT_WORKERS)
            .max(Self::MIN_WORKERS)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(crate::error::Error::InvalidFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub dir: PathBuf,
    /// Exact output file; overrides `dir`.
    pub path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Csv,
            dir: PathBuf::from("results"),
            path: None,
        }
    }
}
