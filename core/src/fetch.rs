//! # HTTP Enrichment
//!
//! Requests the landing page of every open HTTP-looking service and keeps
//! its title and status code.
//!
//! * [`pool`]: the task queue, worker pool and progress monitor.
//! * [`title`]: body decoding and title extraction.
//! * [`http`]: the `reqwest` page client.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use netsift_common::models::FlatRecord;
use netsift_common::network::cidr::CidrBlock;

use crate::error::Result;

pub mod http;
pub mod pool;
pub mod title;

pub use http::HttpClient;
pub use pool::WorkerPool;

/// One page to request, keyed by the row it will enrich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub cidr: CidrBlock,
    pub ip: Ipv4Addr,
    pub port: u16,
    pub url: String,
}

impl FetchTask {
    /// `https://` when the service name says so or the port is 443.
    pub fn url_for(ip: Ipv4Addr, port: u16, service: &str) -> String {
        let scheme = if service.contains("https") || port == 443 {
            "https"
        } else {
            "http"
        };
        format!("{scheme}://{ip}:{port}")
    }

    /// Task for a stored row. Rows without a port are skipped.
    pub fn from_record(row: &FlatRecord) -> Option<Self> {
        let port = row.port?;
        let url = Self::url_for(row.ip, port, row.name.as_deref().unwrap_or_default());
        Some(Self {
            cidr: row.cidr,
            ip: row.ip,
            port,
            url,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub cidr: CidrBlock,
    pub ip: Ipv4Addr,
    pub port: u16,
    pub url: String,
    /// Page title, or the error text when the request failed.
    pub title: String,
    /// `None` when no response arrived.
    pub status: Option<u16>,
}

impl FetchResult {
    pub fn page(task: FetchTask, status: u16, title: String) -> Self {
        Self {
            cidr: task.cidr,
            ip: task.ip,
            port: task.port,
            url: task.url,
            title,
            status: Some(status),
        }
    }

    pub fn failed(task: FetchTask, error: String) -> Self {
        Self {
            cidr: task.cidr,
            ip: task.ip,
            port: task.port,
            url: task.url,
            title: error,
            status: None,
        }
    }
}

/// Raw response of a single GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Performs one GET. Implementations must not retry.
#[async_trait]
pub trait PageClient: Send + Sync + 'static {
    async fn get(&self, url: &str) -> Result<Page>;
}

/// Resolves a whole set of tasks. Failed requests come back as results too,
/// so the output has one entry per task.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_all(&self, tasks: Vec<FetchTask>) -> Vec<FetchResult>;
}
