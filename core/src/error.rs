//! Errors raised by the engine and its adapters.

use std::net::Ipv4Addr;

use netsift_common::network::cidr::CidrBlock;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] netsift_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed scanner output: {0}")]
    Xml(String),

    #[error("Scanner failed: {0}")]
    Scanner(String),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    /// An enrichment result refers to a port the index does not hold.
    #[error("No port {port} recorded for {ip} under {cidr}")]
    StaleEnrichment {
        cidr: CidrBlock,
        ip: Ipv4Addr,
        port: u16,
    },
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}
