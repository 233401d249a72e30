//! Errors raised while parsing targets or loading configuration.

use std::net::AddrParseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid IP address: {0}")]
    IpParse(#[from] AddrParseError),

    #[error("Invalid CIDR notation: {0}")]
    CidrParse(String),

    #[error("Invalid prefix: {0} > 32")]
    InvalidPrefix(u8),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unknown export format: {0}")]
    InvalidFormat(String),

    #[error("Unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}
