//! # Scan Target Tokens
//!
//! Defines the possible inputs handed to the tool on the command line.
//!
//! A token can be:
//! * A single IPv4 address (e.g., `192.168.1.5`).
//! * A CIDR block (e.g., `192.168.1.0/24`).
//! * A path to a `.txt`, `.csv` or `.json` file holding more targets.
//! * A comma-separated list of any of the above.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::network::cidr::CidrBlock;

/// File formats the loaders understand, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// One address or block per line.
    Txt,
    /// Tabular records with a header row.
    Csv,
    /// An array of flat objects.
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(FileFormat::Txt),
            "csv" => Some(FileFormat::Csv),
            "json" => Some(FileFormat::Json),
            _ => None,
        }
    }
}

/// Represents a distinct target token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single host address.
    Host { addr: Ipv4Addr },
    /// A network block.
    Block { cidr: CidrBlock },
    /// A file to be read by one of the loaders.
    File { path: PathBuf, format: FileFormat },
    /// Holds a list of different targets
    Multi { targets: Vec<Target> },
}

impl FromStr for Target {
    type Err = Error;

    /// Parses a string into a `Target`.
    ///
    /// Supported formats:
    /// * **File**: any token ending in `.txt`, `.csv` or `.json`.
    /// * **Host**: Single IPv4 address (e.g. "192.168.1.5").
    /// * **CIDR**: "Network/Prefix" (e.g. "192.168.1.0/24").
    /// * **List**: comma-separated mix of the above.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(target) = parse_file(s) {
            return Ok(target);
        }

        if s.contains(',') {
            return parse_commas(s);
        }

        if let Ok(addr) = s.parse::<Ipv4Addr>() {
            return Ok(Target::Host { addr });
        }

        if s.contains('/') {
            let cidr = s.parse::<CidrBlock>()?;
            return Ok(Target::Block { cidr });
        }

        Err(Error::InvalidTarget(s.to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Host { addr } => write!(f, "{addr}"),
            Target::Block { cidr } => write!(f, "{cidr}"),
            Target::File { path, .. } => write!(f, "{}", path.display()),
            Target::Multi { targets } => {
                let parts: Vec<String> = targets.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl Target {
    /// Expands nested lists into a flat sequence of single targets.
    pub fn flatten(self) -> Vec<Target> {
        match self {
            Target::Multi { targets } => targets.into_iter().flat_map(Target::flatten).collect(),
            single => vec![single],
        }
    }
}

/// Parses a comma-separated list of targets (e.g., "192.168.1.5, 10.0.0.0/8, hosts.txt").
pub fn parse_commas(s: &str) -> Result<Target> {
    let mut targets = Vec::new();

    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        targets.push(Target::from_str(part)?);
    }

    if targets.is_empty() {
        return Err(Error::InvalidTarget(s.to_string()));
    }

    Ok(Target::Multi { targets })
}

fn parse_file(s: &str) -> Option<Target> {
    let path = PathBuf::from(s);
    let format = FileFormat::from_path(&path)?;
    Some(Target::File { path, format })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_full_parsing() {
        assert!(matches!(
            Target::from_str("1.1.1.1"),
            Ok(Target::Host { .. })
        ));
        assert!(matches!(
            Target::from_str("10.0.0.0/24"),
            Ok(Target::Block { .. })
        ));
        assert!(matches!(
            Target::from_str("./subdomains.CSV"),
            Ok(Target::File { format: FileFormat::Csv, .. })
        ));
        assert!(matches!(
            Target::from_str("list.txt"),
            Ok(Target::File { format: FileFormat::Txt, .. })
        ));
        assert!(matches!(
            Target::from_str("dump.json"),
            Ok(Target::File { format: FileFormat::Json, .. })
        ));

        assert!(Target::from_str("not-an-ip").is_err());
        assert!(Target::from_str("10.0.0.1/33").is_err());
        assert!(Target::from_str("results.xml").is_err());
        assert!(Target::from_str("::1").is_err());
    }

    #[test]
    fn test_parse_commas_flattens() {
        let target = Target::from_str("10.0.0.1, 10.0.0.0/8,,hosts.txt").unwrap();
        let flat = target.flatten();

        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0], Target::Host { addr: Ipv4Addr::new(10, 0, 0, 1) });
        assert_eq!(flat[1].to_string(), "10.0.0.0/8");
        assert!(matches!(flat[2], Target::File { format: FileFormat::Txt, .. }));
    }

    #[test]
    fn test_parse_commas_rejects_bad_member() {
        assert!(parse_commas("10.0.0.1,bogus").is_err());
        assert!(parse_commas(",,").is_err());
    }
}
