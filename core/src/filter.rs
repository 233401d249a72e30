//! Input filtering ahead of classification: the typed record predicate and
//! the CDN exclusion list.

use std::net::Ipv4Addr;
use std::path::Path;

use tracing::{debug, info};

use netsift_common::config::AnalysisConfig;
use netsift_common::network::cidr::CidrBlock;
use netsift_common::predicate::Predicate;

use crate::classify::{RawInput, Record};
use crate::error::Result;

/// Keeps the records every condition of `predicate` accepts.
pub fn filter_records(rows: Vec<Record>, predicate: &Predicate) -> Vec<Record> {
    let before = rows.len();
    let kept: Vec<Record> = rows
        .into_iter()
        .filter(|row| predicate.matches(|field| row.get(field).map(String::as_str)))
        .collect();

    debug!("Record filter kept {} of {before} rows", kept.len());
    kept
}

/// Blocks owned by content delivery networks. Addresses inside them say
/// nothing about the target's own infrastructure.
#[derive(Debug, Clone, Default)]
pub struct CdnRanges {
    blocks: Vec<CidrBlock>,
}

impl CdnRanges {
    pub fn new(blocks: Vec<CidrBlock>) -> Self {
        Self { blocks }
    }

    /// Configured blocks plus the optional JSON list file.
    pub fn from_config(cfg: &AnalysisConfig) -> Result<Self> {
        let mut blocks = cfg.cdn_ranges.clone();
        if let Some(path) = &cfg.cdn_file {
            blocks.extend(Self::read_file(path)?);
        }
        Ok(Self::new(blocks))
    }

    fn read_file(path: &Path) -> Result<Vec<CidrBlock>> {
        let raw = std::fs::read_to_string(path)?;
        let blocks: Vec<CidrBlock> = serde_json::from_str(&raw)?;
        info!("Loaded {} CDN blocks from {}", blocks.len(), path.display());
        Ok(blocks)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.blocks.iter().any(|block| block.contains(addr))
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn covers_token(&self, token: &str) -> bool {
        token
            .trim()
            .parse::<Ipv4Addr>()
            .is_ok_and(|addr| self.contains(addr))
    }
}

/// Drops bare addresses inside a CDN block, and every record whose address
/// column names one.
pub fn exclude_cdn(input: RawInput, cdn: &CdnRanges, ip_field: Option<&str>) -> RawInput {
    if cdn.is_empty() {
        return input;
    }

    match input {
        RawInput::Strings(items) => RawInput::Strings(
            items
                .into_iter()
                .filter(|item| !cdn.covers_token(item))
                .collect(),
        ),
        RawInput::Records(rows) => {
            let Some(field) = ip_field else {
                return RawInput::Records(rows);
            };
            RawInput::Records(
                rows.into_iter()
                    .filter(|row| {
                        !row.get(field)
                            .is_some_and(|cell| cell.split(',').any(|t| cdn.covers_token(t)))
                    })
                    .collect(),
            )
        }
    }
}

/// Runs both filters as configured.
pub fn prepare(input: RawInput, cfg: &AnalysisConfig, cdn: &CdnRanges) -> RawInput {
    let input = match input {
        RawInput::Records(rows) if cfg.enable_record_filter && !cfg.record_filter.is_empty() => {
            RawInput::Records(filter_records(rows, &cfg.record_filter))
        }
        other => other,
    };
    exclude_cdn(input, cdn, cfg.ip_field.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsift_common::predicate::{Condition, Operator};
    use std::io::Write;

    fn row(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn cdn() -> CdnRanges {
        CdnRanges::new(vec!["104.16.0.0/13".parse().unwrap()])
    }

    #[test]
    fn default_record_filter_keeps_first_level_live_origins() {
        let cfg = AnalysisConfig::default();
        let rows = vec![
            row(&[("ip", "1.1.1.1"), ("cdn", "0"), ("level", "1"), ("alive", "1")]),
            row(&[("ip", "1.1.1.2"), ("cdn", "1"), ("level", "1"), ("alive", "1")]),
            row(&[("ip", "1.1.1.3"), ("cdn", "0"), ("level", "3"), ("alive", "1")]),
            row(&[("ip", "1.1.1.4"), ("cdn", "0"), ("level", "2")]),
        ];

        let kept = filter_records(rows, &cfg.record_filter);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["ip"], "1.1.1.1");
    }

    #[test]
    fn disabled_record_filter_passes_everything() {
        let cfg = AnalysisConfig {
            enable_record_filter: false,
            ..AnalysisConfig::default()
        };
        let input = RawInput::Records(vec![row(&[("ip", "1.1.1.1")])]);
        assert_eq!(prepare(input.clone(), &cfg, &CdnRanges::default()), input);
    }

    #[test]
    fn cdn_addresses_are_removed_from_strings() {
        let input = RawInput::Strings(vec![
            "104.16.1.1".into(),
            "8.8.8.8".into(),
            "104.16.0.0/24".into(),
        ]);

        let out = exclude_cdn(input, &cdn(), None);

        assert_eq!(
            out,
            RawInput::Strings(vec!["8.8.8.8".into(), "104.16.0.0/24".into()])
        );
    }

    #[test]
    fn records_naming_any_cdn_address_are_removed() {
        let input = RawInput::Records(vec![
            row(&[("ip", "8.8.8.8,104.17.0.1")]),
            row(&[("ip", "8.8.4.4")]),
        ]);

        let RawInput::Records(rows) = exclude_cdn(input, &cdn(), Some("ip")) else {
            panic!("shape changed");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["ip"], "8.8.4.4");
    }

    #[test]
    fn cdn_file_extends_configured_ranges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["198.51.100.0/24"]"#).unwrap();

        let cfg = AnalysisConfig {
            cdn_ranges: vec!["104.16.0.0/13".parse().unwrap()],
            cdn_file: Some(file.path().to_path_buf()),
            ..AnalysisConfig::default()
        };
        let ranges = CdnRanges::from_config(&cfg).unwrap();

        assert!(ranges.contains(Ipv4Addr::new(198, 51, 100, 9)));
        assert!(ranges.contains(Ipv4Addr::new(104, 17, 0, 1)));
        assert!(!ranges.contains(Ipv4Addr::new(8, 8, 8, 8)));
    }
}
