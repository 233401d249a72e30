//! # Address Classification
//!
//! Turns raw input into validated IPv4 addresses and CIDR blocks. Anything
//! that does not look like either, or looks like one but does not parse
//! (octet > 255, mask > 32), is dropped with a trace note. Classification
//! never fails.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, trace};

use netsift_common::config::AnalysisConfig;
use netsift_common::network::cidr::CidrBlock;

static CIDR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+/\d+$").expect("valid CIDR pattern"));
static ADDR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("valid address pattern"));

/// A tabular input row: column name to cell text.
pub type Record = BTreeMap<String, String>;

/// Input handed to the classifier. The caller decides which shape it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    /// Bare address and block tokens.
    Strings(Vec<String>),
    /// Rows read from CSV or JSON.
    Records(Vec<Record>),
}

impl RawInput {
    pub fn len(&self) -> usize {
        match self {
            RawInput::Strings(items) => items.len(),
            RawInput::Records(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column names used to read records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    pub ip: Option<String>,
    pub cidr: Option<String>,
    pub domain: Option<String>,
}

impl From<&AnalysisConfig> for FieldMap {
    fn from(cfg: &AnalysisConfig) -> Self {
        Self {
            ip: cfg.ip_field.clone(),
            cidr: cfg.cidr_field.clone(),
            domain: cfg.domain_field.clone(),
        }
    }
}

/// Deduplicated classifier output, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub addresses: Vec<Ipv4Addr>,
    pub cidrs: Vec<CidrBlock>,
    /// Names seen next to each address in record input.
    pub domains: BTreeMap<Ipv4Addr, BTreeSet<String>>,
}

impl Classified {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.cidrs.is_empty()
    }

    pub fn domains_of(&self, addr: &Ipv4Addr) -> Option<&BTreeSet<String>> {
        self.domains.get(addr)
    }

    /// Appends what `other` found that `self` has not seen, keeping first
    /// appearance order across both. Domain sets are unioned.
    pub fn extend(&mut self, other: Classified) {
        let known_addrs: HashSet<Ipv4Addr> = self.addresses.iter().copied().collect();
        let known_cidrs: HashSet<CidrBlock> = self.cidrs.iter().copied().collect();

        self.addresses
            .extend(other.addresses.into_iter().filter(|a| !known_addrs.contains(a)));
        self.cidrs
            .extend(other.cidrs.into_iter().filter(|c| !known_cidrs.contains(c)));

        for (addr, names) in other.domains {
            self.domains.entry(addr).or_default().extend(names);
        }
    }
}

#[derive(Default)]
struct Collector {
    out: Classified,
    seen_addrs: HashSet<Ipv4Addr>,
    seen_cidrs: HashSet<CidrBlock>,
}

impl Collector {
    fn push_addr(&mut self, addr: Ipv4Addr) {
        if self.seen_addrs.insert(addr) {
            self.out.addresses.push(addr);
        }
    }

    fn push_cidr(&mut self, cidr: CidrBlock) {
        if self.seen_cidrs.insert(cidr) {
            self.out.cidrs.push(cidr);
        }
    }

    /// Files `token` as an address or a block, whichever it is.
    fn push_token(&mut self, token: &str) {
        match classify_token(token) {
            Some(Token::Addr(addr)) => self.push_addr(addr),
            Some(Token::Cidr(cidr)) => self.push_cidr(cidr),
            None => {}
        }
    }
}

enum Token {
    Addr(Ipv4Addr),
    Cidr(CidrBlock),
}

fn classify_token(raw: &str) -> Option<Token> {
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }

    if CIDR_PATTERN.is_match(token) {
        return match token.parse::<CidrBlock>() {
            Ok(cidr) => Some(Token::Cidr(cidr)),
            Err(e) => {
                trace!("Dropping {token:?}: {e}");
                None
            }
        };
    }

    if ADDR_PATTERN.is_match(token) {
        return match token.parse::<Ipv4Addr>() {
            Ok(addr) => Some(Token::Addr(addr)),
            Err(e) => {
                trace!("Dropping {token:?}: {e}");
                None
            }
        };
    }

    trace!("Dropping {token:?}: neither an address nor a block");
    None
}

/// Classifies one input.
pub fn classify(input: &RawInput, fields: &FieldMap) -> Classified {
    match input {
        RawInput::Strings(items) => classify_strings(items),
        RawInput::Records(rows) => classify_records(rows, fields),
    }
}

pub fn classify_strings(items: &[String]) -> Classified {
    let mut collector = Collector::default();
    for item in items {
        collector.push_token(item);
    }
    collector.out
}

/// Reads the configured columns of every row. Address and block cells may
/// hold comma-separated lists.
pub fn classify_records(rows: &[Record], fields: &FieldMap) -> Classified {
    let Some(ip_field) = fields.ip.as_deref() else {
        error!("No address column configured, records cannot be classified");
        return Classified::default();
    };

    let mut collector = Collector::default();

    for row in rows {
        let domain = fields
            .domain
            .as_deref()
            .and_then(|f| row.get(f))
            .map(|d| d.trim())
            .filter(|d| !d.is_empty());

        let cell = row.get(ip_field).map(String::as_str).unwrap_or_default();
        for token in cell.split(',') {
            let Some(Token::Addr(addr)) = classify_token(token) else {
                if !token.trim().is_empty() {
                    trace!("Dropping {token:?} from column {ip_field}");
                }
                continue;
            };
            collector.push_addr(addr);
            if let Some(domain) = domain {
                collector
                    .out
                    .domains
                    .entry(addr)
                    .or_default()
                    .insert(domain.to_string());
            }
        }

        if let Some(cell) = fields.cidr.as_deref().and_then(|f| row.get(f)) {
            for token in cell.split(',') {
                match classify_token(token) {
                    Some(Token::Cidr(cidr)) => collector.push_cidr(cidr),
                    Some(Token::Addr(_)) => trace!("Dropping {token:?}: address in block column"),
                    None => {}
                }
            }
        }
    }

    collector.out
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
