//! # CIDR Block
//!
//! The grouping key of the whole engine. A block keeps the address exactly as
//! it was supplied (so `10.0.0.5/24` and `10.0.0.0/24` stay distinct keys),
//! while membership is always decided against the normalized network.

use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::network::range::Ipv4Range;

/// Mask length of the blocks synthesized for unmatched addresses and of the
/// fragments produced when splitting.
pub const FRAGMENT_PREFIX: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrBlock(Ipv4Network);

impl CidrBlock {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        Ipv4Network::new(addr, prefix)
            .map(Self)
            .map_err(|_| Error::InvalidPrefix(prefix))
    }

    /// The `/24` that holds `addr`: first three octets kept, last zeroed.
    pub fn enclosing_fragment(addr: Ipv4Addr) -> Self {
        let [a, b, c, _] = addr.octets();
        let base = Ipv4Addr::new(a, b, c, 0);
        // FRAGMENT_PREFIX is always a valid prefix, the /32 arm is never taken.
        Self::new(base, FRAGMENT_PREFIX).unwrap_or(Self(Ipv4Network::from(base)))
    }

    /// Address as written in the block key.
    pub fn addr(&self) -> Ipv4Addr {
        self.0.ip()
    }

    pub fn prefix(&self) -> u8 {
        self.0.prefix()
    }

    pub fn network_addr(&self) -> Ipv4Addr {
        self.0.network()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.0.contains(addr)
    }

    pub fn range(&self) -> Ipv4Range {
        Ipv4Range::new(self.0.network(), self.0.broadcast())
    }

    /// Number of addresses covered by the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix()))
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr(), self.prefix())
    }
}

impl FromStr for CidrBlock {
    type Err = Error;

    /// Parses `a.b.c.d/n`. The prefix must be within `0..=32`.
    fn from_str(s: &str) -> Result<Self> {
        let Some((ip_str, prefix_str)) = s.trim().split_once('/') else {
            return Err(Error::CidrParse(s.to_string()));
        };

        let addr = ip_str
            .parse::<Ipv4Addr>()
            .map_err(|e| Error::CidrParse(format!("{s}: {e}")))?;

        let prefix = prefix_str
            .parse::<u8>()
            .map_err(|e| Error::CidrParse(format!("{s}: {e}")))?;

        Self::new(addr, prefix)
    }
}

impl Ord for CidrBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.addr(), self.prefix()).cmp(&(other.addr(), other.prefix()))
    }
}

impl PartialOrd for CidrBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for CidrBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CidrBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(s: &str) -> CidrBlock {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_displays_literal_form() {
        assert_eq!(block("10.0.0.0/24").to_string(), "10.0.0.0/24");
        assert_eq!(block(" 10.0.0.5/24 ").to_string(), "10.0.0.5/24");
        assert_ne!(block("10.0.0.5/24"), block("10.0.0.0/24"));
    }

    #[test]
    fn rejects_malformed_blocks() {
        assert!("10.0.0.0".parse::<CidrBlock>().is_err());
        assert!("10.0.0.0/33".parse::<CidrBlock>().is_err());
        assert!("10.0.0.256/24".parse::<CidrBlock>().is_err());
        assert!("10.0.0.0/abc".parse::<CidrBlock>().is_err());
    }

    #[test]
    fn membership_uses_the_normalized_network() {
        let b = block("10.0.0.5/24");
        assert!(b.contains(Ipv4Addr::new(10, 0, 0, 200)));
        assert!(!b.contains(Ipv4Addr::new(10, 0, 1, 0)));
        assert_eq!(b.network_addr(), Ipv4Addr::new(10, 0, 0, 0));
    }

    #[test]
    fn enclosing_fragment_zeroes_last_octet() {
        let b = CidrBlock::enclosing_fragment(Ipv4Addr::new(192, 168, 1, 9));
        assert_eq!(b.to_string(), "192.168.1.0/24");
        assert_eq!(b.size(), 256);
    }

    #[test]
    fn size_covers_whole_space() {
        assert_eq!(block("0.0.0.0/0").size(), 1 << 32);
        assert_eq!(block("10.0.0.1/32").size(), 1);
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&block("172.16.0.0/12")).unwrap();
        assert_eq!(json, "\"172.16.0.0/12\"");
        let back: CidrBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block("172.16.0.0/12"));
    }
}
