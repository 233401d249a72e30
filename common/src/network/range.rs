//! # IPv4 Range Model
//!
//! Continuous, inclusive ranges of IPv4 addresses. Blocks are turned into
//! ranges when the subnetter needs to walk their address space.

use std::net::Ipv4Addr;

/// Represents a continuous range of IPv4 addresses, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    /// Number of addresses in the range. `0` when start > end.
    pub fn len(&self) -> u64 {
        let start: u64 = u32::from(self.start_addr).into();
        let end: u64 = u32::from(self.end_addr).into();
        if start > end { 0 } else { end - start + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks the range backward in strides of `stride` addresses and yields
    /// the first address of every full stride, highest first.
    ///
    /// A range shorter than one stride yields nothing.
    pub fn stride_starts(&self, stride: u32) -> impl Iterator<Item = Ipv4Addr> {
        let len: u64 = self.len();
        let stride: u64 = u64::from(stride.max(1));
        let base: u64 = u32::from(self.start_addr).into();

        (1..=len / stride).map(move |k| {
            let offset = len - k * stride;
            Ipv4Addr::from((base + offset) as u32)
        })
    }
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
    fn test_ipv4range_len() {
        let range = Ipv4Range::new(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 0, 255));
        assert_eq!(range.len(), 256);

        let inverted = Ipv4Range::new(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(inverted.len(), 0);
        assert!(inverted.is_empty());

        let everything = Ipv4Range::new(Ipv4Addr::UNSPECIFIED, Ipv4Addr::BROADCAST);
        assert_eq!(everything.len(), 1 << 32);
    }

    #[test]
    fn test_stride_starts_walks_backward() {
        let range = Ipv4Range::new(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 3, 255));
        let starts: Vec<Ipv4Addr> = range.stride_starts(256).collect();

        assert_eq!(
            starts,
            vec![
                Ipv4Addr::new(10, 0, 3, 0),
                Ipv4Addr::new(10, 0, 2, 0),
                Ipv4Addr::new(10, 0, 1, 0),
                Ipv4Addr::new(10, 0, 0, 0),
            ]
        );
    }

    #[test]
    fn test_stride_starts_short_range_is_empty() {
        let range = Ipv4Range::new(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 0, 127));
        assert_eq!(range.stride_starts(256).count(), 0);
    }
}
