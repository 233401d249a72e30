//! # CIDR Index
//!
//! The canonical in-memory store of a run: an ordered map from block to the
//! addresses filed under it. Order matters. Aggregation and the alive merge
//! both give an address to the *first* block that contains it, so the index
//! keeps its entries in a `Vec` and uses a side table only for lookups.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;

use netsift_common::models::MemberRecord;
use netsift_common::network::cidr::CidrBlock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub cidr: CidrBlock,
    pub members: BTreeMap<Ipv4Addr, MemberRecord>,
}

impl BlockEntry {
    fn new(cidr: CidrBlock) -> Self {
        Self {
            cidr,
            members: BTreeMap::new(),
        }
    }

    pub fn population(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CidrIndex {
    entries: Vec<BlockEntry>,
    positions: HashMap<CidrBlock, usize>,
}

impl CidrIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `cidr`, appending an empty one if needed.
    pub fn insert_block(&mut self, cidr: CidrBlock) -> &mut BlockEntry {
        let pos = match self.positions.get(&cidr) {
            Some(&pos) => pos,
            None => {
                self.entries.push(BlockEntry::new(cidr));
                let pos = self.entries.len() - 1;
                self.positions.insert(cidr, pos);
                pos
            }
        };
        &mut self.entries[pos]
    }

    pub fn get(&self, cidr: &CidrBlock) -> Option<&BlockEntry> {
        self.positions.get(cidr).map(|&pos| &self.entries[pos])
    }

    pub fn get_mut(&mut self, cidr: &CidrBlock) -> Option<&mut BlockEntry> {
        self.positions
            .get(cidr)
            .copied()
            .map(move |pos| &mut self.entries[pos])
    }

    pub fn contains_block(&self, cidr: &CidrBlock) -> bool {
        self.positions.contains_key(cidr)
    }

    /// First block, in index order, whose range holds `addr`.
    pub fn find_container(&self, addr: Ipv4Addr) -> Option<CidrBlock> {
        self.entries
            .iter()
            .find(|entry| entry.cidr.contains(addr))
            .map(|entry| entry.cidr)
    }

    /// Block `addr` is already filed under, if any.
    pub fn owner_of(&self, addr: Ipv4Addr) -> Option<CidrBlock> {
        self.entries
            .iter()
            .find(|entry| entry.members.contains_key(&addr))
            .map(|entry| entry.cidr)
    }

    pub fn population(&self, cidr: &CidrBlock) -> usize {
        self.get(cidr).map_or(0, BlockEntry::population)
    }

    /// Stable sort by descending population; equal blocks keep their order.
    pub fn rank(&mut self) {
        self.entries
            .sort_by(|a, b| b.population().cmp(&a.population()));
        self.reindex();
    }

    /// Population-ordered view without touching the index.
    pub fn ranked(&self) -> Vec<(CidrBlock, usize)> {
        let mut view: Vec<(CidrBlock, usize)> = self
            .entries
            .iter()
            .map(|entry| (entry.cidr, entry.population()))
            .collect();
        view.sort_by(|a, b| b.1.cmp(&a.1));
        view
    }

    /// Folds `other` into `self`. New blocks are appended in `other`'s order.
    /// An address `self` already files anywhere keeps its current owner and
    /// record; the rest go to the block `other` filed them under.
    pub fn absorb(&mut self, other: CidrIndex) {
        let mut owned = self.member_set();
        for entry in other.entries {
            let target = self.insert_block(entry.cidr);
            for (addr, member) in entry.members {
                if owned.insert(addr) {
                    target.members.insert(addr, member);
                }
            }
        }
    }

    /// Every address filed under some block.
    pub fn member_set(&self) -> HashSet<Ipv4Addr> {
        self.entries
            .iter()
            .flat_map(|entry| entry.members.keys().copied())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BlockEntry> {
        self.entries.iter_mut()
    }

    pub fn blocks(&self) -> impl Iterator<Item = CidrBlock> + '_ {
        self.entries.iter().map(|entry| entry.cidr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_members(&self) -> usize {
        self.entries.iter().map(BlockEntry::population).sum()
    }

    fn reindex(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.cidr, pos))
            .collect();
    }
}
