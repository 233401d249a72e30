//! Picks the blocks worth scanning.

use tracing::{debug, trace};

use netsift_common::config::AnalysisConfig;
use netsift_common::network::cidr::CidrBlock;

use crate::index::CidrIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// When off, every block is a target.
    pub enabled: bool,
    /// How many ranked blocks are looked at.
    pub top: usize,
    pub min_count: usize,
}

impl From<&AnalysisConfig> for SelectionPolicy {
    fn from(cfg: &AnalysisConfig) -> Self {
        Self {
            enabled: cfg.enable_filter,
            top: cfg.top,
            min_count: cfg.min_count,
        }
    }
}

/// Walks the ranked blocks and keeps the ones with at least `min_count`
/// members. The walk ends once `top` blocks were visited; with `top == 0`
/// the first block is still visited.
pub fn select_targets(index: &CidrIndex, top: usize, min_count: usize) -> Vec<CidrBlock> {
    debug!("Selecting targets: top {top}, at least {min_count} addresses");

    let mut targets = Vec::new();
    let mut budget = top;

    for (cidr, population) in index.ranked() {
        if population >= min_count {
            targets.push(cidr);
        }
        budget = budget.saturating_sub(1);
        if budget == 0 {
            break;
        }
    }

    trace!("Selected {targets:?}");
    targets
}

/// Every block in the index.
pub fn all_targets(index: &CidrIndex) -> Vec<CidrBlock> {
    index.blocks().collect()
}

/// Orders targets by their written form so runs are reproducible.
pub fn sort_targets(targets: &mut [CidrBlock]) {
    targets.sort_by_cached_key(|cidr| cidr.to_string());
}

/// Applies `policy` and returns the sorted target list.
pub fn choose(index: &CidrIndex, policy: SelectionPolicy) -> Vec<CidrBlock> {
    let mut targets = if policy.enabled {
        select_targets(index, policy.top, policy.min_count)
    } else {
        all_targets(index)
    };
    sort_targets(&mut targets);
    targets
}
