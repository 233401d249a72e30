//! # Subnetting
//!
//! Breaks oversized targets into the populated `/24` fragments they
//! contain, so the liveness sweep never walks empty address space. The index
//! itself is left alone: the parent block keeps owning its members.

use std::collections::BTreeSet;

use tracing::debug;

use netsift_common::network::cidr::{CidrBlock, FRAGMENT_PREFIX};

use crate::index::CidrIndex;

const FRAGMENT_SIZE: u32 = 1 << (32 - FRAGMENT_PREFIX);

/// Replaces every target with a prefix shorter than `min_mask` by the `/24`
/// fragments that hold at least one of its members. `min_mask == 0` keeps
/// the list as is.
pub fn cut_mask(targets: Vec<CidrBlock>, index: &CidrIndex, min_mask: u8) -> Vec<CidrBlock> {
    if min_mask == 0 {
        return targets;
    }

    let mut out: BTreeSet<CidrBlock> = BTreeSet::new();

    for target in targets {
        if target.prefix() >= min_mask {
            out.insert(target);
            continue;
        }

        let fragments = populated_fragments(target, index);
        debug!("Split {target} into {} fragments", fragments.len());
        out.extend(fragments);
    }

    let mut targets: Vec<CidrBlock> = out.into_iter().collect();
    crate::select::sort_targets(&mut targets);
    targets
}

/// Fragments of `target`, highest first, keeping those that hold a member.
fn populated_fragments(target: CidrBlock, index: &CidrIndex) -> BTreeSet<CidrBlock> {
    let Some(entry) = index.get(&target) else {
        return BTreeSet::new();
    };

    let candidates: Vec<CidrBlock> = target
        .range()
        .stride_starts(FRAGMENT_SIZE)
        .filter_map(|start| CidrBlock::new(start, FRAGMENT_PREFIX).ok())
        .collect();

    entry
        .members
        .keys()
        .filter_map(|addr| candidates.iter().find(|c| c.contains(*addr)).copied())
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
